//! Entity Store collaborator: the authoritative source every portal session projects from.
//!
//! Sessions and the service desk only ever see the [`EntityStore`] trait, so the in-memory
//! store, a SQL adapter, or a test double can sit behind it without touching propagation.

mod memory;
pub mod seed;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use memory::InMemoryEntityStore;
pub use seed::{SeedError, SeedImporter};

/// Tables the portals read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Customer,
    Technician,
    MaintenanceTicket,
    TechnicianJob,
    CustomerIssue,
    StockRequest,
    TechnicianApplication,
}

impl EntityKind {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::Customer,
            Self::Technician,
            Self::MaintenanceTicket,
            Self::TechnicianJob,
            Self::CustomerIssue,
            Self::StockRequest,
            Self::TechnicianApplication,
        ]
    }

    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Customer => "customers",
            Self::Technician => "technicians",
            Self::MaintenanceTicket => "maintenance_tickets",
            Self::TechnicianJob => "technician_jobs",
            Self::CustomerIssue => "customer_issues",
            Self::StockRequest => "stock_requests",
            Self::TechnicianApplication => "technician_applications",
        }
    }

    /// Column that carries the row id in imports and exports.
    pub const fn id_column(self) -> &'static str {
        match self {
            Self::Customer | Self::Technician | Self::TechnicianApplication => "email",
            Self::MaintenanceTicket => "ticket_id",
            Self::TechnicianJob => "job_id",
            Self::CustomerIssue => "issue_id",
            Self::StockRequest => "request_id",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// One record as the store hands it out. Columns other than the id live in `fields`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub id: String,
    pub fields: BTreeMap<String, String>,
}

impl Row {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, column: &str, value: impl Into<String>) -> Self {
        self.fields.insert(column.to_string(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Column lookup for typed decoding; a missing column means the row is malformed.
    pub fn require(&self, kind: EntityKind, column: &'static str) -> Result<&str, StoreError> {
        self.get(column).ok_or_else(|| StoreError::Malformed {
            kind,
            id: self.id.clone(),
            column,
        })
    }
}

/// Row selection used by projections and point lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    All,
    Id(String),
    FieldEquals { column: String, value: String },
}

impl RowFilter {
    pub fn field(column: &str, value: impl Into<String>) -> Self {
        Self::FieldEquals {
            column: column.to_string(),
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        match self {
            RowFilter::All => true,
            RowFilter::Id(id) => row.id == *id,
            RowFilter::FieldEquals { column, value } => row.get(column) == Some(value.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOp {
    Insert,
    Update,
    Delete,
}

/// Storage abstraction consumed by sessions (reads) and the service desk (writes).
pub trait EntityStore: Send + Sync {
    /// Rows of `kind` matching `filter`, ordered by id.
    fn load_rows(&self, kind: EntityKind, filter: &RowFilter) -> Result<Vec<Row>, StoreError>;

    /// `Update` merges the supplied columns into the stored row; `Delete` only reads `row.id`.
    fn write(&self, kind: EntityKind, op: WriteOp, row: Row) -> Result<(), StoreError>;

    fn fetch(&self, kind: EntityKind, id: &str) -> Result<Option<Row>, StoreError> {
        let mut rows = self.load_rows(kind, &RowFilter::Id(id.to_string()))?;
        Ok(rows.pop())
    }

    /// Explicit name→id lookup. Ambiguous matches resolve to `None` so a caller never
    /// addresses the wrong user.
    fn resolve_id(
        &self,
        kind: EntityKind,
        column: &str,
        value: &str,
    ) -> Result<Option<String>, StoreError> {
        let mut rows = self.load_rows(kind, &RowFilter::field(column, value))?;
        if rows.len() == 1 {
            Ok(rows.pop().map(|row| row.id))
        } else {
            Ok(None)
        }
    }
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} record {id} already exists")]
    Conflict { kind: EntityKind, id: String },
    #[error("{kind} record {id} not found")]
    NotFound { kind: EntityKind, id: String },
    #[error("{kind} record {id} is missing column {column}")]
    Malformed {
        kind: EntityKind,
        id: String,
        column: &'static str,
    },
    #[error("{kind} record {id} has invalid {column} value '{value}'")]
    InvalidValue {
        kind: EntityKind,
        id: String,
        column: &'static str,
        value: String,
    },
    #[error("entity store unavailable: {0}")]
    Unavailable(String),
}
