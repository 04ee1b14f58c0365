use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::store::{EntityKind, Row, StoreError};

/// Technician column value on tickets nobody has been assigned to yet.
pub const PENDING_ASSIGNMENT: &str = "Pending Assignment";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Typed view over one store row.
pub trait Record: Sized {
    const KIND: EntityKind;

    fn id(&self) -> &str;
    fn to_row(&self) -> Row;
    fn from_row(row: &Row) -> Result<Self, StoreError>;
}

macro_rules! labelled {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant),+
        }

        impl $name {
            pub const fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }

            /// Accepts the display label, case-insensitively.
            pub fn parse(raw: &str) -> Option<Self> {
                let raw = raw.trim();
                [$(Self::$variant),+]
                    .into_iter()
                    .find(|candidate| candidate.label().eq_ignore_ascii_case(raw))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

labelled!(
    /// Lifecycle of a customer maintenance ticket.
    TicketStatus {
        Pending => "Pending",
        Scheduled => "Scheduled",
        InProgress => "In Progress",
        Completed => "Completed",
        Cancelled => "Cancelled",
    }
);

labelled!(JobStatus {
    Pending => "Pending",
    InProgress => "In Progress",
    Completed => "Completed",
    Cancelled => "Cancelled",
});

labelled!(IssueStatus {
    Open => "Open",
    InProgress => "In Progress",
    Resolved => "Resolved",
});

labelled!(Severity {
    Low => "Low",
    Medium => "Medium",
    High => "High",
    Critical => "Critical",
});

labelled!(
    /// Shared by stock requests and technician applications.
    ReviewStatus {
        Pending => "Pending",
        Approved => "Approved",
        Rejected => "Rejected",
    }
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub email: String,
    pub full_name: String,
    pub contact_no: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technician {
    pub email: String,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceTicket {
    pub ticket_id: String,
    pub customer_email: String,
    pub customer_name: String,
    pub contact_no: Option<String>,
    pub site_address: Option<String>,
    pub equipment: String,
    pub service_type: String,
    pub schedule_date: NaiveDate,
    /// Technician email, or [`PENDING_ASSIGNMENT`].
    pub technician: String,
    pub status: TicketStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicianJob {
    pub job_id: String,
    pub ticket_id: Option<String>,
    pub technician_email: String,
    pub customer_name: String,
    pub address: Option<String>,
    pub service_type: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: Option<String>,
    pub priority: String,
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerIssue {
    pub issue_id: String,
    pub customer_email: String,
    pub customer_name: String,
    pub equipment: String,
    pub description: String,
    pub severity: Severity,
    pub reported_on: NaiveDate,
    pub status: IssueStatus,
    pub assigned_technician: Option<String>,
    pub resolution: Option<String>,
    pub resolved_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRequest {
    pub request_id: String,
    pub item_name: String,
    pub category: String,
    pub quantity: u32,
    pub supplier: String,
    pub request_date: NaiveDate,
    pub status: ReviewStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicianApplication {
    pub email: String,
    pub full_name: String,
    pub notes: Option<String>,
    pub applied_on: NaiveDate,
    pub status: ReviewStatus,
}

impl Record for Customer {
    const KIND: EntityKind = EntityKind::Customer;

    fn id(&self) -> &str {
        &self.email
    }

    fn to_row(&self) -> Row {
        let row = Row::new(&self.email).with("full_name", &self.full_name);
        let row = with_opt(row, "contact_no", self.contact_no.as_deref());
        with_opt(row, "address", self.address.as_deref())
    }

    fn from_row(row: &Row) -> Result<Self, StoreError> {
        Ok(Self {
            email: row.id.clone(),
            full_name: row.require(Self::KIND, "full_name")?.to_string(),
            contact_no: optional(row, "contact_no"),
            address: optional(row, "address"),
        })
    }
}

impl Record for Technician {
    const KIND: EntityKind = EntityKind::Technician;

    fn id(&self) -> &str {
        &self.email
    }

    fn to_row(&self) -> Row {
        Row::new(&self.email).with("full_name", &self.full_name)
    }

    fn from_row(row: &Row) -> Result<Self, StoreError> {
        Ok(Self {
            email: row.id.clone(),
            full_name: row.require(Self::KIND, "full_name")?.to_string(),
        })
    }
}

impl Record for MaintenanceTicket {
    const KIND: EntityKind = EntityKind::MaintenanceTicket;

    fn id(&self) -> &str {
        &self.ticket_id
    }

    fn to_row(&self) -> Row {
        let row = Row::new(&self.ticket_id)
            .with("customer_email", &self.customer_email)
            .with("customer_name", &self.customer_name)
            .with("equipment", &self.equipment)
            .with("service_type", &self.service_type)
            .with("schedule_date", format_date(self.schedule_date))
            .with("technician", &self.technician)
            .with("status", self.status.label());
        let row = with_opt(row, "contact_no", self.contact_no.as_deref());
        let row = with_opt(row, "site_address", self.site_address.as_deref());
        with_opt(row, "notes", self.notes.as_deref())
    }

    fn from_row(row: &Row) -> Result<Self, StoreError> {
        let kind = Self::KIND;
        Ok(Self {
            ticket_id: row.id.clone(),
            customer_email: row.require(kind, "customer_email")?.to_string(),
            customer_name: row.require(kind, "customer_name")?.to_string(),
            contact_no: optional(row, "contact_no"),
            site_address: optional(row, "site_address"),
            equipment: row.require(kind, "equipment")?.to_string(),
            service_type: row.require(kind, "service_type")?.to_string(),
            schedule_date: date(row, kind, "schedule_date")?,
            technician: row
                .get("technician")
                .unwrap_or(PENDING_ASSIGNMENT)
                .to_string(),
            status: labelled_column(row, kind, "status", TicketStatus::parse)?,
            notes: optional(row, "notes"),
        })
    }
}

impl Record for TechnicianJob {
    const KIND: EntityKind = EntityKind::TechnicianJob;

    fn id(&self) -> &str {
        &self.job_id
    }

    fn to_row(&self) -> Row {
        let row = Row::new(&self.job_id)
            .with("technician_email", &self.technician_email)
            .with("customer_name", &self.customer_name)
            .with("service_type", &self.service_type)
            .with("scheduled_date", format_date(self.scheduled_date))
            .with("priority", &self.priority)
            .with("status", self.status.label());
        let row = with_opt(row, "ticket_id", self.ticket_id.as_deref());
        let row = with_opt(row, "address", self.address.as_deref());
        with_opt(row, "scheduled_time", self.scheduled_time.as_deref())
    }

    fn from_row(row: &Row) -> Result<Self, StoreError> {
        let kind = Self::KIND;
        Ok(Self {
            job_id: row.id.clone(),
            ticket_id: optional(row, "ticket_id"),
            technician_email: row.require(kind, "technician_email")?.to_string(),
            customer_name: row.require(kind, "customer_name")?.to_string(),
            address: optional(row, "address"),
            service_type: row.require(kind, "service_type")?.to_string(),
            scheduled_date: date(row, kind, "scheduled_date")?,
            scheduled_time: optional(row, "scheduled_time"),
            priority: row.get("priority").unwrap_or("Normal").to_string(),
            status: labelled_column(row, kind, "status", JobStatus::parse)?,
        })
    }
}

impl Record for CustomerIssue {
    const KIND: EntityKind = EntityKind::CustomerIssue;

    fn id(&self) -> &str {
        &self.issue_id
    }

    fn to_row(&self) -> Row {
        let row = Row::new(&self.issue_id)
            .with("customer_email", &self.customer_email)
            .with("customer_name", &self.customer_name)
            .with("equipment", &self.equipment)
            .with("description", &self.description)
            .with("severity", self.severity.label())
            .with("reported_on", format_date(self.reported_on))
            .with("status", self.status.label());
        let row = with_opt(
            row,
            "assigned_technician",
            self.assigned_technician.as_deref(),
        );
        let row = with_opt(row, "resolution", self.resolution.as_deref());
        let resolved_on = self.resolved_on.map(format_date);
        with_opt(row, "resolved_on", resolved_on.as_deref())
    }

    fn from_row(row: &Row) -> Result<Self, StoreError> {
        let kind = Self::KIND;
        let resolved_on = match row.get("resolved_on") {
            Some(_) => Some(date(row, kind, "resolved_on")?),
            None => None,
        };
        Ok(Self {
            issue_id: row.id.clone(),
            customer_email: row.require(kind, "customer_email")?.to_string(),
            customer_name: row.require(kind, "customer_name")?.to_string(),
            equipment: row.require(kind, "equipment")?.to_string(),
            description: row.require(kind, "description")?.to_string(),
            severity: labelled_column(row, kind, "severity", Severity::parse)?,
            reported_on: date(row, kind, "reported_on")?,
            status: labelled_column(row, kind, "status", IssueStatus::parse)?,
            assigned_technician: optional(row, "assigned_technician"),
            resolution: optional(row, "resolution"),
            resolved_on,
        })
    }
}

impl Record for StockRequest {
    const KIND: EntityKind = EntityKind::StockRequest;

    fn id(&self) -> &str {
        &self.request_id
    }

    fn to_row(&self) -> Row {
        let row = Row::new(&self.request_id)
            .with("item_name", &self.item_name)
            .with("category", &self.category)
            .with("quantity", self.quantity.to_string())
            .with("supplier", &self.supplier)
            .with("request_date", format_date(self.request_date))
            .with("status", self.status.label());
        with_opt(row, "notes", self.notes.as_deref())
    }

    fn from_row(row: &Row) -> Result<Self, StoreError> {
        let kind = Self::KIND;
        let raw_quantity = row.require(kind, "quantity")?;
        let quantity = raw_quantity
            .trim()
            .parse::<u32>()
            .map_err(|_| invalid(row, kind, "quantity", raw_quantity))?;
        Ok(Self {
            request_id: row.id.clone(),
            item_name: row.require(kind, "item_name")?.to_string(),
            category: row.require(kind, "category")?.to_string(),
            quantity,
            supplier: row.require(kind, "supplier")?.to_string(),
            request_date: date(row, kind, "request_date")?,
            status: labelled_column(row, kind, "status", ReviewStatus::parse)?,
            notes: optional(row, "notes"),
        })
    }
}

impl Record for TechnicianApplication {
    const KIND: EntityKind = EntityKind::TechnicianApplication;

    fn id(&self) -> &str {
        &self.email
    }

    fn to_row(&self) -> Row {
        let row = Row::new(&self.email)
            .with("full_name", &self.full_name)
            .with("applied_on", format_date(self.applied_on))
            .with("status", self.status.label());
        with_opt(row, "notes", self.notes.as_deref())
    }

    fn from_row(row: &Row) -> Result<Self, StoreError> {
        let kind = Self::KIND;
        Ok(Self {
            email: row.id.clone(),
            full_name: row.require(kind, "full_name")?.to_string(),
            notes: optional(row, "notes"),
            applied_on: date(row, kind, "applied_on")?,
            status: labelled_column(row, kind, "status", ReviewStatus::parse)?,
        })
    }
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn with_opt(row: Row, column: &str, value: Option<&str>) -> Row {
    match value {
        Some(value) => row.with(column, value),
        None => row,
    }
}

fn optional(row: &Row, column: &str) -> Option<String> {
    row.get(column)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn date(row: &Row, kind: EntityKind, column: &'static str) -> Result<NaiveDate, StoreError> {
    let raw = row.require(kind, column)?;
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| invalid(row, kind, column, raw))
}

fn labelled_column<T>(
    row: &Row,
    kind: EntityKind,
    column: &'static str,
    parse: fn(&str) -> Option<T>,
) -> Result<T, StoreError> {
    let raw = row.require(kind, column)?;
    parse(raw).ok_or_else(|| invalid(row, kind, column, raw))
}

fn invalid(row: &Row, kind: EntityKind, column: &'static str, value: &str) -> StoreError {
    StoreError::InvalidValue {
        kind,
        id: row.id.clone(),
        column,
        value: value.to_string(),
    }
}
