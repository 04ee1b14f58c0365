use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{EntityKind, Row, RowFilter};

/// Stable user identifier (email or username) a session is registered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey(pub String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortalKind {
    AdminDashboard,
    CompanyAdmin,
    Technician,
    Customer,
}

impl PortalKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::AdminDashboard => "Admin Dashboard",
            Self::CompanyAdmin => "Company Admin",
            Self::Technician => "Technician Portal",
            Self::Customer => "Customer Portal",
        }
    }

    /// Projections a session of this portal loads at construction, in display order.
    pub const fn projections(self) -> &'static [ProjectionName] {
        match self {
            Self::AdminDashboard => &[
                ProjectionName::MaintenanceTickets,
                ProjectionName::StockRequests,
                ProjectionName::TechnicianApplications,
            ],
            Self::CompanyAdmin => &[ProjectionName::StockRequests],
            Self::Technician => &[ProjectionName::Jobs, ProjectionName::CustomerIssues],
            Self::Customer => &[ProjectionName::MaintenanceRequests, ProjectionName::Issues],
        }
    }

    /// Account table that must hold the session key, if this portal is keyed by account.
    pub const fn account_kind(self) -> Option<EntityKind> {
        match self {
            Self::Technician => Some(EntityKind::Technician),
            Self::Customer => Some(EntityKind::Customer),
            Self::AdminDashboard | Self::CompanyAdmin => None,
        }
    }

    pub fn owns(self, projection: ProjectionName) -> bool {
        self.projections().contains(&projection)
    }
}

impl fmt::Display for PortalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionName {
    MaintenanceRequests,
    Issues,
    Jobs,
    CustomerIssues,
    MaintenanceTickets,
    StockRequests,
    TechnicianApplications,
}

impl ProjectionName {
    pub const fn label(self) -> &'static str {
        match self {
            Self::MaintenanceRequests => "My Maintenance Requests",
            Self::Issues => "My Issues",
            Self::Jobs => "Assigned Jobs",
            Self::CustomerIssues => "Customer Issues",
            Self::MaintenanceTickets => "Maintenance Tickets",
            Self::StockRequests => "Stock Requests",
            Self::TechnicianApplications => "Technician Applications",
        }
    }

    /// The query this projection runs for `key`; identical at construction and on refresh.
    pub fn source(self, key: &SessionKey) -> ProjectionSource {
        let (kind, filter) = match self {
            Self::MaintenanceRequests => (
                EntityKind::MaintenanceTicket,
                RowFilter::field("customer_email", key.as_str()),
            ),
            Self::Issues => (
                EntityKind::CustomerIssue,
                RowFilter::field("customer_email", key.as_str()),
            ),
            Self::Jobs => (
                EntityKind::TechnicianJob,
                RowFilter::field("technician_email", key.as_str()),
            ),
            Self::CustomerIssues => (EntityKind::CustomerIssue, RowFilter::All),
            Self::MaintenanceTickets => (EntityKind::MaintenanceTicket, RowFilter::All),
            Self::StockRequests => (EntityKind::StockRequest, RowFilter::All),
            Self::TechnicianApplications => (EntityKind::TechnicianApplication, RowFilter::All),
        };
        ProjectionSource { kind, filter }
    }
}

impl fmt::Display for ProjectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionSource {
    pub kind: EntityKind,
    pub filter: RowFilter,
}

/// Portal type plus key; what the registry and the display sink address sessions by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionAddress {
    pub portal: PortalKind,
    pub key: SessionKey,
}

impl SessionAddress {
    pub fn new(portal: PortalKind, key: impl Into<String>) -> Self {
        Self {
            portal,
            key: SessionKey::new(key),
        }
    }
}

impl fmt::Display for SessionAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.portal, self.key)
    }
}

/// Snapshot of store rows owned by exactly one session.
#[derive(Debug, Clone, Serialize)]
pub struct Projection {
    pub name: ProjectionName,
    pub rows: Vec<Row>,
    pub refreshed_at: DateTime<Utc>,
}
