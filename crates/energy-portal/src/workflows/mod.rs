//! Portal flows: typed records, the service desk that writes and propagates, and the HTTP
//! surface over open sessions.

pub mod demo;
pub mod domain;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use crate::store::EntityStore;
use crate::sync::{MessageLog, Notifier, PortalHost, SessionConfig};

pub use domain::{
    Customer, CustomerIssue, IssueStatus, JobStatus, MaintenanceTicket, Record, ReviewStatus,
    Severity, StockRequest, Technician, TechnicianApplication, TechnicianJob, TicketStatus,
    PENDING_ASSIGNMENT,
};
pub use router::portal_router;
pub use service::{
    DeskError, IssueReport, IssueResolution, MaintenanceRequest, Outcome, ServiceDesk,
    StockRequestDraft, TechnicianApplicationDraft, TechnicianAssignment,
};

/// Session host and service desk wired to one store and one registry.
pub struct Portal<S> {
    host: PortalHost<S, MessageLog>,
    desk: ServiceDesk<S>,
    messages: Arc<MessageLog>,
}

impl<S> Portal<S>
where
    S: EntityStore + 'static,
{
    pub fn new(store: Arc<S>, config: SessionConfig) -> Self {
        let messages = Arc::new(MessageLog::default());
        let host = PortalHost::new(Arc::clone(&store), Arc::clone(&messages), config);
        let desk = ServiceDesk::new(store, Notifier::new(Arc::clone(host.registry())));
        Self {
            host,
            desk,
            messages,
        }
    }

    pub fn host(&self) -> &PortalHost<S, MessageLog> {
        &self.host
    }

    pub fn desk(&self) -> &ServiceDesk<S> {
        &self.desk
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }
}
