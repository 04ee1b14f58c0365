use std::sync::Arc;

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::store::{
    EntityKind, EntityStore, InMemoryEntityStore, Row, RowFilter, StoreError, WriteOp,
};
use crate::sync::{PortalKind, ProjectionName, SessionConfig, SessionHandle};
use crate::workflows::{
    IssueReport, MaintenanceRequest, Portal, Severity, StockRequestDraft, TechnicianAssignment,
};

pub(super) use crate::workflows::demo::{
    DEMO_CUSTOMER, DEMO_JOB, DEMO_TECHNICIAN, DEMO_TICKET, SECOND_TECHNICIAN,
};

pub(super) fn demo_store() -> Arc<InMemoryEntityStore> {
    Arc::new(InMemoryEntityStore::with_demo_accounts())
}

pub(super) fn portal() -> (Arc<InMemoryEntityStore>, Arc<Portal<InMemoryEntityStore>>) {
    let store = demo_store();
    let portal = Arc::new(Portal::new(Arc::clone(&store), SessionConfig::default()));
    (store, portal)
}

pub(super) async fn open<S>(portal: &Portal<S>, kind: PortalKind, key: &str) -> SessionHandle
where
    S: EntityStore + 'static,
{
    portal
        .host()
        .open(kind, key)
        .await
        .expect("session opens")
}

/// Waits until everything already queued on `handle` has run.
pub(super) async fn settle(handle: &SessionHandle) {
    let projection = handle.address().portal.projections()[0];
    handle
        .projection(projection)
        .await
        .expect("session answers snapshot requests");
}

pub(super) async fn cached_status(
    handle: &SessionHandle,
    projection: ProjectionName,
    id: &str,
) -> Option<String> {
    handle
        .projection(projection)
        .await
        .expect("projection cached")
        .rows
        .into_iter()
        .find(|row| row.id == id)
        .and_then(|row| row.get("status").map(str::to_string))
}

pub(super) fn stored(store: &InMemoryEntityStore, kind: EntityKind, id: &str) -> Row {
    store
        .fetch(kind, id)
        .expect("fetch succeeds")
        .expect("row present")
}

pub(super) fn maintenance_request() -> MaintenanceRequest {
    MaintenanceRequest {
        equipment: "Inverter 5kW".to_string(),
        service_type: "Repair".to_string(),
        schedule_date: NaiveDate::from_ymd_opt(2025, 12, 10).expect("valid date"),
        contact_no: None,
        site_address: None,
        notes: Some("Inverter shuts off at noon".to_string()),
    }
}

pub(super) fn assignment(technician_email: &str) -> TechnicianAssignment {
    TechnicianAssignment {
        technician_email: technician_email.to_string(),
        scheduled_time: Some("9:00 AM".to_string()),
        notes: None,
    }
}

pub(super) fn issue_report() -> IssueReport {
    IssueReport {
        equipment: "Battery 200Ah".to_string(),
        description: "Battery drains overnight".to_string(),
        severity: Severity::High,
    }
}

pub(super) fn stock_draft() -> StockRequestDraft {
    StockRequestDraft {
        item_name: "Inverter 5kW".to_string(),
        category: "Inverter".to_string(),
        quantity: 10,
        supplier: "GridMasters".to_string(),
        request_date: None,
        status: None,
        notes: Some("For new installer".to_string()),
    }
}

/// Serves reads from the demo data and refuses every write.
#[derive(Debug, Default)]
pub(super) struct ReadOnlyStore {
    inner: InMemoryEntityStore,
}

impl ReadOnlyStore {
    pub(super) fn demo() -> Self {
        Self {
            inner: InMemoryEntityStore::with_demo_accounts(),
        }
    }
}

impl EntityStore for ReadOnlyStore {
    fn load_rows(&self, kind: EntityKind, filter: &RowFilter) -> Result<Vec<Row>, StoreError> {
        self.inner.load_rows(kind, filter)
    }

    fn write(&self, _kind: EntityKind, _op: WriteOp, _row: Row) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("read-only replica".to_string()))
    }
}

/// Demo data whose maintenance ticket updates always fail.
#[derive(Debug, Default)]
pub(super) struct TicketUpdatesFail {
    inner: InMemoryEntityStore,
}

impl TicketUpdatesFail {
    pub(super) fn demo() -> Self {
        Self {
            inner: InMemoryEntityStore::with_demo_accounts(),
        }
    }
}

impl EntityStore for TicketUpdatesFail {
    fn load_rows(&self, kind: EntityKind, filter: &RowFilter) -> Result<Vec<Row>, StoreError> {
        self.inner.load_rows(kind, filter)
    }

    fn write(&self, kind: EntityKind, op: WriteOp, row: Row) -> Result<(), StoreError> {
        if kind == EntityKind::MaintenanceTicket && op == WriteOp::Update {
            return Err(StoreError::Unavailable("ticket table locked".to_string()));
        }
        self.inner.write(kind, op, row)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("valid json")
}
