use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::store::{
    EntityKind, EntityStore, InMemoryEntityStore, Row, RowFilter, StoreError, WriteOp,
};
use crate::sync::{MessageLog, Notifier, PortalHost, ProjectionName, SessionConfig, SessionHandle};

pub(super) const TECHNICIAN: &str = "tech@demo.com";
pub(super) const CUSTOMER: &str = "customer@demo.com";

pub(super) fn accounts() -> Vec<(EntityKind, Row)> {
    vec![
        (
            EntityKind::Customer,
            Row::new(CUSTOMER).with("full_name", "Juan Dela Cruz"),
        ),
        (
            EntityKind::Technician,
            Row::new(TECHNICIAN).with("full_name", "Carlo Santos"),
        ),
        (
            EntityKind::TechnicianJob,
            Row::new("JOB-001")
                .with("technician_email", TECHNICIAN)
                .with("customer_name", "Juan Dela Cruz")
                .with("status", "Pending"),
        ),
        (
            EntityKind::MaintenanceTicket,
            Row::new("MT-00001")
                .with("customer_email", CUSTOMER)
                .with("status", "Scheduled"),
        ),
    ]
}

/// Store whose reads can be taken offline or slowed down mid-test.
#[derive(Debug, Default)]
pub(super) struct ControlledStore {
    pub(super) inner: InMemoryEntityStore,
    offline: AtomicBool,
    delay_ms: AtomicU64,
}

impl ControlledStore {
    pub(super) fn with_accounts() -> Self {
        Self {
            inner: InMemoryEntityStore::with_rows(accounts()),
            ..Self::default()
        }
    }

    pub(super) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(super) fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

impl EntityStore for ControlledStore {
    fn load_rows(&self, kind: EntityKind, filter: &RowFilter) -> Result<Vec<Row>, StoreError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("database offline".to_string()));
        }
        self.inner.load_rows(kind, filter)
    }

    fn write(&self, kind: EntityKind, op: WriteOp, row: Row) -> Result<(), StoreError> {
        self.inner.write(kind, op, row)
    }
}

pub(super) struct Harness {
    pub(super) store: Arc<ControlledStore>,
    pub(super) display: Arc<MessageLog>,
    pub(super) host: PortalHost<ControlledStore, MessageLog>,
    pub(super) notifier: Notifier,
}

pub(super) fn harness() -> Harness {
    harness_with(SessionConfig::default())
}

pub(super) fn harness_with(config: SessionConfig) -> Harness {
    let store = Arc::new(ControlledStore::with_accounts());
    let display = Arc::new(MessageLog::default());
    let host = PortalHost::new(Arc::clone(&store), Arc::clone(&display), config);
    let notifier = Notifier::new(Arc::clone(host.registry()));
    Harness {
        store,
        display,
        host,
        notifier,
    }
}

/// Waits until everything queued on `handle` before this call has been processed.
pub(super) async fn settle(handle: &SessionHandle, projection: ProjectionName) {
    handle
        .projection(projection)
        .await
        .expect("session answers snapshot requests");
}

pub(super) fn complete_job(store: &ControlledStore, job_id: &str) {
    store
        .write(
            EntityKind::TechnicianJob,
            WriteOp::Update,
            Row::new(job_id).with("status", "Completed"),
        )
        .expect("job update succeeds");
}
