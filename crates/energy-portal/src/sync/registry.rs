use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use tracing::debug;

use super::projection::{PortalKind, SessionAddress};
use super::session::SessionHandle;

/// Directory from session address to the open session, plus the most recently constructed
/// session of each portal.
///
/// Owned by the host that opens sessions and shared with the notifier. Entries are never
/// removed; a later registration under the same address replaces the earlier one.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    slots: RwLock<Slots>,
}

#[derive(Debug, Default)]
struct Slots {
    keyed: HashMap<SessionAddress, SessionHandle>,
    current: HashMap<PortalKind, SessionHandle>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both slots are replaced under one write lock, so `current_of` never lags `lookup`.
    pub fn register(&self, handle: SessionHandle) {
        let address = handle.address().clone();
        let portal = address.portal;

        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slots.keyed.insert(address, handle.clone()) {
            debug!(
                session = %handle.address(),
                previous = previous.instance(),
                current = handle.instance(),
                "registry slot overwritten"
            );
        }
        slots.current.insert(portal, handle);
    }

    pub fn lookup(&self, address: &SessionAddress) -> Option<SessionHandle> {
        self.read().keyed.get(address).cloned()
    }

    pub fn current_of(&self, portal: PortalKind) -> Option<SessionHandle> {
        self.read().current.get(&portal).cloned()
    }

    /// Registered sessions ordered by address.
    pub fn sessions(&self) -> Vec<SessionHandle> {
        let mut sessions: Vec<SessionHandle> = self.read().keyed.values().cloned().collect();
        sessions.sort_by(|a, b| a.address().cmp(b.address()));
        sessions
    }

    pub fn len(&self) -> usize {
        self.read().keyed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, Slots> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }
}
