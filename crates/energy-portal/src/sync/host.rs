use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

use super::display::DisplaySink;
use super::projection::{PortalKind, SessionAddress, SessionKey};
use super::registry::InstanceRegistry;
use super::session::{with_store, PortalSession, SessionConfig, SessionError, SessionHandle};
use crate::store::EntityStore;

/// Process-level owner of the registry; opens portal sessions against one store and display.
pub struct PortalHost<S, D> {
    store: Arc<S>,
    display: Arc<D>,
    registry: Arc<InstanceRegistry>,
    config: SessionConfig,
    instances: AtomicU64,
}

impl<S, D> PortalHost<S, D>
where
    S: EntityStore + 'static,
    D: DisplaySink + 'static,
{
    pub fn new(store: Arc<S>, display: Arc<D>, config: SessionConfig) -> Self {
        Self {
            store,
            display,
            registry: Arc::new(InstanceRegistry::new()),
            config,
            instances: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn display(&self) -> &Arc<D> {
        &self.display
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    /// Opens a session for `key`, loads its projections, and registers it last.
    ///
    /// A failed initial load leaves the registry untouched.
    pub async fn open(
        &self,
        portal: PortalKind,
        key: impl Into<String>,
    ) -> Result<SessionHandle, SessionError> {
        let key = SessionKey::new(key);
        let display_name = self.display_name(portal, &key).await?;
        let address = SessionAddress { portal, key };

        let session = PortalSession::construct(
            address,
            display_name,
            Arc::clone(&self.store),
            Arc::clone(&self.display),
            self.config,
        )
        .await?;

        let instance = self.instances.fetch_add(1, Ordering::Relaxed);
        let handle = session.spawn(instance);
        self.registry.register(handle.clone());
        info!(
            session = %handle.address(),
            instance,
            name = handle.display_name(),
            "portal session opened"
        );
        Ok(handle)
    }

    async fn display_name(
        &self,
        portal: PortalKind,
        key: &SessionKey,
    ) -> Result<String, SessionError> {
        let Some(kind) = portal.account_kind() else {
            return Ok(key.to_string());
        };

        let id = key.as_str().to_string();
        let account = with_store(&self.store, self.config.refresh_timeout, move |store| {
            store.fetch(kind, &id)
        })
        .await?;

        match account {
            Some(row) => Ok(row.get("full_name").unwrap_or(key.as_str()).to_string()),
            None => Err(SessionError::UnknownAccount {
                kind,
                key: key.clone(),
            }),
        }
    }
}
