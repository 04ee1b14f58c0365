use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::display::DisplaySink;
use super::event::Announcement;
use super::notifier::DeliveryOutcome;
use super::projection::{PortalKind, Projection, ProjectionName, SessionAddress, SessionKey};
use crate::store::{EntityKind, EntityStore, Row, StoreError};

/// Per-session tuning shared by every session a host opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub inbox_capacity: usize,
    pub refresh_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: 32,
            refresh_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{portal} has no '{projection}' view")]
    UnknownProjection {
        portal: PortalKind,
        projection: ProjectionName,
    },
    #[error("no {kind} account is registered for {key}")]
    UnknownAccount { kind: EntityKind, key: SessionKey },
    #[error("entity store read exceeded {0:?}")]
    Timeout(Duration),
    #[error("entity store worker failed: {0}")]
    Worker(String),
    #[error("session {0} is closed")]
    Closed(SessionAddress),
}

#[derive(Debug)]
pub(crate) enum SessionCommand {
    Refresh {
        projection: ProjectionName,
        reply: oneshot::Sender<Result<usize, SessionError>>,
    },
    Notify {
        projection: ProjectionName,
        announcement: Option<Announcement>,
    },
    Snapshot {
        projection: ProjectionName,
        reply: oneshot::Sender<Result<Projection, SessionError>>,
    },
    Close,
}

/// Cloneable address of a live session; all interaction goes through its inbox.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    address: SessionAddress,
    instance: u64,
    display_name: Arc<str>,
    inbox: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn address(&self) -> &SessionAddress {
        &self.address
    }

    /// Distinguishes two sessions opened under the same key.
    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn is_closed(&self) -> bool {
        self.inbox.is_closed()
    }

    /// Reloads `projection` on the session's task and waits for the row count.
    pub async fn refresh(&self, projection: ProjectionName) -> Result<usize, SessionError> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::Refresh { projection, reply }).await?;
        response.await.map_err(|_| self.closed())?
    }

    pub async fn projection(&self, projection: ProjectionName) -> Result<Projection, SessionError> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::Snapshot { projection, reply }).await?;
        response.await.map_err(|_| self.closed())?
    }

    /// Queues a reload without waiting; never blocks the caller.
    pub fn request_refresh(&self, projection: ProjectionName) -> DeliveryOutcome {
        self.post(SessionCommand::Notify {
            projection,
            announcement: None,
        })
    }

    /// Queues a reload followed by a one-shot message; never blocks the caller.
    pub fn notify(&self, projection: ProjectionName, announcement: Announcement) -> DeliveryOutcome {
        self.post(SessionCommand::Notify {
            projection,
            announcement: Some(announcement),
        })
    }

    /// Stops the session task. The registry entry is left in place until overwritten.
    pub async fn close(&self) {
        let _ = self.inbox.send(SessionCommand::Close).await;
    }

    fn post(&self, command: SessionCommand) -> DeliveryOutcome {
        match self.inbox.try_send(command) {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(session = %self.address, "session inbox full; notification dropped");
                DeliveryOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(session = %self.address, "session closed; notification dropped");
                DeliveryOutcome::Closed
            }
        }
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.inbox.send(command).await.map_err(|_| self.closed())
    }

    fn closed(&self) -> SessionError {
        SessionError::Closed(self.address.clone())
    }

    #[cfg(test)]
    pub(crate) fn detached(address: SessionAddress, instance: u64) -> Self {
        let (inbox, _) = mpsc::channel(1);
        Self {
            address,
            instance,
            display_name: Arc::from("detached"),
            inbox,
        }
    }
}

/// Session state owned by the session task. Projection caches are only written here.
pub(crate) struct PortalSession<S, D> {
    address: SessionAddress,
    display_name: Arc<str>,
    store: Arc<S>,
    display: Arc<D>,
    config: SessionConfig,
    projections: BTreeMap<ProjectionName, Projection>,
}

impl<S, D> PortalSession<S, D>
where
    S: EntityStore + 'static,
    D: DisplaySink + 'static,
{
    /// Loads and renders every projection the portal owns.
    pub(crate) async fn construct(
        address: SessionAddress,
        display_name: String,
        store: Arc<S>,
        display: Arc<D>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let mut session = Self {
            address,
            display_name: Arc::from(display_name),
            store,
            display,
            config,
            projections: BTreeMap::new(),
        };

        for &projection in session.address.portal.projections() {
            session.refresh(projection).await?;
        }

        Ok(session)
    }

    pub(crate) fn spawn(self, instance: u64) -> SessionHandle {
        let (inbox, commands) = mpsc::channel(self.config.inbox_capacity.max(1));
        let handle = SessionHandle {
            address: self.address.clone(),
            instance,
            display_name: Arc::clone(&self.display_name),
            inbox,
        };
        tokio::spawn(self.run(commands));
        handle
    }

    async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        while let Some(command) = commands.recv().await {
            match command {
                SessionCommand::Refresh { projection, reply } => {
                    let result = self.refresh(projection).await;
                    let _ = reply.send(result);
                }
                SessionCommand::Notify {
                    projection,
                    announcement,
                } => self.notify(projection, announcement).await,
                SessionCommand::Snapshot { projection, reply } => {
                    let _ = reply.send(self.snapshot(projection));
                }
                SessionCommand::Close => break,
            }
        }
        debug!(session = %self.address, "session task stopped");
    }

    async fn refresh(&mut self, name: ProjectionName) -> Result<usize, SessionError> {
        if !self.address.portal.owns(name) {
            return Err(SessionError::UnknownProjection {
                portal: self.address.portal,
                projection: name,
            });
        }

        let source = name.source(&self.address.key);
        let rows: Vec<Row> = with_store(&self.store, self.config.refresh_timeout, move |store| {
            store.load_rows(source.kind, &source.filter)
        })
        .await?;

        self.display.render(&self.address, name, &rows);
        let count = rows.len();
        self.projections.insert(
            name,
            Projection {
                name,
                rows,
                refreshed_at: Utc::now(),
            },
        );
        Ok(count)
    }

    async fn notify(&mut self, name: ProjectionName, announcement: Option<Announcement>) {
        match self.refresh(name).await {
            Ok(rows) => {
                debug!(session = %self.address, projection = %name, rows, "projection reloaded");
                if let Some(announcement) = announcement {
                    self.display.announce(&self.address, &announcement);
                }
            }
            Err(err) => {
                warn!(
                    session = %self.address,
                    projection = %name,
                    error = %err,
                    "refresh after notification failed"
                );
            }
        }
    }

    fn snapshot(&self, name: ProjectionName) -> Result<Projection, SessionError> {
        self.projections
            .get(&name)
            .cloned()
            .ok_or(SessionError::UnknownProjection {
                portal: self.address.portal,
                projection: name,
            })
    }
}

/// Runs a synchronous store call off the async workers, bounded by `timeout`.
pub(crate) async fn with_store<S, T, F>(
    store: &Arc<S>,
    timeout: Duration,
    op: F,
) -> Result<T, SessionError>
where
    S: EntityStore + 'static,
    T: Send + 'static,
    F: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
{
    let store = Arc::clone(store);
    let task = tokio::task::spawn_blocking(move || op(&store));
    match tokio::time::timeout(timeout, task).await {
        Err(_) => Err(SessionError::Timeout(timeout)),
        Ok(Err(join)) => Err(SessionError::Worker(join.to_string())),
        Ok(Ok(result)) => result.map_err(SessionError::from),
    }
}
