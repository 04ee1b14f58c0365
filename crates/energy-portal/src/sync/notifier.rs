use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::event::{ChangeEvent, Recipient, Target};
use super::projection::{ProjectionName, SessionAddress};
use super::registry::InstanceRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Queued on the peer's inbox.
    Delivered,
    /// No session registered for the recipient.
    Absent,
    /// Peer inbox was full.
    Dropped,
    /// Peer session task has stopped.
    Closed,
    /// Same session and projection already received this event.
    Duplicate,
}

impl DeliveryOutcome {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Absent => "absent",
            Self::Dropped => "dropped",
            Self::Closed => "closed",
            Self::Duplicate => "duplicate",
        }
    }
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Delivery {
    pub target: Target,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<u64>,
    pub outcome: DeliveryOutcome,
}

/// What the notifier did for each target of one or more change events.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryReport {
    pub deliveries: Vec<Delivery>,
}

impl DeliveryReport {
    pub fn delivered(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|delivery| delivery.outcome == DeliveryOutcome::Delivered)
            .count()
    }

    pub fn outcome_for(
        &self,
        recipient: &Recipient,
        projection: ProjectionName,
    ) -> Option<DeliveryOutcome> {
        self.deliveries
            .iter()
            .find(|delivery| {
                delivery.target.recipient == *recipient && delivery.target.projection == projection
            })
            .map(|delivery| delivery.outcome)
    }

    pub fn merge(&mut self, other: DeliveryReport) {
        self.deliveries.extend(other.deliveries);
    }
}

/// Post-write propagation: best effort, at most once per session and projection, never
/// blocking the writer.
#[derive(Debug, Clone)]
pub struct Notifier {
    registry: Arc<InstanceRegistry>,
}

impl Notifier {
    pub fn new(registry: Arc<InstanceRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    /// Call only after the write behind `event` has succeeded.
    pub fn propagate(&self, event: &ChangeEvent) -> DeliveryReport {
        let announcement = event.announcement();
        let mut reached: HashSet<(u64, ProjectionName)> = HashSet::new();
        let mut report = DeliveryReport::default();

        for target in &event.targets {
            let handle = match &target.recipient {
                Recipient::Session(address) => self.registry.lookup(address),
                Recipient::Current(portal) => self.registry.current_of(*portal),
            };

            let Some(handle) = handle else {
                debug!(
                    entity = %event.entity,
                    id = %event.entity_id,
                    recipient = ?target.recipient,
                    "no open session for recipient"
                );
                report.deliveries.push(Delivery {
                    target: target.clone(),
                    session: None,
                    instance: None,
                    outcome: DeliveryOutcome::Absent,
                });
                continue;
            };

            let outcome = if !reached.insert((handle.instance(), target.projection)) {
                DeliveryOutcome::Duplicate
            } else if target.announce {
                handle.notify(target.projection, announcement.clone())
            } else {
                handle.request_refresh(target.projection)
            };

            if outcome == DeliveryOutcome::Delivered {
                info!(
                    entity = %event.entity,
                    id = %event.entity_id,
                    session = %handle.address(),
                    projection = %target.projection,
                    "change propagated"
                );
            }

            report.deliveries.push(Delivery {
                target: target.clone(),
                session: Some(handle.address().clone()),
                instance: Some(handle.instance()),
                outcome,
            });
        }

        report
    }
}
