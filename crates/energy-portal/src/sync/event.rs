use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::projection::{PortalKind, ProjectionName, SessionAddress, SessionKey};
use crate::store::EntityKind;

/// How the notifier finds a peer session in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Recipient {
    /// The session registered under a stable key.
    Session(SessionAddress),
    /// Whatever session of this portal was constructed last. Only meaningful for portals with
    /// a single operator role, such as the admin dashboard.
    Current(PortalKind),
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(address) => write!(f, "{address}"),
            Self::Current(portal) => write!(f, "current {portal}"),
        }
    }
}

/// One peer to bring up to date after a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub recipient: Recipient,
    pub projection: ProjectionName,
    /// Quiet targets reload without showing a message.
    pub announce: bool,
}

impl Target {
    pub fn session(portal: PortalKind, key: SessionKey, projection: ProjectionName) -> Self {
        Self {
            recipient: Recipient::Session(SessionAddress { portal, key }),
            projection,
            announce: true,
        }
    }

    pub fn current(portal: PortalKind, projection: ProjectionName) -> Self {
        Self {
            recipient: Recipient::Current(portal),
            projection,
            announce: true,
        }
    }

    pub fn quiet(mut self) -> Self {
        self.announce = false;
        self
    }
}

/// Result of a successful store write, consumed immediately by the notifier.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub entity: EntityKind,
    pub entity_id: String,
    pub new_status: Option<String>,
    pub title: String,
    pub details: Vec<(String, String)>,
    pub occurred_at: DateTime<Utc>,
    pub targets: Vec<Target>,
}

impl ChangeEvent {
    pub fn new(entity: EntityKind, entity_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            entity,
            entity_id: entity_id.into(),
            new_status: None,
            title: title.into(),
            details: Vec::new(),
            occurred_at: Utc::now(),
            targets: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.new_status = Some(status.into());
        self
    }

    pub fn detail(mut self, label: &str, value: impl Into<String>) -> Self {
        self.details.push((label.to_string(), value.into()));
        self
    }

    pub fn target(mut self, target: Target) -> Self {
        self.targets.push(target);
        self
    }

    /// Adds `target` only when a recipient could be determined.
    pub fn target_opt(self, target: Option<Target>) -> Self {
        match target {
            Some(target) => self.target(target),
            None => self,
        }
    }

    pub fn announcement(&self) -> Announcement {
        let mut body = Vec::with_capacity(self.details.len() + 1);
        body.push(format!("{}: {}", self.entity, self.entity_id));
        if let Some(status) = &self.new_status {
            body.push(format!("Status: {status}"));
        }
        body.extend(
            self.details
                .iter()
                .map(|(label, value)| format!("{label}: {value}")),
        );

        Announcement {
            title: self.title.clone(),
            body: body.join("\n"),
            occurred_at: self.occurred_at,
        }
    }
}

/// One-shot informational message shown by a session after a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Announcement {
    pub title: String,
    pub body: String,
    pub occurred_at: DateTime<Utc>,
}
