//! Cross-session propagation: open portal sessions, the registry that addresses them, and the
//! notifier that brings peers up to date after a successful store write.
//!
//! Each session is a tokio task draining a bounded inbox. Nothing outside the task touches its
//! projection caches; the notifier only posts commands and never waits on a peer.

pub mod display;
pub mod event;
pub mod host;
pub mod notifier;
pub mod projection;
pub mod registry;
pub mod session;

#[cfg(test)]
mod tests;

pub use display::{DisplayEntry, DisplaySink, MessageLog};
pub use event::{Announcement, ChangeEvent, Recipient, Target};
pub use host::PortalHost;
pub use notifier::{Delivery, DeliveryOutcome, DeliveryReport, Notifier};
pub use projection::{
    PortalKind, Projection, ProjectionName, ProjectionSource, SessionAddress, SessionKey,
};
pub use registry::InstanceRegistry;
pub use session::{SessionConfig, SessionError, SessionHandle};
