use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use super::event::Announcement;
use super::projection::{ProjectionName, SessionAddress};
use crate::store::Row;

/// Widget layer a session renders into. Every call comes from the owning session's task.
pub trait DisplaySink: Send + Sync {
    fn render(&self, session: &SessionAddress, projection: ProjectionName, rows: &[Row]);
    fn announce(&self, session: &SessionAddress, announcement: &Announcement);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayEntry {
    Render {
        session: SessionAddress,
        projection: ProjectionName,
        rows: usize,
    },
    Announce {
        session: SessionAddress,
        announcement: Announcement,
    },
}

/// Headless display that records what each session showed.
#[derive(Debug, Default, Clone)]
pub struct MessageLog {
    entries: Arc<Mutex<Vec<DisplayEntry>>>,
}

impl MessageLog {
    pub fn entries(&self) -> Vec<DisplayEntry> {
        self.lock().clone()
    }

    pub fn announcements_for(&self, session: &SessionAddress) -> Vec<Announcement> {
        self.lock()
            .iter()
            .filter_map(|entry| match entry {
                DisplayEntry::Announce {
                    session: shown_to,
                    announcement,
                } if shown_to == session => Some(announcement.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn announcement_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|entry| matches!(entry, DisplayEntry::Announce { .. }))
            .count()
    }

    pub fn render_count(&self, session: &SessionAddress, projection: ProjectionName) -> usize {
        self.lock()
            .iter()
            .filter(|entry| {
                matches!(
                    entry,
                    DisplayEntry::Render { session: rendered, projection: name, .. }
                        if rendered == session && *name == projection
                )
            })
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DisplayEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DisplaySink for MessageLog {
    fn render(&self, session: &SessionAddress, projection: ProjectionName, rows: &[Row]) {
        self.lock().push(DisplayEntry::Render {
            session: session.clone(),
            projection,
            rows: rows.len(),
        });
    }

    fn announce(&self, session: &SessionAddress, announcement: &Announcement) {
        self.lock().push(DisplayEntry::Announce {
            session: session.clone(),
            announcement: announcement.clone(),
        });
    }
}
