//! Notification sink: transient toasts surfaced to the user.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{info, warn};

#[cfg(test)]
#[path = "notify_test.rs"]
mod notify_test;

/// Default time a toast stays visible.
pub const DEFAULT_DURATION_MS: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Default,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub variant: Variant,
    pub title: String,
    pub description: String,
    pub duration_ms: u64,
}

/// Fire-and-forget toast surface.
pub trait Notifier {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, n: Notification) {
        match n.variant {
            Variant::Default => info!(title = %n.title, description = %n.description, "notification"),
            Variant::Destructive => warn!(title = %n.title, description = %n.description, "notification"),
        }
    }
}

/// Keeps every notification it receives. Clones share one buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).push(notification);
    }
}
