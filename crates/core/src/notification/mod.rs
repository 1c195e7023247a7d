use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// User-facing message. A `duration` of `None` keeps it on screen until the
/// user dismisses it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub duration: Option<Duration>,
    pub severity: Severity,
}

const DEFAULT_DURATION: Duration = Duration::from_secs(5);

impl Notification {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            duration: Some(DEFAULT_DURATION),
            severity,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Info)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Warning)
    }

    /// Errors stay visible until dismissed.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Error).sticky()
    }

    pub fn sticky(mut self) -> Self {
        self.duration = None;
        self
    }
}

/// Fire-and-forget consumer of engine notifications.
pub trait NotificationSink {
    fn notify(&self, notification: Notification);
}

/// Mirrors notifications into the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let Notification {
            message, severity, ..
        } = notification;
        match severity {
            Severity::Error => tracing::error!(%message, "notification"),
            Severity::Warning => tracing::warn!(%message, "notification"),
            Severity::Info | Severity::Success => tracing::info!(%message, "notification"),
        }
    }
}

/// Collects notifications in memory. Clones share the same buffer, so a host
/// can hand one clone to the engine and read the other.
#[derive(Debug, Default, Clone)]
pub struct NotificationLog {
    entries: Arc<Mutex<Vec<Notification>>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.snapshot()
            .iter()
            .filter(|entry| entry.message.contains(needle))
            .count()
    }
}

impl NotificationSink for NotificationLog {
    fn notify(&self, notification: Notification) {
        tracing::debug!(message = %notification.message, "notification recorded");
        match self.entries.lock() {
            Ok(mut entries) => entries.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}

/// Fans a notification out to several sinks.
impl<A: NotificationSink, B: NotificationSink> NotificationSink for (A, B) {
    fn notify(&self, notification: Notification) {
        self.0.notify(notification.clone());
        self.1.notify(notification);
    }
}
