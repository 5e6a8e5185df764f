//! Best-effort notification sink.

use std::sync::Mutex;

use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Error, PartialEq)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

pub trait Notifier: Send {
    fn notify(&self, message: &str) -> Result<(), NotifyError>;
}

/// Send `message`, logging and discarding any failure.
pub fn notify_best_effort(notifier: &dyn Notifier, message: &str) {
    if let Err(e) = notifier.notify(message) {
        warn!(error = %e, message, "notification dropped");
    }
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        info!(target: "bandlab::notify", "{message}");
        Ok(())
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    messages: Mutex<Vec<String>>,
}

impl MemoryNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        self.messages
            .lock()
            .map_err(|_| NotifyError("message store poisoned".into()))?
            .push(message.to_string());
        Ok(())
    }
}
