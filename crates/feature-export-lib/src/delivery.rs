//! Delivery of finished export files
//!
//! A sink receives the final content together with its file name and MIME
//! type and makes it available to the user. It is also the channel for the
//! single user-visible notice emitted when an export fails.

use crate::Artifact;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sink rejected {file_name}: {reason}")]
    Rejected { file_name: String, reason: String },
}

pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Destination for finished exports
pub trait DeliverySink: Send + Sync {
    /// Hand the final file to the user
    fn deliver(&self, content: &str, file_name: &str, mime_type: &str) -> DeliveryResult<()>;

    /// Tell the user an export failed
    fn notify_failure(&self, message: &str) {
        tracing::error!("{message}");
    }
}

/// Sink that keeps deliveries and notices in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    deliveries: Mutex<Vec<Artifact>>,
    notices: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files delivered so far, in delivery order
    pub fn deliveries(&self) -> Vec<Artifact> {
        self.deliveries
            .lock()
            .map(|deliveries| deliveries.clone())
            .unwrap_or_default()
    }

    /// Failure notices shown so far
    pub fn notices(&self) -> Vec<String> {
        self.notices
            .lock()
            .map(|notices| notices.clone())
            .unwrap_or_default()
    }
}

impl DeliverySink for MemorySink {
    fn deliver(&self, content: &str, file_name: &str, mime_type: &str) -> DeliveryResult<()> {
        let mut deliveries = self
            .deliveries
            .lock()
            .map_err(|e| DeliveryError::Rejected {
                file_name: file_name.to_string(),
                reason: format!("mutex poisoned: {e:?}"),
            })?;
        deliveries.push(Artifact {
            content: content.to_string(),
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
        });
        Ok(())
    }

    fn notify_failure(&self, message: &str) {
        tracing::error!("{message}");
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(message.to_string());
        }
    }
}
