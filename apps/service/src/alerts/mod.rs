//! Outbound alert delivery.
//!
//! The monitor only ever calls [`AlertDispatcher::send`]; retries and
//! escalation are not its business.

use async_trait::async_trait;
use thiserror::Error;

pub mod twilio;

pub use twilio::{TwilioConfig, TwilioSms};

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Invalid or missing parameters: {0}")]
    InvalidParameters(String),
    #[error("Provider rejected the message with status code {0}")]
    Rejected(u16),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// A sink for alert messages
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    /// Deliver `message` to `contact`
    async fn send(&self, contact: &str, message: &str) -> Result<(), AlertError>;
}

/// Dispatcher used when no provider is configured; alerts only reach the log
#[derive(Debug, Default)]
pub struct LogOnlyDispatcher;

#[async_trait]
impl AlertDispatcher for LogOnlyDispatcher {
    async fn send(&self, contact: &str, message: &str) -> Result<(), AlertError> {
        tracing::info!(contact, message, "Alert not delivered, no alert provider configured");
        Ok(())
    }
}
