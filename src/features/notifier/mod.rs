//! # Notifier Feature
//!
//! Outbound subject/body/recipient messages: confirmation links and reminder digests.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Dry-run LogNotifier for deployments without SMTP
//! - 1.0.0: Initial SMTP delivery

pub mod log_only;
pub mod smtp;

pub use log_only::LogNotifier;
pub use smtp::SmtpNotifier;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid address {address:?}: {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("notifier unavailable: {0}")]
    Unavailable(String),
}

/// Delivers a plain-text message to one recipient.
///
/// Implementations are shared between request handlers and the reminder
/// scheduler, so they must tolerate concurrent callers.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str, recipient: &str) -> Result<(), NotifyError>;
}
