//! Dry-run notifier: logs what would have been sent.

use super::{Notifier, NotifyError};
use async_trait::async_trait;
use log::info;

#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, subject: &str, body: &str, recipient: &str) -> Result<(), NotifyError> {
        info!("[dry-run] email to '{recipient}': {subject}\n{body}");
        Ok(())
    }
}
