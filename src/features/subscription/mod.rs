//! # Subscription Feature
//!
//! Opt in to / out of the periodic task-list email.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Skip the write when the flag already matches
//! - 1.0.0: Initial release

use crate::database::{AccountStore, StoreError};
use log::{debug, info};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("no account for {0}")]
    UnknownAccount(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct SubscriptionService {
    accounts: Arc<dyn AccountStore>,
}

impl SubscriptionService {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        SubscriptionService { accounts }
    }

    /// Set the subscribed flag for an existing account. Repeating the same
    /// value is a no-op.
    pub async fn subscribe(&self, email: &str, subscribed: bool) -> Result<(), SubscriptionError> {
        let account = self
            .accounts
            .get_account(email)
            .await?
            .ok_or_else(|| SubscriptionError::UnknownAccount(email.to_string()))?;

        if account.subscribed == subscribed {
            debug!("{email} already has subscribed = {subscribed}");
            return Ok(());
        }

        match self.accounts.set_subscribed(email, subscribed).await {
            Ok(()) => {}
            // Deleted between the check and the update
            Err(StoreError::NoSuchAccount(_)) => {
                return Err(SubscriptionError::UnknownAccount(email.to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            "{email} {} reminders",
            if subscribed { "subscribed to" } else { "unsubscribed from" }
        );
        Ok(())
    }
}
