//! Store contracts consumed by the registration workflow, the auth feature and
//! the reminder scheduler.
//!
//! [`Database`](super::Database) implements all three traits; the traits exist so
//! features depend on the narrow operation set they need, and so every
//! implementation is safe to share across the request path and background tasks.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Atomic `redeem_token` and `purge_stale` on pending registrations
//! - 1.0.0: Initial contracts

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlite::Error),
    #[error("an account for {0} already exists")]
    DuplicateAccount(String),
    #[error("no account for {0}")]
    NoSuchAccount(String),
    #[error("a pending registration for {0} already exists")]
    PendingRegistrationExists(String),
    #[error("no pending registration for {0}")]
    NoPendingRegistration(String),
    #[error("no such token")]
    UnknownToken,
}

/// Outcome of a failed [`PendingRegistrationStore::redeem_token`].
#[derive(Debug, Error)]
pub enum RedeemError {
    #[error("invalid confirm token")]
    InvalidToken,
    #[error("failed to delete confirm token: {0}")]
    DeletionFailed(#[source] StoreError),
    #[error("failed to create account: {0}")]
    AccountCreationFailed(#[source] StoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A confirmed account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub subscribed: bool,
}

/// An unconfirmed signup awaiting proof of email ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRegistration {
    pub email: String,
    pub password_hash: String,
    pub token: String,
}

/// One entry of a user's task list. Positions are contiguous from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskListItem {
    pub position: i64,
    pub value: String,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create a confirmed account, returning its id.
    async fn add_account(&self, email: &str, password_hash: &str) -> Result<i64, StoreError>;

    async fn account_exists(&self, email: &str) -> Result<bool, StoreError>;

    async fn get_account(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// True only when an account exists for `email` with exactly this digest.
    async fn credentials_match(&self, email: &str, password_hash: &str)
        -> Result<bool, StoreError>;

    async fn set_subscribed(&self, email: &str, subscribed: bool) -> Result<(), StoreError>;

    async fn list_subscribed_emails(&self) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
pub trait PendingRegistrationStore: Send + Sync {
    async fn token_exists(&self, token: &str) -> Result<bool, StoreError>;

    async fn has_token(&self, email: &str) -> Result<bool, StoreError>;

    /// Record a pending registration and return its freshly minted token.
    async fn create_token(&self, email: &str, password_hash: &str) -> Result<String, StoreError>;

    /// Replace the token and password digest of an existing pending
    /// registration. The previous token stops resolving.
    async fn refresh_token(&self, email: &str, password_hash: &str) -> Result<String, StoreError>;

    async fn delete_token(&self, token: &str) -> Result<(), StoreError>;

    async fn resolve_token(&self, token: &str) -> Result<Option<PendingRegistration>, StoreError>;

    /// Remove the pending registration behind `token` and create its account
    /// as one atomic unit. Either both happen or neither does.
    async fn redeem_token(&self, token: &str) -> Result<PendingRegistration, RedeemError>;

    /// Drop pending registrations older than `older_than`. Returns how many were removed.
    async fn purge_stale(&self, older_than: Duration) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Tasks for `email` ordered by position.
    async fn list_tasks(&self, email: &str) -> Result<Vec<TaskListItem>, StoreError>;

    /// Append a task to the end of the list.
    async fn add_task(&self, email: &str, value: &str) -> Result<TaskListItem, StoreError>;

    /// Remove the task at `position`, shifting later tasks up by one.
    /// Returns false when no task sits at that position.
    async fn remove_task(&self, email: &str, position: i64) -> Result<bool, StoreError>;
}
