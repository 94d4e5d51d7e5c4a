//! # Feature: Confirmation Workflow
//!
//! Create-or-refresh the pending registration, email the confirmation link,
//! and promote the pending registration into an account on redemption.
//!
//! - **Version**: 1.2.1
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.1: Repeat requests rebind the password digest; refresh falls back to create
//! - 1.2.0: Redemption deletes the token and creates the account in one transaction
//! - 1.1.0: Per-email rate limit on confirmation emails, stale registration sweep
//! - 1.0.0: Initial release

use crate::core::hasher;
use crate::database::{AccountStore, PendingRegistrationStore, RedeemError, StoreError};
use crate::features::notifier::Notifier;
use crate::features::rate_limiting::RateLimiter;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

const REGISTRATION_ACTION: &str = "registration";

const CONFIRMATION_SUBJECT: &str = "Email confirmation";

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("user with this email already exists")]
    DuplicateAccount,
    #[error("too many confirmation requests for this email, try again later")]
    RateLimited,
    #[error("invalid confirm token")]
    InvalidToken,
    #[error("failed to delete confirm token: {0}")]
    TokenDeletionFailed(#[source] StoreError),
    #[error("failed to create account: {0}")]
    AccountCreationFailed(#[source] StoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RedeemError> for RegistrationError {
    fn from(err: RedeemError) -> Self {
        match err {
            RedeemError::InvalidToken => RegistrationError::InvalidToken,
            RedeemError::DeletionFailed(e) => RegistrationError::TokenDeletionFailed(e),
            RedeemError::AccountCreationFailed(e) => RegistrationError::AccountCreationFailed(e),
            RedeemError::Store(e) => RegistrationError::Store(e),
        }
    }
}

pub struct ConfirmationWorkflow {
    accounts: Arc<dyn AccountStore>,
    pending: Arc<dyn PendingRegistrationStore>,
    notifier: Arc<dyn Notifier>,
    /// Link base; the token is appended as `?t=<token>`.
    confirm_url: String,
    limiter: Option<RateLimiter>,
}

impl ConfirmationWorkflow {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        pending: Arc<dyn PendingRegistrationStore>,
        notifier: Arc<dyn Notifier>,
        confirm_url: impl Into<String>,
    ) -> Self {
        ConfirmationWorkflow {
            accounts,
            pending,
            notifier,
            confirm_url: confirm_url.into(),
            limiter: None,
        }
    }

    /// Cap confirmation requests per email address.
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Start (or restart) a registration and return the confirmation token.
    ///
    /// A repeat request for an unconfirmed email replaces the previous token
    /// and rebinds the password to the latest request.
    /// The confirmation email goes out on a detached task; its failure is only logged.
    pub async fn request_registration(
        &self,
        email: &str,
        password: &str,
    ) -> Result<String, RegistrationError> {
        if self.accounts.account_exists(email).await? {
            return Err(RegistrationError::DuplicateAccount);
        }

        if let Some(limiter) = &self.limiter {
            if !limiter.check_rate_limit(REGISTRATION_ACTION, email) {
                warn!("Registration rate limit hit for {email}");
                return Err(RegistrationError::RateLimited);
            }
        }

        let password_hash = hasher::hash(password);
        let token = if self.pending.has_token(email).await? {
            match self.pending.refresh_token(email, &password_hash).await {
                Ok(token) => token,
                // Swept or redeemed since the lookup
                Err(StoreError::NoPendingRegistration(_)) => {
                    self.pending.create_token(email, &password_hash).await?
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            match self.pending.create_token(email, &password_hash).await {
                Ok(token) => token,
                // Lost a race with a concurrent request for the same email
                Err(StoreError::PendingRegistrationExists(_)) => {
                    self.pending.refresh_token(email, &password_hash).await?
                }
                Err(e) => return Err(e.into()),
            }
        };

        self.send_confirmation_link(email, &token);
        Ok(token)
    }

    /// Redeem a confirmation token, creating the account. Exactly-once per token.
    /// Returns the confirmed email.
    pub async fn confirm_email(&self, token: &str) -> Result<String, RegistrationError> {
        let promoted = self.pending.redeem_token(token).await?;
        info!("Confirmed email {}", promoted.email);
        Ok(promoted.email)
    }

    pub fn confirmation_link(&self, token: &str) -> String {
        format!("{}?t={token}", self.confirm_url)
    }

    fn send_confirmation_link(&self, email: &str, token: &str) {
        let body = format!(
            "Please confirm your email by following this link:\n{}\n\n\
             If you didn't request this email, you can ignore it.",
            self.confirmation_link(token)
        );
        let notifier = Arc::clone(&self.notifier);
        let recipient = email.to_string();

        info!("Sending an email confirmation link to '{recipient}'...");
        tokio::spawn(async move {
            if let Err(e) = notifier
                .send(CONFIRMATION_SUBJECT, &body, &recipient)
                .await
            {
                warn!("Failed to send confirmation email to '{recipient}': {e}");
            }
        });
    }

    /// Purge pending registrations older than `ttl` and forget idle rate-limit entries.
    pub async fn sweep_stale(&self, ttl: Duration) -> Result<usize, StoreError> {
        if let Some(limiter) = &self.limiter {
            limiter.prune();
        }
        self.pending.purge_stale(ttl).await
    }

    /// Periodically run [`Self::sweep_stale`] until `cancel` fires.
    pub async fn run_sweeper(&self, ttl: Duration, every: Duration, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            "Stale registration sweep started (ttl: {}s, every: {}s)",
            ttl.as_secs(),
            every.as_secs()
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Stale registration sweep stopped");
                    break;
                }
                _ = interval.tick() => {
                    match self.sweep_stale(ttl).await {
                        Ok(0) => debug!("No stale pending registrations"),
                        Ok(removed) => info!("Purged {removed} stale pending registrations"),
                        Err(e) => warn!("Failed to purge stale pending registrations: {e}"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Database, PendingRegistration};
    use crate::testing::RecordingNotifier;
    use async_trait::async_trait;

    const CONFIRM_URL: &str = "http://localhost:8080/api/v1/users/confirm-email";

    fn workflow(db: &Database, notifier: Arc<RecordingNotifier>) -> ConfirmationWorkflow {
        ConfirmationWorkflow::new(
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            notifier,
            CONFIRM_URL,
        )
    }

    #[tokio::test]
    async fn test_register_then_confirm_creates_account() {
        let db = Database::open_in_memory().await.unwrap();
        let workflow = workflow(&db, Arc::new(RecordingNotifier::new()));

        let token = workflow.request_registration("a@x.com", "pw").await.unwrap();
        assert!(!db.account_exists("a@x.com").await.unwrap());

        let email = workflow.confirm_email(&token).await.unwrap();

        assert_eq!(email, "a@x.com");
        assert!(db.credentials_match("a@x.com", &hasher::hash("pw")).await.unwrap());
        assert!(db.resolve_token(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_redemption_fails() {
        let db = Database::open_in_memory().await.unwrap();
        let workflow = workflow(&db, Arc::new(RecordingNotifier::new()));
        let token = workflow.request_registration("a@x.com", "pw").await.unwrap();

        workflow.confirm_email(&token).await.unwrap();
        let err = workflow.confirm_email(&token).await.unwrap_err();

        assert!(matches!(err, RegistrationError::InvalidToken));
        let account = db.get_account("a@x.com").await.unwrap().unwrap();
        assert_eq!(account.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_repeat_request_invalidates_first_token() {
        let db = Database::open_in_memory().await.unwrap();
        let workflow = workflow(&db, Arc::new(RecordingNotifier::new()));

        let first = workflow.request_registration("a@x.com", "pw").await.unwrap();
        let second = workflow.request_registration("a@x.com", "pw").await.unwrap();

        assert_ne!(first, second);
        assert!(matches!(
            workflow.confirm_email(&first).await.unwrap_err(),
            RegistrationError::InvalidToken
        ));
        workflow.confirm_email(&second).await.unwrap();
    }

    #[tokio::test]
    async fn test_repeat_request_rebinds_password() {
        let db = Database::open_in_memory().await.unwrap();
        let workflow = workflow(&db, Arc::new(RecordingNotifier::new()));

        workflow.request_registration("v@x.com", "first").await.unwrap();
        let token = workflow.request_registration("v@x.com", "second").await.unwrap();
        workflow.confirm_email(&token).await.unwrap();

        assert!(db.credentials_match("v@x.com", &hasher::hash("second")).await.unwrap());
        assert!(!db.credentials_match("v@x.com", &hasher::hash("first")).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_redemptions_create_one_account() {
        let db = Database::open_in_memory().await.unwrap();
        let workflow = workflow(&db, Arc::new(RecordingNotifier::new()));
        let token = workflow.request_registration("a@x.com", "pw").await.unwrap();

        let (first, second) = tokio::join!(
            workflow.confirm_email(&token),
            workflow.confirm_email(&token)
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(RegistrationError::InvalidToken))));
        assert!(db.account_exists("a@x.com").await.unwrap());
        assert!(db.add_account("a@x.com", "digest").await.is_err());
    }

    /// Reports a pending registration that is gone by the time it is refreshed,
    /// as when the sweeper runs between the lookup and the update.
    struct VanishingPending(Database);

    #[async_trait]
    impl PendingRegistrationStore for VanishingPending {
        async fn token_exists(&self, token: &str) -> Result<bool, StoreError> {
            self.0.token_exists(token).await
        }

        async fn has_token(&self, _: &str) -> Result<bool, StoreError> {
            Ok(true)
        }

        async fn create_token(&self, email: &str, hash: &str) -> Result<String, StoreError> {
            self.0.create_token(email, hash).await
        }

        async fn refresh_token(&self, email: &str, hash: &str) -> Result<String, StoreError> {
            self.0.refresh_token(email, hash).await
        }

        async fn delete_token(&self, token: &str) -> Result<(), StoreError> {
            self.0.delete_token(token).await
        }

        async fn resolve_token(
            &self,
            token: &str,
        ) -> Result<Option<PendingRegistration>, StoreError> {
            self.0.resolve_token(token).await
        }

        async fn redeem_token(&self, token: &str) -> Result<PendingRegistration, RedeemError> {
            self.0.redeem_token(token).await
        }

        async fn purge_stale(&self, older_than: Duration) -> Result<usize, StoreError> {
            self.0.purge_stale(older_than).await
        }
    }

    #[tokio::test]
    async fn test_refresh_of_vanished_registration_creates_new_one() {
        let db = Database::open_in_memory().await.unwrap();
        let workflow = ConfirmationWorkflow::new(
            Arc::new(db.clone()),
            Arc::new(VanishingPending(db.clone())),
            Arc::new(RecordingNotifier::new()),
            CONFIRM_URL,
        );

        let token = workflow.request_registration("a@x.com", "pw").await.unwrap();

        let pending = db.resolve_token(&token).await.unwrap().unwrap();
        assert_eq!(pending.password_hash, hasher::hash("pw"));
    }

    #[tokio::test]
    async fn test_confirmed_email_cannot_register_again() {
        let db = Database::open_in_memory().await.unwrap();
        let workflow = workflow(&db, Arc::new(RecordingNotifier::new()));
        let token = workflow.request_registration("a@x.com", "pw").await.unwrap();
        workflow.confirm_email(&token).await.unwrap();

        let err = workflow.request_registration("a@x.com", "pw").await.unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateAccount));
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let db = Database::open_in_memory().await.unwrap();
        let workflow = workflow(&db, Arc::new(RecordingNotifier::new()));

        assert!(matches!(
            workflow.confirm_email("does-not-exist").await.unwrap_err(),
            RegistrationError::InvalidToken
        ));
    }

    #[tokio::test]
    async fn test_confirmation_email_contains_link() {
        let db = Database::open_in_memory().await.unwrap();
        let notifier = Arc::new(RecordingNotifier::new());
        let workflow = workflow(&db, notifier.clone());

        let token = workflow.request_registration("a@x.com", "pw").await.unwrap();

        let sent = notifier.wait_for(1).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "a@x.com");
        assert_eq!(sent[0].subject, CONFIRMATION_SUBJECT);
        assert!(sent[0].body.contains(&format!("{CONFIRM_URL}?t={token}")));
    }

    #[tokio::test]
    async fn test_send_failure_does_not_fail_registration() {
        let db = Database::open_in_memory().await.unwrap();
        let workflow = workflow(&db, Arc::new(RecordingNotifier::failing_for(&["a@x.com"])));

        let token = workflow.request_registration("a@x.com", "pw").await.unwrap();

        assert!(db.token_exists(&token).await.unwrap());
    }

    #[tokio::test]
    async fn test_rate_limited_requests() {
        let db = Database::open_in_memory().await.unwrap();
        let workflow = workflow(&db, Arc::new(RecordingNotifier::new()))
            .with_rate_limiter(RateLimiter::new(2, Duration::from_secs(60)));

        workflow.request_registration("a@x.com", "pw").await.unwrap();
        let last = workflow.request_registration("a@x.com", "pw").await.unwrap();
        let err = workflow.request_registration("a@x.com", "pw").await.unwrap_err();

        assert!(matches!(err, RegistrationError::RateLimited));
        // The rejected request leaves the latest token in place
        assert!(db.token_exists(&last).await.unwrap());
        workflow.request_registration("b@x.com", "pw").await.unwrap();
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_cancel() {
        let db = Database::open_in_memory().await.unwrap();
        let workflow = Arc::new(workflow(&db, Arc::new(RecordingNotifier::new())));
        let cancel = CancellationToken::new();

        let handle = {
            let workflow = workflow.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                workflow
                    .run_sweeper(Duration::from_secs(3600), Duration::from_millis(10), cancel)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
