//! # Feature: Reminder Scheduler
//!
//! Every interval: list subscribed emails, then fetch, render and send each
//! user's task list as an independent concurrent unit. One user's failure is
//! logged and never stops the others or the loop.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Per-user failure isolation, cancellation between ticks and units
//! - 1.0.0: Initial release

use super::render::render_task_list;
use crate::database::{AccountStore, TaskStore};
use crate::features::notifier::Notifier;
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Counters for one tick. `sent` includes unsubscribe notices.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub sent: usize,
    pub unsubscribed: usize,
    pub failed: usize,
    pub skipped: usize,
}

enum Delivery {
    Sent,
    Unsubscribed,
    Skipped,
}

#[derive(Clone)]
pub struct ReminderScheduler {
    accounts: Arc<dyn AccountStore>,
    tasks: Arc<dyn TaskStore>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
}

impl ReminderScheduler {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        tasks: Arc<dyn TaskStore>,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
    ) -> Self {
        ReminderScheduler {
            accounts,
            tasks,
            notifier,
            interval,
        }
    }

    /// Tick immediately, then once per interval, until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Reminder scheduler started (interval: {}s)",
            self.interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Reminder scheduler stopped");
                    break;
                }
                _ = interval.tick() => {}
            }

            match self.tick(&cancel).await {
                Ok(report) => info!(
                    "Reminder tick done: {} sent, {} unsubscribed, {} failed, {} skipped",
                    report.sent, report.unsubscribed, report.failed, report.skipped
                ),
                Err(e) => error!("Reminder tick aborted: {e:#}"),
            }
        }
    }

    /// One pass over every subscribed user. Fails only when the subscriber
    /// list itself cannot be read.
    pub async fn tick(&self, cancel: &CancellationToken) -> Result<TickReport> {
        debug!("Sending reminders");
        let emails = self
            .accounts
            .list_subscribed_emails()
            .await
            .context("failed to list subscribed emails")?;

        let mut report = TickReport::default();
        let mut units = JoinSet::new();

        for email in emails {
            if cancel.is_cancelled() {
                report.skipped += 1;
                continue;
            }
            let unit = self.clone();
            let cancel = cancel.clone();
            units.spawn(async move {
                let outcome = unit.dispatch(&email, &cancel).await;
                (email, outcome)
            });
        }

        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((_, Ok(Delivery::Sent))) => report.sent += 1,
                Ok((_, Ok(Delivery::Unsubscribed))) => {
                    report.sent += 1;
                    report.unsubscribed += 1;
                }
                Ok((_, Ok(Delivery::Skipped))) => report.skipped += 1,
                Ok((email, Err(e))) => {
                    report.failed += 1;
                    warn!("Reminder for {email} failed: {e:#}");
                }
                Err(e) => {
                    report.failed += 1;
                    error!("Reminder unit panicked: {e}");
                }
            }
        }

        Ok(report)
    }

    /// fetch → render → (unsubscribe) → send, strictly in that order.
    async fn dispatch(&self, email: &str, cancel: &CancellationToken) -> Result<Delivery> {
        if cancel.is_cancelled() {
            return Ok(Delivery::Skipped);
        }

        let items = self
            .tasks
            .list_tasks(email)
            .await
            .with_context(|| format!("failed to fetch task list for {email}"))?;

        let reminder = render_task_list(&items);

        if reminder.unsubscribe {
            self.accounts
                .set_subscribed(email, false)
                .await
                .with_context(|| format!("failed to unsubscribe {email}"))?;
            info!("Unsubscribed {email}: task list is empty");
        }

        self.notifier
            .send(&reminder.subject, &reminder.body, email)
            .await
            .with_context(|| format!("failed to send reminder to {email}"))?;

        Ok(if reminder.unsubscribe {
            Delivery::Unsubscribed
        } else {
            Delivery::Sent
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Account, Database, StoreError};
    use crate::features::reminders::render::{TASK_LIST_SUBJECT, UNSUBSCRIBED_SUBJECT};
    use crate::testing::RecordingNotifier;
    use async_trait::async_trait;

    /// A subscribed with two tasks, B subscribed with none, C not subscribed.
    async fn seeded() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        for email in ["a@x.com", "b@x.com", "c@x.com"] {
            db.add_account(email, "digest").await.unwrap();
        }
        db.set_subscribed("a@x.com", true).await.unwrap();
        db.set_subscribed("b@x.com", true).await.unwrap();
        db.add_task("a@x.com", "buy milk").await.unwrap();
        db.add_task("a@x.com", "call mom").await.unwrap();
        db.add_task("c@x.com", "unseen").await.unwrap();
        db
    }

    fn scheduler(db: &Database, notifier: Arc<RecordingNotifier>) -> ReminderScheduler {
        ReminderScheduler::new(
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            notifier,
            Duration::from_secs(3600),
        )
    }

    async fn subscribed(db: &Database, email: &str) -> bool {
        db.get_account(email).await.unwrap().unwrap().subscribed
    }

    #[tokio::test]
    async fn test_tick_sends_lists_and_unsubscribes_empty() {
        let db = seeded().await;
        let notifier = Arc::new(RecordingNotifier::new());

        let report = scheduler(&db, notifier.clone())
            .tick(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            report,
            TickReport {
                sent: 2,
                unsubscribed: 1,
                failed: 0,
                skipped: 0
            }
        );
        assert_eq!(notifier.sent().len(), 2);

        let to_a = notifier.sent_to("a@x.com");
        assert_eq!(to_a.len(), 1);
        assert_eq!(to_a[0].subject, TASK_LIST_SUBJECT);
        assert_eq!(to_a[0].body, "1. buy milk\n2. call mom");

        let to_b = notifier.sent_to("b@x.com");
        assert_eq!(to_b.len(), 1);
        assert_eq!(to_b[0].subject, UNSUBSCRIBED_SUBJECT);
        assert!(notifier.sent_to("c@x.com").is_empty());

        assert!(subscribed(&db, "a@x.com").await);
        assert!(!subscribed(&db, "b@x.com").await);
        assert!(!subscribed(&db, "c@x.com").await);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_others() {
        let db = seeded().await;
        let notifier = Arc::new(RecordingNotifier::failing_for(&["a@x.com"]));

        let report = scheduler(&db, notifier.clone())
            .tick(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.sent, 1);
        let to_b = notifier.sent_to("b@x.com");
        assert_eq!(to_b.len(), 1);
        assert_eq!(to_b[0].subject, UNSUBSCRIBED_SUBJECT);
        assert!(subscribed(&db, "a@x.com").await);
    }

    #[tokio::test]
    async fn test_cancelled_tick_skips_units() {
        let db = seeded().await;
        let notifier = Arc::new(RecordingNotifier::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = scheduler(&db, notifier.clone()).tick(&cancel).await.unwrap();

        assert_eq!(report.skipped, 2);
        assert!(notifier.sent().is_empty());
        assert!(subscribed(&db, "b@x.com").await);
    }

    #[tokio::test]
    async fn test_run_ticks_immediately_and_stops_on_cancel() {
        let db = seeded().await;
        let notifier = Arc::new(RecordingNotifier::new());
        let scheduler = scheduler(&db, notifier.clone());
        let cancel = CancellationToken::new();

        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler.run(cancel).await })
        };

        assert_eq!(notifier.wait_for(2).await.len(), 2);
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    /// Account store whose subscriber listing always fails.
    struct BrokenAccounts;

    fn broken() -> StoreError {
        StoreError::Sqlite(sqlite::Error {
            code: Some(1),
            message: Some("disk on fire".into()),
        })
    }

    #[async_trait]
    impl AccountStore for BrokenAccounts {
        async fn add_account(&self, _: &str, _: &str) -> Result<i64, StoreError> {
            Err(broken())
        }
        async fn account_exists(&self, _: &str) -> Result<bool, StoreError> {
            Err(broken())
        }
        async fn get_account(&self, _: &str) -> Result<Option<Account>, StoreError> {
            Err(broken())
        }
        async fn credentials_match(&self, _: &str, _: &str) -> Result<bool, StoreError> {
            Err(broken())
        }
        async fn set_subscribed(&self, _: &str, _: bool) -> Result<(), StoreError> {
            Err(broken())
        }
        async fn list_subscribed_emails(&self) -> Result<Vec<String>, StoreError> {
            Err(broken())
        }
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_tick_but_not_loop() {
        let db = Database::open_in_memory().await.unwrap();
        let scheduler = ReminderScheduler::new(
            Arc::new(BrokenAccounts),
            Arc::new(db),
            Arc::new(RecordingNotifier::new()),
            Duration::from_millis(10),
        );
        let cancel = CancellationToken::new();

        let err = scheduler.tick(&cancel).await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to list subscribed emails"));

        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler.run(cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
