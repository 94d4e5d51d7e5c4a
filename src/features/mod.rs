//! # Features
//!
//! - `auth`: bearer tokens and password login
//! - `notifier`: outbound email
//! - `rate_limiting`: sliding-window request limits
//! - `registration`: email-confirmed signup
//! - `reminders`: periodic task-list emails
//! - `subscription`: reminder opt-in/opt-out

pub mod auth;
pub mod notifier;
pub mod rate_limiting;
pub mod registration;
pub mod reminders;
pub mod subscription;

pub use auth::{CredentialVerifier, TokenIssuer};
pub use notifier::{LogNotifier, Notifier, SmtpNotifier};
pub use rate_limiting::RateLimiter;
pub use registration::ConfirmationWorkflow;
pub use reminders::ReminderScheduler;
pub use subscription::SubscriptionService;
