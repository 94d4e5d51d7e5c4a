// Core layer - configuration, digests, validation
pub mod core;

// Features layer - registration, auth, subscription, reminders
pub mod features;

// Persistence
pub mod database;

// Presentation - HTTP API
pub mod http;

// Test doubles shared across feature tests
#[cfg(test)]
mod testing;

// Re-export core config for convenience
pub use core::Config;

pub use database::Database;

pub use features::{
    // Auth
    CredentialVerifier, TokenIssuer,
    // Notifier
    LogNotifier, Notifier, SmtpNotifier,
    // Rate limiting
    RateLimiter,
    // Registration
    ConfirmationWorkflow,
    // Reminders
    ReminderScheduler,
    // Subscription
    SubscriptionService,
};

pub use http::{router, serve, AppState};
