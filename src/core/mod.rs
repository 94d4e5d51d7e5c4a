//! # Core Module
//!
//! Configuration, password digests and request validation shared by every feature.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Add validation module (email syntax, boolean query values)
//! - 1.0.0: Initial creation with config and hasher modules

pub mod config;
pub mod hasher;
pub mod validation;

// Re-export commonly used items
pub use config::{Config, ConfigError, SmtpConfig};
pub use validation::{is_valid_email, parse_bool};
