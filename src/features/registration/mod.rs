//! # Registration Feature
//!
//! Two-phase signup: a pending registration holds the credentials until the
//! emailed single-use token is redeemed, at which point the account is created.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod workflow;

pub use workflow::{ConfirmationWorkflow, RegistrationError};
