//! # Auth Feature
//!
//! Bearer token issuance/verification and password login.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false

pub mod credentials;
pub mod token;

pub use credentials::{AuthorizeError, CredentialVerifier, LoginError};
pub use token::{BearerClaims, TokenError, TokenIssuer};
