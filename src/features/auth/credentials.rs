//! # Credential Verification
//!
//! Login and bearer-token authorization against confirmed accounts.
//! "Wrong password" and "no such account" collapse into one outcome so
//! a failed login never reveals whether an email is registered.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.2.0
//!
//! ## Changelog
//! - 1.1.0: `authorize` resolves bearer subjects to existing accounts
//! - 1.0.0: Initial login support

use super::token::{TokenError, TokenIssuer};
use crate::core::hasher;
use crate::database::{AccountStore, StoreError};
use log::debug;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum AuthorizeError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("no account for {0}")]
    UnknownAccount(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct CredentialVerifier {
    accounts: Arc<dyn AccountStore>,
    issuer: Arc<TokenIssuer>,
}

impl CredentialVerifier {
    pub fn new(accounts: Arc<dyn AccountStore>, issuer: Arc<TokenIssuer>) -> Self {
        CredentialVerifier { accounts, issuer }
    }

    /// True iff a confirmed account exists for `email` and `password` matches it.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<bool, StoreError> {
        self.accounts
            .credentials_match(email, &hasher::hash(password))
            .await
    }

    /// Issue a bearer token for valid credentials.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, LoginError> {
        if !self.authenticate(email, password).await? {
            debug!("Rejected login for {email}");
            return Err(LoginError::InvalidCredentials);
        }
        Ok(self.issuer.issue(email)?)
    }

    /// Resolve a raw bearer token to the email of an existing account.
    pub async fn authorize(&self, raw_token: &str) -> Result<String, AuthorizeError> {
        let claims = self.issuer.verify(raw_token)?;
        if !self.accounts.account_exists(&claims.sub).await? {
            return Err(AuthorizeError::UnknownAccount(claims.sub));
        }
        Ok(claims.sub)
    }
}
