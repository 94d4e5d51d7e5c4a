//! HTTP error taxonomy and status mapping. Every rejection carries a
//! plain-text reason; internal failures are logged and answered generically.

use crate::database::StoreError;
use crate::features::auth::{AuthorizeError, LoginError, TokenError};
use crate::features::registration::RegistrationError;
use crate::features::subscription::SubscriptionError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::{debug, error};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed body or query parameters.
    #[error("{0}")]
    Validation(String),
    /// Bad credentials, bad token, unknown subject.
    #[error("{0}")]
    Authorization(String),
    /// Email already registered. Answered with 403 like the rest of the auth failures.
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    RateLimited(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Authorization(_) | ApiError::Conflict(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let reason = match self {
            ApiError::Internal(detail) => {
                error!("Internal error: {detail}");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, reason).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<RegistrationError> for ApiError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::DuplicateAccount => ApiError::Conflict(err.to_string()),
            RegistrationError::RateLimited => ApiError::RateLimited(err.to_string()),
            RegistrationError::InvalidToken | RegistrationError::TokenDeletionFailed(_) => {
                ApiError::Authorization(err.to_string())
            }
            RegistrationError::AccountCreationFailed(_) | RegistrationError::Store(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<LoginError> for ApiError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::InvalidCredentials => ApiError::Authorization(err.to_string()),
            LoginError::Token(e) => ApiError::Internal(e.to_string()),
            LoginError::Store(e) => e.into(),
        }
    }
}

impl From<AuthorizeError> for ApiError {
    fn from(err: AuthorizeError) -> Self {
        match err {
            AuthorizeError::Token(e) => {
                // Expired and forged tokens get the same status; the log tells them apart
                match e {
                    TokenError::Expired => debug!("Rejected expired bearer token"),
                    TokenError::InvalidSignature => {
                        debug!("Rejected bearer token with bad signature")
                    }
                    _ => debug!("Rejected malformed bearer token"),
                }
                ApiError::Authorization(e.to_string())
            }
            AuthorizeError::UnknownAccount(_) => ApiError::Authorization("unknown account".into()),
            AuthorizeError::Store(e) => e.into(),
        }
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::UnknownAccount(_) => {
                ApiError::Authorization("unknown account".into())
            }
            SubscriptionError::Store(e) => e.into(),
        }
    }
}
