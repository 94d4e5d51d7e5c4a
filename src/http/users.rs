//! `/users/*` handlers: registration, confirmation, login and the subscribe toggle.

use super::auth::BearerUser;
use super::error::ApiError;
use super::AppState;
use crate::core::{is_valid_email, parse_bool};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

#[derive(Deserialize)]
struct CredentialsBody {
    email: String,
    password: String,
}

/// Parse `{"email", "password"}` and reject obviously bad input.
fn parse_credentials(body: &Bytes) -> Result<(String, String), ApiError> {
    let parsed: CredentialsBody = serde_json::from_slice(body)
        .map_err(|e| ApiError::Validation(format!("invalid request body: {e}")))?;

    let email = parsed.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("invalid email address".into()));
    }
    if parsed.password.is_empty() {
        return Err(ApiError::Validation("password must not be empty".into()));
    }
    Ok((email, parsed.password))
}

#[derive(Deserialize)]
pub struct ConfirmQuery {
    t: Option<String>,
}

#[derive(Deserialize)]
pub struct SubscribeQuery {
    subscribe: Option<String>,
}

/// `POST /users/new`: answers with the confirmation token.
pub async fn register(State(state): State<AppState>, body: Bytes) -> Result<String, ApiError> {
    let (email, password) = parse_credentials(&body)?;
    let token = state.registration.request_registration(&email, &password).await?;
    Ok(token)
}

/// `GET /users/confirm-email?t=<token>`
pub async fn confirm_email(
    State(state): State<AppState>,
    Query(query): Query<ConfirmQuery>,
) -> Result<(StatusCode, &'static str), ApiError> {
    let token = query
        .t
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Authorization("invalid confirm token".into()))?;

    state.registration.confirm_email(&token).await?;
    Ok((StatusCode::CREATED, "Email confirmed successfully"))
}

/// `PATCH /users/subscribe?subscribe=<bool>`. The bearer token is checked first.
pub async fn subscribe(
    State(state): State<AppState>,
    BearerUser(email): BearerUser,
    Query(query): Query<SubscribeQuery>,
) -> Result<StatusCode, ApiError> {
    let raw = query
        .subscribe
        .ok_or_else(|| ApiError::Validation("missing subscribe parameter".into()))?;
    let subscribed = parse_bool(&raw)
        .ok_or_else(|| ApiError::Validation(format!("invalid subscribe value {raw:?}")))?;

    state.subscriptions.subscribe(&email, subscribed).await?;
    Ok(StatusCode::OK)
}

/// `POST /users/login`: answers with a bearer token.
pub async fn login(State(state): State<AppState>, body: Bytes) -> Result<String, ApiError> {
    let (email, password) = parse_credentials(&body)?;
    let token = state.credentials.login(&email, &password).await?;
    Ok(token)
}
