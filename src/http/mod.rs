//! # HTTP API
//!
//! axum router for the account and task endpoints. Every route sits under
//! the configured prefix (`/api/v1` by default). Responses are plain text
//! except the task endpoints, which speak JSON.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: Task list endpoints, request logging
//! - 1.1.0: Login route honors the configured prefix
//! - 1.0.0: Registration, confirmation, login, subscribe

mod auth;
pub mod error;
mod logging;
mod tasks;
mod users;

pub use auth::BearerUser;
pub use error::ApiError;

use crate::database::TaskStore;
use crate::features::{ConfirmationWorkflow, CredentialVerifier, SubscriptionService};
use axum::routing::{delete, get, patch, post};
use axum::{middleware, Router};
use log::info;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    pub registration: Arc<ConfirmationWorkflow>,
    pub credentials: Arc<CredentialVerifier>,
    pub subscriptions: Arc<SubscriptionService>,
    pub tasks: Arc<dyn TaskStore>,
}

impl AppState {
    pub fn new(
        registration: ConfirmationWorkflow,
        credentials: CredentialVerifier,
        subscriptions: SubscriptionService,
        tasks: Arc<dyn TaskStore>,
    ) -> Self {
        AppState {
            registration: Arc::new(registration),
            credentials: Arc::new(credentials),
            subscriptions: Arc::new(subscriptions),
            tasks,
        }
    }
}

/// Build the application router. An empty `prefix` mounts routes at the root.
pub fn router(state: AppState, prefix: &str) -> Router {
    let routes = Router::new()
        .route("/users/new", post(users::register))
        .route("/users/confirm-email", get(users::confirm_email))
        .route("/users/subscribe", patch(users::subscribe))
        .route("/users/login", post(users::login))
        .route("/tasks", get(tasks::list).post(tasks::add))
        .route("/tasks/{position}", delete(tasks::remove));

    let app = if prefix.is_empty() {
        routes
    } else {
        Router::new().nest(prefix, routes)
    };

    app.layer(middleware::from_fn(logging::log_requests))
        .with_state(state)
}

/// Serve `app` on `listener` until `cancel` fires, then drain in-flight requests.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("HTTP API listening on {addr}");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    info!("HTTP API stopped");
    Ok(())
}
