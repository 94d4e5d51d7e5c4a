//! `/tasks` handlers. A user only ever sees their own list.

use super::auth::BearerUser;
use super::error::ApiError;
use super::AppState;
use crate::database::TaskListItem;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

#[derive(Deserialize)]
struct NewTask {
    value: String,
}

pub async fn list(
    State(state): State<AppState>,
    BearerUser(email): BearerUser,
) -> Result<Json<Vec<TaskListItem>>, ApiError> {
    Ok(Json(state.tasks.list_tasks(&email).await?))
}

pub async fn add(
    State(state): State<AppState>,
    BearerUser(email): BearerUser,
    body: Bytes,
) -> Result<(StatusCode, Json<TaskListItem>), ApiError> {
    let task: NewTask = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("invalid request body: {e}")))?;
    let value = task.value.trim();
    if value.is_empty() {
        return Err(ApiError::Validation("task must not be empty".into()));
    }

    let item = state.tasks.add_task(&email, value).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn remove(
    State(state): State<AppState>,
    BearerUser(email): BearerUser,
    Path(position): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if state.tasks.remove_task(&email, position).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("no task at position {position}")))
    }
}
