//! Handlers for the `/tasks` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use genq_core::error::CoreError;
use genq_core::types::DbId;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/tasks
///
/// Store the raw request body as a new task in `Init`. The body is not
/// validated here; a malformed payload fails when it is dispatched.
pub async fn submit_task(State(state): State<AppState>, body: String) -> AppResult<impl IntoResponse> {
    if body.trim().is_empty() {
        return Err(AppError::BadRequest("task parameters are empty".into()));
    }

    let task = state.store.create(&body).await?;
    tracing::info!(task_id = task.id, "Task submitted");

    Ok((StatusCode::CREATED, Json(DataResponse { data: task })))
}

/// GET /api/v1/tasks/{id}
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let task = state
        .store
        .find_by_id(id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Task", id }))?;

    Ok(Json(DataResponse { data: task }))
}

/// POST /api/v1/tasks/schedule
///
/// Run one dispatch cycle with the limit from `SCHEDULE_TASK_LIMIT`.
/// Responds once the batch is handed out; worker outcomes show up later
/// on the tasks themselves.
pub async fn schedule_tasks(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let report = state.dispatcher.run_cycle_from_env().await?;
    Ok(Json(DataResponse { data: report }))
}
