use axum::routing::{get, post};
use axum::Router;

use crate::handlers::tasks;
use crate::state::AppState;

/// Routes mounted at `/tasks`.
///
/// ```text
/// POST   /                -> submit_task
/// POST   /schedule        -> schedule_tasks
/// GET    /{id}            -> get_task
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(tasks::submit_task))
        .route("/schedule", post(tasks::schedule_tasks))
        .route("/{id}", get(tasks::get_task))
}
