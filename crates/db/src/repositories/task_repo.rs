//! Repository for the `tasks` table.
//!
//! Uses `TaskStatus` from `models::status` for every status literal.
//! Every update is a single-row statement keyed by task ID, and none of
//! them touch a row that is already terminal.

use genq_core::types::DbId;
use sqlx::PgPool;

use crate::models::status::{StatusId, TaskStatus};
use crate::models::task::Task;

/// Column list for `tasks` queries.
const COLUMNS: &str = "\
    id, parameters, user_id, status_id, result, message, \
    created_at, updated_at";

/// Terminal statuses: success, fail.
const TERMINAL_STATUSES: [StatusId; 2] = [TaskStatus::Success as StatusId, TaskStatus::Fail as StatusId];

/// Provides query and update operations for generation tasks.
pub struct TaskRepo;

impl TaskRepo {
    /// Insert a new task in `Init` status.
    pub async fn create(pool: &PgPool, user_id: DbId, parameters: &str) -> Result<Task, sqlx::Error> {
        let query = format!(
            "INSERT INTO tasks (parameters, user_id, status_id) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(parameters)
            .bind(user_id)
            .bind(TaskStatus::Init.id())
            .fetch_one(pool)
            .await
    }

    /// Find a task by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Task>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tasks WHERE id = $1");
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List up to `limit` tasks in `status`, lowest ID first.
    pub async fn find_by_status(
        pool: &PgPool,
        status: TaskStatus,
        limit: i64,
    ) -> Result<Vec<Task>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tasks \
             WHERE status_id = $1 \
             ORDER BY id ASC \
             LIMIT $2"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(status.id())
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Overwrite the status of a non-terminal task.
    ///
    /// Returns `true` if a row was updated.
    pub async fn update_status(
        pool: &PgPool,
        id: DbId,
        status: TaskStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($3, $4)",
        )
        .bind(id)
        .bind(status.id())
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Overwrite status, result and message of a non-terminal task.
    pub async fn update_status_and_result(
        pool: &PgPool,
        id: DbId,
        status: TaskStatus,
        result: Option<&str>,
        message: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE tasks SET status_id = $2, result = $3, message = $4, updated_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($5, $6)",
        )
        .bind(id)
        .bind(status.id())
        .bind(result)
        .bind(message)
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Move a task from `from` to `to` only if it is currently in `from`.
    ///
    /// Used as the claim step: of several workers racing on the same
    /// `Init` row, exactly one sees `true`.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET status_id = $3, updated_at = NOW() \
             WHERE id = $1 AND status_id = $2",
        )
        .bind(id)
        .bind(from.id())
        .bind(to.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
