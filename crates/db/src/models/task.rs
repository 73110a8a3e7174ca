//! Task entity model.

use genq_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::{StatusId, TaskStatus};

/// A row from the `tasks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Task {
    pub id: DbId,
    /// Raw submitted payload. Not guaranteed to be valid JSON.
    pub parameters: String,
    pub user_id: DbId,
    pub status_id: StatusId,
    /// First generated artifact, set on success.
    pub result: Option<String>,
    /// Failure diagnostic, set on failure.
    pub message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Task {
    /// Typed status, or `None` if the row carries an unknown status ID.
    pub fn status(&self) -> Option<TaskStatus> {
        TaskStatus::from_id(self.status_id)
    }
}
