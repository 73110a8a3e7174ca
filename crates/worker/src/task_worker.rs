//! Execution of a single dispatched task.
//!
//! A [`TaskWorker`] takes a task the dispatcher has already claimed,
//! builds the family request, performs one exchange with the model's
//! backend and persists the outcome. Every
//! outcome is a side effect on the task row; nothing is returned to the
//! dispatcher.

use std::sync::Arc;

use genq_backend::codec::{CodecError, TaskContext, WireRequest};
use genq_backend::connection::ConnectionError;
use genq_backend::messages::{decode_artifacts, ReplyError};
use genq_backend::ConnectionPool;
use genq_core::registry::Model;
use genq_core::types::DbId;
use genq_db::models::status::TaskStatus;
use genq_db::models::task::Task;
use genq_db::{ResultFields, TaskStore};

/// Why a task ended in `Fail`.
///
/// The `Display` text is persisted as the task's failure message.
#[derive(Debug, thiserror::Error)]
pub enum TaskFailure {
    /// Parameters are not the `{"model": ...}` envelope the dispatcher routes on.
    #[error("invalid task parameters: {0}")]
    InvalidParameters(String),

    #[error(transparent)]
    Parse(#[from] CodecError),

    #[error("model {0} not found")]
    UnknownModel(String),

    #[error("no live connection for model {0}")]
    NoConnection(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Response(#[from] ReplyError),
}

/// Runs one task against one model backend.
pub struct TaskWorker {
    store: Arc<dyn TaskStore>,
    pool: Arc<ConnectionPool>,
    task: Task,
    model: Model,
}

impl TaskWorker {
    pub fn new(
        store: Arc<dyn TaskStore>,
        pool: Arc<ConnectionPool>,
        task: Task,
        model: Model,
    ) -> Self {
        Self {
            store,
            pool,
            task,
            model,
        }
    }

    /// Drive a claimed task to `Success` or `Fail`.
    pub async fn run(self) {
        let task_id = self.task.id;

        match self.execute().await {
            Ok(artifact) => {
                tracing::info!(task_id, model = %self.model.name, "Task succeeded");
                self.persist(TaskStatus::Success, ResultFields::success(artifact))
                    .await;
            }
            Err(failure) => {
                tracing::error!(
                    task_id,
                    model = %self.model.name,
                    error = %failure,
                    "Task failed",
                );
                self.persist(TaskStatus::Fail, ResultFields::failure(failure.to_string()))
                    .await;
            }
        }
    }

    /// Parse, send, await and decode. Returns the first artifact.
    async fn execute(&self) -> Result<String, TaskFailure> {
        let ctx = TaskContext {
            task_id: self.task.id,
        };
        let request = WireRequest::parse(self.model.family, &self.task.parameters, &ctx)?;

        let conn = self
            .pool
            .connection_for(&self.model.name)
            .await
            .ok_or_else(|| TaskFailure::NoConnection(self.model.name.clone()))?;

        let payload = request.encode()?;
        tracing::debug!(
            task_id = self.task.id,
            model = %self.model.name,
            family = request.family().as_str(),
            "Sending request to backend",
        );

        let reply = conn.exchange(payload).await?;
        let artifacts = decode_artifacts(&reply)?;
        tracing::debug!(
            task_id = self.task.id,
            count = artifacts.len(),
            "Backend returned artifacts",
        );

        artifacts
            .into_iter()
            .next()
            .ok_or(TaskFailure::Response(ReplyError::Empty))
    }

    async fn persist(&self, status: TaskStatus, fields: ResultFields) {
        persist_outcome(self.store.as_ref(), self.task.id, status, &fields).await;
    }
}

/// Write a final status. Store failures are logged and swallowed.
pub(crate) async fn persist_outcome(
    store: &dyn TaskStore,
    task_id: DbId,
    status: TaskStatus,
    fields: &ResultFields,
) {
    match store.update_status_and_result(task_id, status, fields).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(task_id, status = ?status, "Task already terminal, outcome not recorded");
        }
        Err(e) => {
            tracing::error!(task_id, status = ?status, error = %e, "Failed to record task outcome");
        }
    }
}
