//! The task store contract consumed by the dispatcher and the HTTP layer.

use async_trait::async_trait;
use genq_core::types::DbId;

use crate::models::status::TaskStatus;
use crate::models::task::Task;
use crate::repositories::TaskRepo;
use crate::DbPool;

/// Errors returned by a [`TaskStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The backing store could not serve the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result and message columns written together with a status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultFields {
    pub result: Option<String>,
    pub message: Option<String>,
}

impl ResultFields {
    pub fn success(artifact: impl Into<String>) -> Self {
        Self {
            result: Some(artifact.into()),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            result: None,
            message: Some(message.into()),
        }
    }
}

/// Durable task records, queried by status and updated by ID.
///
/// Every write is an independent point update that overwrites the
/// previous value and never changes a task that is already `Success` or
/// `Fail`. The boolean results report whether a row changed.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Record a newly submitted task in `Init`.
    async fn create(&self, parameters: &str) -> Result<Task, StoreError>;

    async fn find_by_id(&self, id: DbId) -> Result<Option<Task>, StoreError>;

    /// Up to `limit` tasks in `status`, ordered by ID ascending.
    async fn find_by_status(&self, status: TaskStatus, limit: u32) -> Result<Vec<Task>, StoreError>;

    async fn update_status(&self, id: DbId, status: TaskStatus) -> Result<bool, StoreError>;

    async fn update_status_and_result(
        &self,
        id: DbId,
        status: TaskStatus,
        fields: &ResultFields,
    ) -> Result<bool, StoreError>;

    /// Conditional update from `from` to `to`.
    async fn transition(&self, id: DbId, from: TaskStatus, to: TaskStatus) -> Result<bool, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// PostgreSQL-backed [`TaskStore`].
#[derive(Clone)]
pub struct PgTaskStore {
    pool: DbPool,
}

impl PgTaskStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn create(&self, parameters: &str) -> Result<Task, StoreError> {
        Ok(TaskRepo::create(&self.pool, 0, parameters).await?)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<Task>, StoreError> {
        Ok(TaskRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_by_status(&self, status: TaskStatus, limit: u32) -> Result<Vec<Task>, StoreError> {
        Ok(TaskRepo::find_by_status(&self.pool, status, i64::from(limit)).await?)
    }

    async fn update_status(&self, id: DbId, status: TaskStatus) -> Result<bool, StoreError> {
        Ok(TaskRepo::update_status(&self.pool, id, status).await?)
    }

    async fn update_status_and_result(
        &self,
        id: DbId,
        status: TaskStatus,
        fields: &ResultFields,
    ) -> Result<bool, StoreError> {
        Ok(TaskRepo::update_status_and_result(
            &self.pool,
            id,
            status,
            fields.result.as_deref(),
            fields.message.as_deref(),
        )
        .await?)
    }

    async fn transition(&self, id: DbId, from: TaskStatus, to: TaskStatus) -> Result<bool, StoreError> {
        Ok(TaskRepo::transition(&self.pool, id, from, to).await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(crate::health_check(&self.pool).await?)
    }
}
