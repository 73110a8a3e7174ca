//! In-process [`TaskStore`] used by tests and database-less local runs.
//!
//! Applies the same write rules as the PostgreSQL repository: point
//! updates keyed by ID, and no write ever leaves a terminal status. It
//! also records the sequence of statuses each task passed through, and
//! can be switched into a failing mode to exercise store-error paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use genq_core::types::DbId;
use tokio::sync::Mutex;

use crate::models::status::TaskStatus;
use crate::models::task::Task;
use crate::store::{ResultFields, StoreError, TaskStore};

#[derive(Default)]
struct Inner {
    next_id: DbId,
    tasks: BTreeMap<DbId, Task>,
    history: HashMap<DbId, Vec<TaskStatus>>,
}

impl Inner {
    fn set_status(&mut self, id: DbId, status: TaskStatus) -> Option<&mut Task> {
        let task = self.tasks.get_mut(&id)?;
        if task.status().is_some_and(TaskStatus::is_terminal) {
            return None;
        }
        task.status_id = status.id();
        task.updated_at = Utc::now();
        self.history.entry(id).or_default().push(status);
        Some(task)
    }
}

/// Mutex-guarded map of tasks.
#[derive(Default)]
pub struct MemoryTaskStore {
    inner: Mutex<Inner>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_transitions: AtomicBool,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent query return [`StoreError::Unavailable`].
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent update return [`StoreError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `transition` return [`StoreError::Unavailable`]
    /// while other writes keep working.
    pub fn set_fail_transitions(&self, fail: bool) {
        self.fail_transitions.store(fail, Ordering::SeqCst);
    }

    /// Statuses the task has been in, starting with `Init`.
    pub async fn history(&self, id: DbId) -> Vec<TaskStatus> {
        self.inner
            .lock()
            .await
            .history
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        Ok(())
    }

    fn check_writes(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create(&self, parameters: &str) -> Result<Task, StoreError> {
        self.check_writes()?;
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let id = inner.next_id;
        let now = Utc::now();
        let task = Task {
            id,
            parameters: parameters.to_string(),
            user_id: 0,
            status_id: TaskStatus::Init.id(),
            result: None,
            message: None,
            created_at: now,
            updated_at: now,
        };
        inner.tasks.insert(id, task.clone());
        inner.history.insert(id, vec![TaskStatus::Init]);
        Ok(task)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<Task>, StoreError> {
        self.check_reads()?;
        Ok(self.inner.lock().await.tasks.get(&id).cloned())
    }

    async fn find_by_status(&self, status: TaskStatus, limit: u32) -> Result<Vec<Task>, StoreError> {
        self.check_reads()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .tasks
            .values()
            .filter(|t| t.status_id == status.id())
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn update_status(&self, id: DbId, status: TaskStatus) -> Result<bool, StoreError> {
        self.check_writes()?;
        Ok(self.inner.lock().await.set_status(id, status).is_some())
    }

    async fn update_status_and_result(
        &self,
        id: DbId,
        status: TaskStatus,
        fields: &ResultFields,
    ) -> Result<bool, StoreError> {
        self.check_writes()?;
        let mut inner = self.inner.lock().await;
        match inner.set_status(id, status) {
            Some(task) => {
                task.result = fields.result.clone();
                task.message = fields.message.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn transition(&self, id: DbId, from: TaskStatus, to: TaskStatus) -> Result<bool, StoreError> {
        self.check_writes()?;
        if self.fail_transitions.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("transitions disabled".into()));
        }
        let mut inner = self.inner.lock().await;
        let current = inner.tasks.get(&id).map(|t| t.status_id);
        if current != Some(from.id()) {
            return Ok(false);
        }
        Ok(inner.set_status(id, to).is_some())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.check_reads()
    }
}
