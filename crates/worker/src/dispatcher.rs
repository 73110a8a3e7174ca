//! Dispatch cycle.
//!
//! Each cycle selects up to `limit` tasks in `Init` (lowest IDs first),
//! fails the ones whose parameters cannot be routed to a registered model,
//! claims the rest with a conditional `Init -> Running` update and spawns a
//! [`TaskWorker`] for each task it claimed. The cycle returns as soon as
//! every selected task has been failed or handed off; worker outcomes are
//! only observable through the task store.
//!
//! A claimed task is no longer `Init`, so a later or overlapping cycle
//! never selects it again and each task gets at most one worker. Workers
//! run on a [`TaskTracker`] and each holds a permit from a shared semaphore
//! while it runs, so the number of concurrent workers is capped.

use std::sync::Arc;
use std::time::Duration;

use genq_backend::ConnectionPool;
use genq_core::error::ConfigError;
use genq_core::limits::BatchLimit;
use genq_core::registry::{Model, ModelRegistry};
use genq_core::types::DbId;
use genq_db::models::status::TaskStatus;
use genq_db::models::task::Task;
use genq_db::{ResultFields, StoreError, TaskStore};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::task_worker::{persist_outcome, TaskFailure, TaskWorker};

/// Cycle-level errors. Per-task failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Summary of one dispatch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Tasks read from the store.
    pub selected: usize,
    /// Tasks claimed and handed to a worker.
    pub dispatched: usize,
    /// Tasks failed before dispatch.
    pub failed: usize,
    /// Tasks another cycle claimed first.
    pub skipped: usize,
}

/// The routing envelope every task's parameters must carry.
#[derive(Debug, Deserialize)]
struct TaskTarget {
    model: String,
}

pub struct Dispatcher {
    store: Arc<dyn TaskStore>,
    registry: Arc<ModelRegistry>,
    pool: Arc<ConnectionPool>,
    workers: TaskTracker,
    permits: Arc<Semaphore>,
}

impl Dispatcher {
    /// `max_in_flight` bounds how many workers run at once; further
    /// claimed tasks wait in `Running` for a permit.
    pub fn new(
        store: Arc<dyn TaskStore>,
        registry: Arc<ModelRegistry>,
        pool: Arc<ConnectionPool>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            store,
            registry,
            pool,
            workers: TaskTracker::new(),
            permits: Arc::new(Semaphore::new(max_in_flight)),
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Number of spawned workers that have not finished.
    pub fn in_flight(&self) -> usize {
        self.workers.len()
    }

    /// Run one cycle with the limit read from `SCHEDULE_TASK_LIMIT`.
    pub async fn run_cycle_from_env(&self) -> Result<CycleReport, DispatchError> {
        let limit = BatchLimit::from_env()?;
        self.dispatch(limit).await
    }

    /// Run one cycle selecting at most `limit` tasks.
    ///
    /// A limit that is not a positive integer is a [`DispatchError::Config`];
    /// a failed selection query is a [`DispatchError::Store`]. Neither
    /// leaves any task modified.
    pub async fn run_cycle(&self, limit: i64) -> Result<CycleReport, DispatchError> {
        let limit = BatchLimit::new(limit)?;
        self.dispatch(limit).await
    }

    async fn dispatch(&self, limit: BatchLimit) -> Result<CycleReport, DispatchError> {
        let tasks = self
            .store
            .find_by_status(TaskStatus::Init, limit.get())
            .await?;

        let mut report = CycleReport {
            selected: tasks.len(),
            ..CycleReport::default()
        };

        for task in tasks {
            match self.route(&task) {
                Ok(model) => {
                    if self.claim(task.id).await {
                        self.spawn_worker(task, model.clone());
                        report.dispatched += 1;
                    } else {
                        report.skipped += 1;
                    }
                }
                Err(failure) => {
                    tracing::error!(task_id = task.id, error = %failure, "Task rejected before dispatch");
                    persist_outcome(
                        self.store.as_ref(),
                        task.id,
                        TaskStatus::Fail,
                        &ResultFields::failure(failure.to_string()),
                    )
                    .await;
                    report.failed += 1;
                }
            }
        }

        if report.selected > 0 {
            tracing::info!(
                selected = report.selected,
                dispatched = report.dispatched,
                failed = report.failed,
                skipped = report.skipped,
                "Dispatch cycle complete",
            );
        }
        Ok(report)
    }

    /// Find the registered model a task targets.
    fn route(&self, task: &Task) -> Result<&Model, TaskFailure> {
        let target: TaskTarget = serde_json::from_str(&task.parameters)
            .map_err(|e| TaskFailure::InvalidParameters(e.to_string()))?;

        self.registry
            .resolve(&target.model)
            .ok_or(TaskFailure::UnknownModel(target.model))
    }

    /// Move a selected task from `Init` to `Running`.
    ///
    /// Returns `false` only when the task already left `Init`. A failed
    /// write is logged and the task is dispatched anyway; the worker's
    /// final write settles its status.
    async fn claim(&self, task_id: DbId) -> bool {
        match self
            .store
            .transition(task_id, TaskStatus::Init, TaskStatus::Running)
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                tracing::info!(task_id, "Task already claimed, skipping");
                false
            }
            Err(e) => {
                tracing::error!(task_id, error = %e, "Failed to mark task running");
                true
            }
        }
    }

    fn spawn_worker(&self, task: Task, model: Model) {
        let worker = TaskWorker::new(Arc::clone(&self.store), Arc::clone(&self.pool), task, model);
        let permits = Arc::clone(&self.permits);

        self.workers.spawn(async move {
            // The semaphore is never closed.
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            worker.run().await;
        });
    }

    /// Wait until every worker spawned so far has finished.
    pub async fn wait_for_workers(&self) {
        self.workers.close();
        self.workers.wait().await;
        self.workers.reopen();
    }

    /// Stop accepting workers and wait up to `timeout` for running ones.
    ///
    /// Returns `false` if workers were still running when the timeout
    /// elapsed.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.workers.close();
        let in_flight = self.workers.len();
        if in_flight > 0 {
            tracing::info!(in_flight, "Waiting for task workers to finish");
        }
        tokio::time::timeout(timeout, self.workers.wait()).await.is_ok()
    }

    /// Trigger a cycle every `interval` until `cancel` fires.
    ///
    /// The batch limit is re-read on each tick; a cycle error is logged
    /// and the loop carries on.
    pub async fn run(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            "Dispatch timer started",
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("Dispatch timer shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle_from_env().await {
                        tracing::error!(error = %e, "Dispatch cycle failed");
                    }
                }
            }
        }
    }
}
