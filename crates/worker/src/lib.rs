//! Dispatch engine: selects pending tasks and runs them against their
//! model backends.
//!
//! [`Dispatcher::run_cycle`] is the single trigger operation. It reads a
//! batch of `Init` tasks, fails the ones that cannot be routed, and hands
//! the rest to [`TaskWorker`]s that run concurrently under an explicit
//! in-flight bound.

pub mod config;
pub mod dispatcher;
pub mod task_worker;

pub use config::EngineConfig;
pub use dispatcher::{CycleReport, DispatchError, Dispatcher};
pub use task_worker::{TaskFailure, TaskWorker};
