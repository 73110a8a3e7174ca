use std::sync::Arc;

use genq_db::TaskStore;
use genq_worker::Dispatcher;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Task records, shared with the dispatcher.
    pub store: Arc<dyn TaskStore>,
    pub config: Arc<ServerConfig>,
    /// Runs dispatch cycles on request; owns the backend connection pool.
    pub dispatcher: Arc<Dispatcher>,
}
