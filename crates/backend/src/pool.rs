//! Connection pool: one persistent backend connection per registered model.
//!
//! [`ConnectionPool`] dials every model in the registry at startup and
//! hands out the live connection for a model by name. The map is read by
//! many concurrent task workers; it is only written while connecting,
//! by the optional reconnect supervisors, and during [`close_all`].
//!
//! [`close_all`]: ConnectionPool::close_all

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use genq_core::registry::ModelRegistry;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::BackendClient;
use crate::connection::{BackendConnection, ConnectionSettings};
use crate::reconnect::{self, RedialPolicy};

/// Time allowed for each supervisor to exit during shutdown.
const SUPERVISOR_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the backend connections for all registered models.
///
/// Created once at startup via [`ConnectionPool::connect_all`]; the
/// returned `Arc` is shared with the dispatcher.
pub struct ConnectionPool {
    connections: RwLock<HashMap<String, Arc<BackendConnection>>>,
    settings: ConnectionSettings,
    /// Cancelled during shutdown; stops reconnect supervisors.
    cancel: CancellationToken,
    supervisors: StdMutex<Vec<JoinHandle<()>>>,
}

impl ConnectionPool {
    /// An empty pool. Connections are added with [`insert`](Self::insert).
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            settings,
            cancel: CancellationToken::new(),
            supervisors: StdMutex::new(Vec::new()),
        }
    }

    /// Dial every model in `registry`.
    ///
    /// A model whose backend cannot be reached is logged and left without
    /// a connection; its tasks fail fast until it is (re)connected.
    pub async fn connect_all(registry: &ModelRegistry, settings: ConnectionSettings) -> Arc<Self> {
        let pool = Arc::new(Self::new(settings));
        tracing::info!(count = registry.len(), "Connecting to model backends");

        for model in registry.iter() {
            let client = BackendClient::for_model(model);
            match client.connect(&pool.settings).await {
                Ok(conn) => pool.insert(&model.name, conn).await,
                Err(e) => {
                    tracing::error!(model = %model.name, error = %e, "Connect model api error");
                }
            }
        }

        pool
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Install `conn` as the connection for `model`, replacing any previous
    /// one.
    pub async fn insert(&self, model: &str, conn: Arc<BackendConnection>) {
        let previous = self
            .connections
            .write()
            .await
            .insert(model.to_string(), conn);

        if let Some(old) = previous {
            if old.is_alive() {
                tracing::debug!(model, "Replacing live connection");
            }
            if let Err(e) = old.close().await {
                tracing::debug!(model, error = %e, "Error closing replaced connection");
            }
        }
    }

    /// The live connection for `model`, or `None` if it was never
    /// established or has since died.
    pub async fn connection_for(&self, model: &str) -> Option<Arc<BackendConnection>> {
        self.connections
            .read()
            .await
            .get(model)
            .filter(|conn| conn.is_alive())
            .cloned()
    }

    /// Names of models that currently have a live connection.
    pub async fn live_models(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .connections
            .read()
            .await
            .iter()
            .filter(|(_, conn)| conn.is_alive())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Start one reconnect supervisor per registered model.
    pub fn spawn_supervisors(self: &Arc<Self>, registry: &ModelRegistry, policy: RedialPolicy) {
        let handles: Vec<_> = registry
            .iter()
            .map(|model| {
                tokio::spawn(reconnect::supervise(
                    Arc::clone(self),
                    BackendClient::for_model(model),
                    policy.clone(),
                    self.cancel.child_token(),
                ))
            })
            .collect();

        tracing::info!(count = handles.len(), "Reconnect supervisors started");
        self.supervisors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(handles);
    }

    /// Close every held connection.
    ///
    /// Each connection is removed from the pool before it is closed, so it
    /// is closed exactly once even if this is called again; a failure to
    /// close one connection does not stop the others.
    pub async fn close_all(&self) {
        tracing::info!("Closing model backend connections");
        self.cancel.cancel();

        let supervisors: Vec<_> = self
            .supervisors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in supervisors {
            let _ = tokio::time::timeout(SUPERVISOR_SHUTDOWN_TIMEOUT, handle).await;
        }

        let drained: Vec<_> = self.connections.write().await.drain().collect();
        for (model, conn) in drained {
            if let Err(e) = conn.close().await {
                tracing::warn!(model = %model, error = %e, "Failed to close connection");
            }
        }

        tracing::info!("Model backend connections closed");
    }
}
