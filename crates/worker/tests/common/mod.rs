#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use genq_backend::{ConnectionPool, ConnectionSettings};
use genq_core::registry::{Model, ModelRegistry, RequestFamily};
use genq_db::MemoryTaskStore;
use genq_worker::Dispatcher;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Endpoint nothing listens on.
pub const UNREACHABLE: &str = "ws://127.0.0.1:9";

pub fn test_settings() -> ConnectionSettings {
    ConnectionSettings {
        heartbeat_period: Duration::from_millis(100),
        read_wait: Duration::from_secs(2),
        max_message_size: 1024 * 1024,
        connect_timeout: Duration::from_secs(2),
    }
}

/// Local websocket server answering each request with a fixed text frame,
/// or never answering at all.
pub struct FakeBackend {
    pub url: String,
    received: Arc<Mutex<Vec<serde_json::Value>>>,
    handle: JoinHandle<()>,
}

impl FakeBackend {
    pub async fn start(reply: &str) -> Self {
        Self::spawn(Some(reply.to_string())).await
    }

    /// Records requests but never replies to them.
    pub async fn silent() -> Self {
        Self::spawn(None).await
    }

    async fn spawn(reply: Option<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = Arc::clone(&received);
        let handle = tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let received = Arc::clone(&received_clone);
                let reply = reply.clone();
                tokio::spawn(async move {
                    let Ok(mut ws) = accept_async(tcp).await else {
                        return;
                    };
                    while let Some(Ok(msg)) = ws.next().await {
                        if let Message::Text(text) = msg {
                            let value: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();
                            received.lock().unwrap().push(value);
                            let Some(reply) = &reply else {
                                continue;
                            };
                            if ws.send(Message::Text(reply.clone())).await.is_err() {
                                return;
                            }
                        }
                    }
                });
            }
        });

        Self {
            url,
            received,
            handle,
        }
    }

    /// Decoded request frames received so far.
    pub fn requests(&self) -> Vec<serde_json::Value> {
        self.received.lock().unwrap().clone()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn registry(models: &[(&str, &str)]) -> ModelRegistry {
    ModelRegistry::from_models(models.iter().map(|(name, endpoint)| Model {
        name: name.to_string(),
        endpoint: endpoint.to_string(),
        family: RequestFamily::Gradio,
    }))
}

pub struct Harness {
    pub store: Arc<MemoryTaskStore>,
    pub pool: Arc<ConnectionPool>,
    pub dispatcher: Dispatcher,
}

impl Harness {
    /// Connect every model in `registry` and build a dispatcher over an
    /// in-memory store.
    pub async fn new(registry: ModelRegistry, max_in_flight: usize) -> Self {
        let store = Arc::new(MemoryTaskStore::new());
        let pool = ConnectionPool::connect_all(&registry, test_settings()).await;
        let dispatcher = Dispatcher::new(
            store.clone(),
            Arc::new(registry),
            Arc::clone(&pool),
            max_in_flight,
        );
        Self {
            store,
            pool,
            dispatcher,
        }
    }

    /// Wait for the dispatched workers, failing the test if they hang.
    pub async fn settle(&self) {
        tokio::time::timeout(Duration::from_secs(10), self.dispatcher.wait_for_workers())
            .await
            .expect("task workers did not finish");
    }
}
