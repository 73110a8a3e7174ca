#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use genq_backend::ConnectionSettings;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Settings short enough for heartbeat behaviour to show within a test.
pub fn fast_settings() -> ConnectionSettings {
    ConnectionSettings {
        heartbeat_period: Duration::from_millis(50),
        read_wait: Duration::from_millis(400),
        max_message_size: 1024 * 1024,
        connect_timeout: Duration::from_millis(500),
    }
}

/// A websocket server on `127.0.0.1` standing in for a model backend.
pub struct FakeBackend {
    pub url: String,
    /// Text requests received, in arrival order.
    pub received: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl FakeBackend {
    pub fn requests(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Serve connections, answering each text request with `respond(request)`.
///
/// `None` leaves the request unanswered. Pings are answered by
/// tungstenite as long as the server keeps reading.
pub async fn spawn_backend<F>(respond: F) -> FakeBackend
where
    F: Fn(&str) -> Option<Message> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let received = Arc::new(Mutex::new(Vec::new()));
    let respond = Arc::new(respond);

    let received_clone = Arc::clone(&received);
    let handle = tokio::spawn(async move {
        loop {
            let Ok((tcp, _)) = listener.accept().await else {
                return;
            };
            let received = Arc::clone(&received_clone);
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(tcp).await else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    if let Message::Text(text) = msg {
                        received.lock().unwrap().push(text.clone());
                        if let Some(reply) = respond(&text) {
                            if ws.send(reply).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            });
        }
    });

    FakeBackend {
        url,
        received,
        handle,
    }
}

/// Backend that replies to every request with the given artifact list.
pub async fn spawn_artifact_backend(artifacts: &'static [&'static str]) -> FakeBackend {
    spawn_backend(move |_| {
        Some(Message::Text(serde_json::to_string(artifacts).unwrap()))
    })
    .await
}

/// Backend that completes the handshake and then never reads, so
/// heartbeat pings are never acknowledged.
pub async fn spawn_silent_backend() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((tcp, _)) = listener.accept().await {
            if let Ok(ws) = accept_async(tcp).await {
                held.push(ws);
            }
        }
    });
    (url, handle)
}

/// Backend that completes the handshake and immediately closes.
pub async fn spawn_closing_backend() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            if let Ok(mut ws) = accept_async(tcp).await {
                let _ = ws.close(None).await;
            }
        }
    });
    (url, handle)
}

/// Listener that accepts TCP connections but never answers the websocket
/// handshake.
pub async fn spawn_stalled_backend() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((tcp, _)) = listener.accept().await {
            held.push(tcp);
        }
    });
    (url, handle)
}
