//! A persistent websocket session to one model backend.
//!
//! The read half is owned by a background reader task; the write half is
//! shared behind a mutex by the heartbeat and by requests. Only one
//! request may be in flight per connection: [`BackendConnection::exchange`]
//! holds an exchange lock from send until its reply arrives, so a reply
//! can always be matched to the request that caused it.
//!
//! A connection is dead once its probe send fails, its read half errors
//! or closes, heartbeat acknowledgments stop arriving before the read
//! deadline, a request times out, or it is closed. Death is final; any
//! request waiting on a dead connection is released with
//! [`ConnectionError::Closed`].

use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::heartbeat;
use crate::messages::Reply;

/// Websocket stream type produced by the client dialer.
pub type BackendStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Interval between liveness probes.
pub const DEFAULT_HEARTBEAT_PERIOD: Duration = Duration::from_secs(10);

/// How long a connection stays trusted without an acknowledgment, and how
/// long a request waits for its reply.
pub const DEFAULT_READ_WAIT: Duration = Duration::from_secs(15 * 60);

/// Largest reply frame accepted from a backend.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Time allowed for the TCP and websocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed for background tasks to exit after close.
const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Timing and size policy for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub heartbeat_period: Duration,
    pub read_wait: Duration,
    pub max_message_size: usize,
    pub connect_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            heartbeat_period: DEFAULT_HEARTBEAT_PERIOD,
            read_wait: DEFAULT_READ_WAIT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Errors from dialing or using a backend connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Failed to establish the websocket.
    #[error("Connection error: {0}")]
    Connect(String),

    /// The connection is dead or was closed while waiting.
    #[error("connection closed")]
    Closed,

    /// Writing a frame failed.
    #[error("write message error: {0}")]
    Send(String),

    /// No reply arrived within the read deadline.
    #[error("read message error: no reply within {}s", .0.as_secs())]
    Timeout(Duration),
}

/// A live, heartbeat-supervised connection to one model backend.
pub struct BackendConnection {
    model: String,
    settings: ConnectionSettings,
    sink: Mutex<SplitSink<BackendStream, Message>>,
    /// Held for the whole send/receive of one request.
    exchange_lock: Mutex<()>,
    /// Reply slot for the request currently in flight.
    pending: StdMutex<Option<oneshot::Sender<Reply>>>,
    /// Extended by every heartbeat acknowledgment.
    deadline: StdMutex<Instant>,
    /// Cancelled once the connection is dead.
    closed: CancellationToken,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for BackendConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConnection")
            .field("model", &self.model)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl BackendConnection {
    /// Take ownership of an established websocket and start its reader
    /// and heartbeat tasks.
    pub fn open(
        model: impl Into<String>,
        ws_stream: BackendStream,
        settings: ConnectionSettings,
    ) -> Arc<Self> {
        let (sink, stream) = ws_stream.split();
        let deadline = Instant::now() + settings.read_wait;

        let conn = Arc::new(Self {
            model: model.into(),
            settings,
            sink: Mutex::new(sink),
            exchange_lock: Mutex::new(()),
            pending: StdMutex::new(None),
            deadline: StdMutex::new(deadline),
            closed: CancellationToken::new(),
            tasks: StdMutex::new(Vec::new()),
        });

        let reader = tokio::spawn(read_loop(Arc::clone(&conn), stream));
        let heartbeat = tokio::spawn(heartbeat::run(Arc::clone(&conn)));
        lock(&conn.tasks).extend([reader, heartbeat]);

        conn
    }

    /// Registry name of the model this connection serves.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn is_alive(&self) -> bool {
        !self.closed.is_cancelled()
    }

    /// Resolves once the connection is dead.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Instant after which the connection is considered unreachable
    /// unless another acknowledgment arrives.
    pub fn deadline(&self) -> Instant {
        *lock(&self.deadline)
    }

    /// Send one request and wait for the backend's reply.
    ///
    /// Concurrent callers are served one at a time. A timeout kills the
    /// connection: a late reply could otherwise be taken for the answer to
    /// the next request.
    pub async fn exchange(&self, payload: String) -> Result<Reply, ConnectionError> {
        let _turn = self.exchange_lock.lock().await;
        if !self.is_alive() {
            return Err(ConnectionError::Closed);
        }

        let (tx, rx) = oneshot::channel();
        *lock(&self.pending) = Some(tx);

        if let Err(e) = self.send_frame(Message::Text(payload)).await {
            self.mark_dead("request send failed");
            return Err(ConnectionError::Send(e.to_string()));
        }

        let read_wait = self.settings.read_wait;
        tokio::select! {
            biased;
            reply = rx => reply.map_err(|_| ConnectionError::Closed),
            () = self.closed.cancelled() => Err(ConnectionError::Closed),
            () = tokio::time::sleep(read_wait) => {
                self.mark_dead("reply timed out");
                Err(ConnectionError::Timeout(read_wait))
            }
        }
    }

    /// Close the websocket and stop the background tasks.
    pub async fn close(&self) -> Result<(), ConnectionError> {
        self.closed.cancel();
        lock(&self.pending).take();

        let result = self
            .sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| ConnectionError::Send(e.to_string()));

        let handles: Vec<_> = lock(&self.tasks).drain(..).collect();
        for handle in handles {
            let _ = tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, handle).await;
        }

        tracing::info!(model = %self.model, "Backend connection closed");
        result
    }

    pub(crate) async fn send_frame(&self, message: Message) -> Result<(), tungstenite::Error> {
        self.sink.lock().await.send(message).await
    }

    pub(crate) fn extend_deadline(&self) {
        *lock(&self.deadline) = Instant::now() + self.settings.read_wait;
    }

    /// Mark the connection dead and release any waiting request.
    pub(crate) fn mark_dead(&self, reason: &str) {
        if !self.closed.is_cancelled() {
            tracing::warn!(model = %self.model, reason, "Backend connection is dead");
        }
        self.closed.cancel();
        lock(&self.pending).take();
    }

    fn deliver(&self, reply: Reply) {
        match lock(&self.pending).take() {
            Some(waiter) => {
                if waiter.send(reply).is_err() {
                    tracing::debug!(model = %self.model, "Requester went away before reply");
                }
            }
            None => {
                tracing::warn!(model = %self.model, "Dropping reply with no request in flight");
            }
        }
    }
}

/// Drain the read half until the connection dies.
async fn read_loop(conn: Arc<BackendConnection>, mut stream: SplitStream<BackendStream>) {
    loop {
        let next = tokio::select! {
            () = conn.closed.cancelled() => return,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(Message::Pong(_))) => {
                tracing::trace!(model = %conn.model, "Heartbeat acknowledged");
                conn.extend_deadline();
            }
            Some(Ok(Message::Text(text))) => conn.deliver(Reply::Text(text)),
            Some(Ok(Message::Binary(data))) => conn.deliver(Reply::Binary(data)),
            Some(Ok(Message::Ping(_) | Message::Frame(_))) => {
                // Pings are answered by tungstenite.
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(model = %conn.model, ?frame, "Backend closed websocket");
                conn.mark_dead("closed by backend");
                return;
            }
            Some(Err(e)) => {
                tracing::error!(model = %conn.model, error = %e, "Websocket receive error");
                conn.mark_dead("receive error");
                return;
            }
            None => {
                conn.mark_dead("stream exhausted");
                return;
            }
        }
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
