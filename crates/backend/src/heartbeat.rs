use std::sync::Arc;

use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;

use crate::connection::BackendConnection;

/// Send a Ping frame every heartbeat period for the life of `conn`.
///
/// Acknowledgments are observed by the reader task, which extends the
/// connection's deadline. The loop marks the connection dead when a probe
/// cannot be written or when the deadline passes without an
/// acknowledgment, then exits.
pub(crate) async fn run(conn: Arc<BackendConnection>) {
    let period = conn.settings().heartbeat_period;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            () = conn.closed() => return,
            _ = ticker.tick() => {}
        }

        if Instant::now() >= conn.deadline() {
            conn.mark_dead("no heartbeat acknowledgment before read deadline");
            return;
        }

        if let Err(e) = conn.send_frame(Message::Ping(Vec::new())).await {
            tracing::warn!(model = %conn.model(), error = %e, "Heartbeat ping failed");
            conn.mark_dead("heartbeat send failed");
            return;
        }

        tracing::trace!(model = %conn.model(), "Heartbeat ping");
    }
}
