//! Optional supervised reconnection for dead backend connections.
//!
//! Off by default: the pool leaves a dead connection Absent and tasks
//! routed to it fail fast. When enabled, one supervisor per model waits
//! for its connection to die and re-dials until it succeeds or the pool
//! is shut down.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::BackendClient;
use crate::connection::{BackendConnection, ConnectionSettings};
use crate::pool::ConnectionPool;

/// Wait schedule between re-dial attempts: `first_delay`, then doubling
/// up to `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedialPolicy {
    pub first_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RedialPolicy {
    fn default() -> Self {
        Self {
            first_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RedialPolicy {
    /// Endless sequence of waits, one per attempt.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let max = self.max_delay;
        std::iter::successors(Some(self.first_delay.min(max)), move |d| {
            Some(d.saturating_mul(2).min(max))
        })
    }
}

/// Re-dial `client` until a connection is established.
///
/// Returns `None` if `cancel` fires first.
pub async fn redial(
    client: &BackendClient,
    policy: &RedialPolicy,
    settings: &ConnectionSettings,
    cancel: &CancellationToken,
) -> Option<Arc<BackendConnection>> {
    for (attempt, delay) in (1u32..).zip(policy.delays()) {
        tokio::select! {
            () = cancel.cancelled() => return None,
            () = tokio::time::sleep(delay) => {}
        }

        let result = tokio::select! {
            () = cancel.cancelled() => return None,
            result = client.connect(settings) => result,
        };

        match result {
            Ok(conn) => {
                tracing::info!(model = %client.model(), attempt, "Model backend reconnected");
                return Some(conn);
            }
            Err(e) => {
                tracing::warn!(
                    model = %client.model(),
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Re-dial failed",
                );
            }
        }
    }
    None
}

/// Keep `client`'s model connected in `pool` until `cancel` fires.
pub(crate) async fn supervise(
    pool: Arc<ConnectionPool>,
    client: BackendClient,
    policy: RedialPolicy,
    cancel: CancellationToken,
) {
    loop {
        if let Some(conn) = pool.connection_for(client.model()).await {
            tokio::select! {
                () = cancel.cancelled() => return,
                () = conn.closed() => {}
            }
        }

        if cancel.is_cancelled() {
            return;
        }

        tracing::info!(model = %client.model(), "Connection lost, re-dialing");
        match redial(&client, &policy, pool.settings(), &cancel).await {
            Some(conn) => pool.insert(client.model(), conn).await,
            None => return,
        }
    }
}
