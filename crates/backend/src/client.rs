//! Websocket dialer for a single model backend.
//!
//! [`BackendClient`] holds the endpoint of one registered model. Call
//! [`BackendClient::connect`] to establish a live [`BackendConnection`]
//! with its heartbeat running.

use std::sync::Arc;

use genq_core::registry::Model;
use tokio_tungstenite::connect_async_with_config;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use crate::connection::{BackendConnection, ConnectionError, ConnectionSettings};

/// Tunnelled backends (ngrok) serve an interstitial page unless told not to.
const SKIP_BROWSER_WARNING_HEADER: &str = "ngrok-skip-browser-warning";

/// Connection configuration for one model backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    model: String,
    endpoint: String,
}

impl BackendClient {
    /// * `model`    - registry name, used for logging and pool lookup.
    /// * `endpoint` - websocket URL, e.g. `wss://host/queue/join`.
    pub fn new(model: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            endpoint: endpoint.into(),
        }
    }

    pub fn for_model(model: &Model) -> Self {
        Self::new(model.name.clone(), model.endpoint.clone())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Dial the backend and start the connection's reader and heartbeat.
    ///
    /// The handshake is abandoned after `settings.connect_timeout`.
    ///
    /// Incoming frames larger than `settings.max_message_size` are refused
    /// by the websocket layer and surface as a receive error.
    pub async fn connect(
        &self,
        settings: &ConnectionSettings,
    ) -> Result<Arc<BackendConnection>, ConnectionError> {
        let mut request = self.endpoint.as_str().into_client_request().map_err(|e| {
            ConnectionError::Connect(format!("invalid endpoint {}: {e}", self.endpoint))
        })?;
        request
            .headers_mut()
            .insert(SKIP_BROWSER_WARNING_HEADER, HeaderValue::from_static("true"));

        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(settings.max_message_size);

        let dial = connect_async_with_config(request, Some(ws_config), false);
        let (ws_stream, _response) = tokio::time::timeout(settings.connect_timeout, dial)
            .await
            .map_err(|_| {
                ConnectionError::Connect(format!(
                    "timed out connecting to model {} at {} after {}s",
                    self.model,
                    self.endpoint,
                    settings.connect_timeout.as_secs_f32()
                ))
            })?
            .map_err(|e| {
                ConnectionError::Connect(format!(
                    "failed to connect to model {} at {}: {e}",
                    self.model, self.endpoint
                ))
            })?;

        tracing::info!(
            model = %self.model,
            endpoint = %self.endpoint,
            "Connected to model backend",
        );

        Ok(BackendConnection::open(
            self.model.clone(),
            ws_stream,
            settings.clone(),
        ))
    }
}
