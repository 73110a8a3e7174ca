#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use genq_api::app::build_app;
use genq_api::config::ServerConfig;
use genq_api::state::AppState;
use genq_backend::{ConnectionPool, ConnectionSettings};
use genq_core::registry::{Model, ModelRegistry, RequestFamily};
use genq_db::MemoryTaskStore;
use genq_worker::Dispatcher;
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
    }
}

/// Build the full router over an in-memory store.
///
/// The registry holds `demoModel`, which has no live connection, so
/// dispatched tasks fail fast without network access.
pub fn build_test_app(store: Arc<MemoryTaskStore>) -> Router {
    let registry = ModelRegistry::from_models([Model {
        name: "demoModel".into(),
        endpoint: "ws://127.0.0.1:9".into(),
        family: RequestFamily::Gradio,
    }]);
    let pool = Arc::new(ConnectionPool::new(ConnectionSettings::default()));
    let dispatcher = Dispatcher::new(store.clone(), Arc::new(registry), pool, 4);

    build_app(AppState {
        store,
        config: Arc::new(test_config()),
        dispatcher: Arc::new(dispatcher),
    })
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post(app: Router, uri: &str, body: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
