mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use genq_backend::messages::{decode_artifacts, Reply};
use genq_backend::{BackendClient, ConnectionError, ConnectionSettings};
use tokio_tungstenite::tungstenite::Message;

use common::*;

#[tokio::test]
async fn exchange_returns_backend_reply() {
    let backend = spawn_artifact_backend(&["img-abc"]).await;
    let client = BackendClient::new("demoModel", &backend.url);
    let conn = client.connect(&fast_settings()).await.unwrap();

    let reply = conn.exchange(r#"{"prompt":"a cat"}"#.into()).await.unwrap();

    assert_eq!(decode_artifacts(&reply).unwrap(), vec!["img-abc"]);
    assert_eq!(backend.requests(), vec![r#"{"prompt":"a cat"}"#]);
    assert!(conn.is_alive());
}

#[tokio::test]
async fn replies_are_matched_to_their_requests() {
    // Echo the request back so each caller can check it got its own reply.
    let backend = spawn_backend(|req| Some(Message::Text(req.to_string()))).await;
    let client = BackendClient::new("demoModel", &backend.url);
    let conn = client.connect(&fast_settings()).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let conn = Arc::clone(&conn);
        handles.push(tokio::spawn(async move {
            let payload = format!("request-{i}");
            let reply = conn.exchange(payload.clone()).await.unwrap();
            assert_eq!(reply, Reply::Text(payload));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(backend.requests().len(), 8);
}

#[tokio::test]
async fn connect_to_unreachable_backend_fails() {
    let client = BackendClient::new("demoModel", "ws://127.0.0.1:9");
    let result = client.connect(&fast_settings()).await;
    assert_matches!(result, Err(ConnectionError::Connect(_)));
}

#[tokio::test]
async fn stalled_handshake_times_out() {
    let (url, _server) = spawn_stalled_backend().await;
    let client = BackendClient::new("demoModel", &url);

    let result = tokio::time::timeout(Duration::from_secs(5), client.connect(&fast_settings()))
        .await
        .expect("connect should give up on its own");
    assert_matches!(result, Err(ConnectionError::Connect(msg)) if msg.contains("timed out"));
}

#[tokio::test]
async fn invalid_endpoint_is_connect_error() {
    let client = BackendClient::new("demoModel", "not a url");
    let result = client.connect(&ConnectionSettings::default()).await;
    assert_matches!(result, Err(ConnectionError::Connect(msg)) if msg.contains("invalid endpoint"));
}

#[tokio::test]
async fn acknowledged_heartbeats_keep_connection_alive() {
    let backend = spawn_backend(|_| None).await;
    let client = BackendClient::new("demoModel", &backend.url);
    let settings = fast_settings();
    let conn = client.connect(&settings).await.unwrap();
    let first_deadline = conn.deadline();

    // Several read-wait windows pass; pongs keep pushing the deadline out.
    tokio::time::sleep(settings.read_wait * 3).await;

    assert!(conn.is_alive());
    assert!(conn.deadline() > first_deadline);
}

#[tokio::test]
async fn missing_acknowledgments_mark_connection_dead() {
    let (url, _server) = spawn_silent_backend().await;
    let client = BackendClient::new("demoModel", &url);
    let conn = client.connect(&fast_settings()).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), conn.closed())
        .await
        .expect("connection should die without heartbeat acks");
    assert!(!conn.is_alive());
}

#[tokio::test]
async fn backend_close_marks_connection_dead() {
    let (url, _server) = spawn_closing_backend().await;
    let client = BackendClient::new("demoModel", &url);
    let conn = client.connect(&fast_settings()).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), conn.closed())
        .await
        .expect("connection should die when backend closes");

    let result = conn.exchange("hello".into()).await;
    assert_matches!(result, Err(ConnectionError::Closed));
}

#[tokio::test]
async fn pending_request_released_when_connection_dies() {
    // The backend never answers requests and never acknowledges pings
    // once the request is read, so the heartbeat kills the connection
    // long before the read wait would.
    let (url, _server) = spawn_silent_backend().await;
    let client = BackendClient::new("demoModel", &url);
    let settings = ConnectionSettings {
        read_wait: Duration::from_millis(300),
        ..fast_settings()
    };
    let conn = client.connect(&settings).await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), conn.exchange("hello".into()))
        .await
        .expect("exchange should be released");

    assert_matches!(
        result,
        Err(ConnectionError::Closed) | Err(ConnectionError::Timeout(_))
    );
    assert!(!conn.is_alive());
}

#[tokio::test]
async fn unanswered_request_times_out_and_kills_connection() {
    // Pings are acknowledged, so only the request deadline can fire.
    let backend = spawn_backend(|_| None).await;
    let client = BackendClient::new("demoModel", &backend.url);
    let conn = client.connect(&fast_settings()).await.unwrap();

    let result = conn.exchange("hello".into()).await;

    assert_matches!(result, Err(ConnectionError::Timeout(_)));
    assert!(!conn.is_alive());
    assert_matches!(
        conn.exchange("again".into()).await,
        Err(ConnectionError::Closed)
    );
}

#[tokio::test]
async fn close_marks_connection_dead() {
    let backend = spawn_artifact_backend(&["img-abc"]).await;
    let client = BackendClient::new("demoModel", &backend.url);
    let conn = client.connect(&fast_settings()).await.unwrap();

    conn.close().await.unwrap();

    assert!(!conn.is_alive());
    assert_matches!(conn.exchange("x".into()).await, Err(ConnectionError::Closed));
}

#[tokio::test]
async fn timeout_message_names_the_wait() {
    let err = ConnectionError::Timeout(Duration::from_secs(900));
    assert_eq!(err.to_string(), "read message error: no reply within 900s");
}
