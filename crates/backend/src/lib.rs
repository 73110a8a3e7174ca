//! Model backend transport and wire formats.
//!
//! Provides the persistent websocket [`connection`] to a model backend with
//! its heartbeat, the [`pool`] that owns one connection per registered
//! model, optional [`reconnect`] supervision, the per-family request
//! [`codec`], and decoding of backend [`messages`].

pub mod client;
pub mod codec;
pub mod connection;
mod heartbeat;
pub mod messages;
pub mod pool;
pub mod reconnect;

pub use client::BackendClient;
pub use connection::{BackendConnection, ConnectionError, ConnectionSettings};
pub use pool::ConnectionPool;
