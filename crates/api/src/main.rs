use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use genq_api::app::build_app;
use genq_api::config::ServerConfig;
use genq_api::state::AppState;
use genq_backend::reconnect::RedialPolicy;
use genq_backend::ConnectionPool;
use genq_db::PgTaskStore;
use genq_worker::{Dispatcher, EngineConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "genq_api=debug,genq_worker=debug,genq_backend=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let engine = EngineConfig::from_env().expect("Invalid engine configuration");
    tracing::info!(
        models = engine.registry.len(),
        max_in_flight = engine.max_in_flight,
        "Loaded engine configuration",
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let db_pool = genq_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    genq_db::health_check(&db_pool)
        .await
        .expect("Database health check failed");

    genq_db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Backend connections ---
    let registry = Arc::new(engine.registry);
    let pool = ConnectionPool::connect_all(&registry, engine.connection).await;
    if engine.reconnect_enabled {
        pool.spawn_supervisors(&registry, RedialPolicy::default());
    }

    // --- App state ---
    let store = Arc::new(PgTaskStore::new(db_pool));
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        Arc::clone(&registry),
        Arc::clone(&pool),
        engine.max_in_flight,
    ));
    let state = AppState {
        store,
        config: Arc::new(config.clone()),
        dispatcher: Arc::clone(&dispatcher),
    };

    let app = build_app(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Closing connections releases workers blocked on a reply.
    pool.close_all().await;

    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    if !dispatcher.shutdown(drain).await {
        tracing::warn!(
            in_flight = dispatcher.in_flight(),
            "Task workers still running at shutdown",
        );
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
