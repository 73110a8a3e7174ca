use std::sync::Arc;
use std::time::Duration;

use genq_backend::reconnect::RedialPolicy;
use genq_backend::ConnectionPool;
use genq_db::PgTaskStore;
use genq_worker::{Dispatcher, EngineConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Time allowed for in-flight task workers after shutdown is requested.
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "genq_worker=debug,genq_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = EngineConfig::from_env().expect("Invalid engine configuration");
    tracing::info!(
        models = config.registry.len(),
        max_in_flight = config.max_in_flight,
        reconnect = config.reconnect_enabled,
        "Loaded engine configuration",
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db_pool = genq_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    genq_db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    // --- Backend connections ---
    let registry = Arc::new(config.registry);
    let pool = ConnectionPool::connect_all(&registry, config.connection).await;
    if config.reconnect_enabled {
        pool.spawn_supervisors(&registry, RedialPolicy::default());
    }

    // --- Dispatcher ---
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(PgTaskStore::new(db_pool)),
        Arc::clone(&registry),
        Arc::clone(&pool),
        config.max_in_flight,
    ));

    let cancel = CancellationToken::new();
    let timer = {
        let dispatcher = Arc::clone(&dispatcher);
        let cancel = cancel.clone();
        let interval = config.schedule_interval;
        tokio::spawn(async move { dispatcher.run(interval, cancel).await })
    };

    shutdown_signal().await;

    // Stop triggering cycles, then close connections so workers blocked
    // on a reply are released, then drain the workers.
    cancel.cancel();
    let _ = timer.await;
    pool.close_all().await;
    if !dispatcher.shutdown(WORKER_DRAIN_TIMEOUT).await {
        tracing::warn!(
            in_flight = dispatcher.in_flight(),
            "Task workers still running at shutdown",
        );
    }

    tracing::info!("Worker shut down");
}

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
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
