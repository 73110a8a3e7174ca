//! Task store for the genq dispatch engine.
//!
//! [`TaskStore`] is the contract the dispatcher and HTTP layer consume.
//! [`PgTaskStore`] backs it with PostgreSQL through [`TaskRepo`];
//! [`MemoryTaskStore`] keeps rows in process for tests and local runs.

use sqlx::postgres::PgPoolOptions;

pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

pub use memory::MemoryTaskStore;
pub use repositories::TaskRepo;
pub use store::{PgTaskStore, ResultFields, StoreError, TaskStore};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
