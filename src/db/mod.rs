pub mod history;
pub mod models;
pub mod store;

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub use store::{PgStore, Store};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Builds the pool without connecting, so the service starts (and keeps
/// caching readings) while Postgres is down. Connections are opened on first use.
///
/// `acquire_timeout` bounds every query while the database is unreachable;
/// keep it short so the latest-reading fallback answers promptly.
pub fn create_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect_lazy(database_url)
        .context("invalid DATABASE_URL")
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
