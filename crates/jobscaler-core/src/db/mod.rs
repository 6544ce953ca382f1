//! Postgres connection pool and migration management.

pub mod migrate;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

use crate::config::DatabaseConfig;
use crate::Result;

/// Create and connect a Postgres connection pool from a [`DatabaseConfig`].
pub async fn create_pool(config: &DatabaseConfig) -> Result<Pool<Postgres>> {
    tracing::info!(host = %config.host, port = config.port, database = %config.database, "connecting to postgres");

    let pool = PgPoolOptions::new()
        .max_connections(config.pool_size)
        .connect(&config.url())
        .await
        .map_err(crate::Error::Database)?;

    tracing::info!("postgres connected");
    Ok(pool)
}
