use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;

/// Build the shared connection pool and verify it can reach the server.
pub async fn connect(config: &DatabaseConfig) -> sqlx::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.pool_max_size)
        .acquire_timeout(Duration::from_secs(config.pool_timeout_seconds))
        .connect(&config.url)
        .await?;

    sqlx::query("select 1").execute(&pool).await?;

    Ok(pool)
}
