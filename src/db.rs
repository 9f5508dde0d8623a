use std::time::Duration;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::DbConfig;

pub async fn connect(cfg: &DbConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .idle_timeout(Duration::from_secs(cfg.max_idle_time_secs))
        .acquire_timeout(Duration::from_secs(cfg.query_timeout_secs))
        .connect(&cfg.url)
        .await
        .context("connect to database")?;
    tracing::info!("database connection pool established");
    Ok(pool)
}
