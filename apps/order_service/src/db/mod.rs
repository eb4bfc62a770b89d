// apps/order_service/src/db/mod.rs

//! PostgreSQL persistence for the order engine.

mod pg_store;
mod rows;

pub use pg_store::{PgStore, PgUnitOfWork};

use crate::errors::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
  let pool = PgPoolOptions::new()
    .max_connections(max_connections)
    .connect(database_url)
    .await?;
  info!(max_connections, "Database pool ready.");
  Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
  sqlx::migrate!("./migrations").run(pool).await?;
  info!("Database migrations applied.");
  Ok(())
}
