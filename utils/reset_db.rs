//! Drops every table managed by the migrator and re-applies all migrations.
//! Development only: all data is lost.

use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let db = Database::connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    Migrator::fresh(&db).await.context("Failed to reset database")?;
    tracing::info!("Database reset successfully");
    Ok(())
}
