//! # wormhole-db
//!
//! Storage for the wormhole relay: wormholes, links, admins and delivery
//! endpoints, kept in SQLite. Queries go through a `sqlx::AnyPool` but use
//! SQLite placeholders and DDL, so only `sqlite:` URLs are accepted.
//!
//! Every query is parameterized; no value is ever spliced into SQL text.

pub mod any_compat;
pub mod repository;

use anyhow::Result;
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;

/// Shared database handle.
#[derive(Clone)]
pub struct Database {
    pub pool: AnyPool,
}

impl Database {
    /// Connect using the application configuration.
    pub async fn connect(config: &wormhole_common::config::AppConfig) -> Result<Self> {
        Self::connect_url(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
    }

    /// Connect to an explicit URL.
    pub async fn connect_url(url: &str, max_connections: u32, min_connections: u32) -> Result<Self> {
        ensure_sqlite(url)?;
        sqlx::any::install_default_drivers();

        tracing::info!("Connecting to database...");
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .connect(url)
            .await?;
        tracing::info!("Connected to database");

        Ok(Self { pool })
    }

    /// Fresh, migrated in-memory SQLite database.
    ///
    /// An in-memory SQLite database lives as long as its connection, so the
    /// pool is pinned to a single connection that is never recycled.
    pub async fn connect_in_memory() -> Result<Self> {
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Health check: verify the database is reachable.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

fn ensure_sqlite(url: &str) -> Result<()> {
    if !url.starts_with("sqlite:") {
        let scheme = url.split_once(':').map_or(url, |(scheme, _)| scheme);
        anyhow::bail!("unsupported database scheme `{scheme}`, expected a sqlite: URL");
    }
    Ok(())
}
