//! Postgres implementation of the storage contracts.
//!
//! One connection pool shared by the event log, the metrics cache and the
//! registry. Submodules add the trait impls.

pub mod cache;
pub mod events;
pub mod registry;

use crate::error::Result;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Rows per bulk insert statement when none is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Database handle. Owns the connection pool shared across all modules.
pub struct Db {
    pool: PgPool,
    chunk_size: usize,
}

impl Db {
    /// Connect to Postgres and create a connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self {
            pool,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Set how many events go into one insert statement.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Simple health check: run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}
