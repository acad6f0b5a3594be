//! Postgres implementation of `activity_core::store` (spec §4.H).
//!
//! A single connection pool (`deadpool-postgres`) backs every guild ingest;
//! each [`PgStore::begin_guild`] call checks out one connection and issues an
//! explicit `BEGIN`, handing back a [`PgGuildTxn`] that owns that connection
//! until it is committed or dropped (spec §5 "the database connection is
//! owned exclusively by its Ingestor" / §4.G "Failure semantics").

mod error;
mod schema;
mod txn;

pub use error::pg_err;
pub use schema::ensure_schema;
pub use txn::PgGuildTxn;

use activity_core::store::{GuildTxn, Store};
use activity_core::StoreError;
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;

/// A pooled Postgres-backed `Store`.
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    /// Build a connection pool from a `postgres://` URL (spec §6 "environment
    /// variable carrying the database connection string").
    pub fn connect(database_url: &str) -> Result<Self, StoreError> {
        let mut config = Config::new();
        config.url = Some(database_url.to_string());
        config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        let pool = config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        Ok(PgStore { pool })
    }

    /// Create the tables this store reads and writes, if they don't already
    /// exist. Idempotent; safe to call on every startup.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let client = self.pool.get().await.map_err(|e| {
            StoreError::Transaction(format!("failed to check out a connection: {e}"))
        })?;
        schema::ensure_schema(&client).await
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin_guild(&self) -> Result<Box<dyn GuildTxn + '_>, StoreError> {
        let client = self.pool.get().await.map_err(|e| {
            StoreError::Transaction(format!("failed to check out a connection: {e}"))
        })?;
        client.batch_execute("BEGIN").await.map_err(pg_err)?;
        tracing::debug!("opened guild transaction");
        Ok(Box::new(PgGuildTxn::new(client)))
    }
}
