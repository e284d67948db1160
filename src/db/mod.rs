pub mod memory;
pub mod models;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

use self::models::{TaskConsumption, TotalConsumption};

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The `(pc_id, start_time)` uniqueness constraint rejected a write.
    #[error("unique constraint on (pc_id, start_time) violated")]
    UniqueViolation,

    #[error(transparent)]
    Database(sqlx::Error),

    #[error("{0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        let unique = e
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation());
        if unique {
            Self::UniqueViolation
        } else {
            Self::Database(e)
        }
    }
}

/// A relational store that can open transactions over the
/// `total_consumption` and `task_consumption` tables.
#[async_trait]
pub trait ConsumptionStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn ConsumptionTx>, StoreError>;
}

/// An open transaction. Dropping it without calling `commit` discards
/// every write made through it.
#[async_trait]
pub trait ConsumptionTx: Send {
    /// Whether a `total_consumption` row already exists for the key.
    async fn entry_exists(
        &mut self,
        pc_id: &str,
        start_time: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn insert_total(&mut self, row: &TotalConsumption) -> Result<(), StoreError>;

    async fn insert_task(&mut self, row: &TaskConsumption) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
