use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::{
    models::{TaskConsumption, TotalConsumption},
    ConsumptionStore, ConsumptionTx, StoreError,
};

/// [`ConsumptionStore`] backed by a Postgres pool.
///
/// The unique index on `total_consumption (pc_id, start_time)` (see
/// `migrations/`) is what actually excludes concurrent duplicates; a losing
/// writer gets [`StoreError::UniqueViolation`] from `insert_total`.
#[derive(Debug, Clone)]
pub struct PgConsumptionStore {
    pool: PgPool,
}

impl PgConsumptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConsumptionStore for PgConsumptionStore {
    async fn begin(&self) -> Result<Box<dyn ConsumptionTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgConsumptionTx { tx }))
    }
}

struct PgConsumptionTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ConsumptionTx for PgConsumptionTx {
    async fn entry_exists(
        &mut self,
        pc_id: &str,
        start_time: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM total_consumption
                WHERE pc_id = $1
                  AND start_time = $2
            )
            "#,
        )
        .bind(pc_id)
        .bind(start_time)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn insert_total(&mut self, row: &TotalConsumption) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO total_consumption
                (combined_power, start_time, stop_time, platform, pc_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(row.combined_power)
        .bind(row.start_time)
        .bind(row.stop_time)
        .bind(&row.platform)
        .bind(&row.pc_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_task(&mut self, row: &TaskConsumption) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO task_consumption
                (task_name, power, start_time, stop_time, platform, pc_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&row.task_name)
        .bind(row.power)
        .bind(row.start_time)
        .bind(row.stop_time)
        .bind(&row.platform)
        .bind(&row.pc_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    // A failed COMMIT leaves nothing applied: sqlx rolls the connection
    // back before returning it to the pool.
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
