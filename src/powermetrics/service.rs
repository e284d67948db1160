use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::db::{
    models::{TaskConsumption, TotalConsumption},
    ConsumptionStore, ConsumptionTx, StoreError,
};

use super::{
    model::PowerMetrics,
    timestamp::Timestamp,
    validation::{ValidationChain, ValidationError},
};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(
        "Duplicate submission: a powermetrics entry already exists for pc_id {pc_id:?} starting at {start_time}"
    )]
    DuplicateSubmission { pc_id: String, start_time: Timestamp },

    #[error("store unavailable")]
    StoreUnavailable(#[source] StoreError),

    #[error("store write failed")]
    StoreWriteFailed(#[source] StoreError),
}

impl IngestError {
    fn from_write(p: &PowerMetrics, e: StoreError) -> Self {
        match e {
            StoreError::UniqueViolation => Self::DuplicateSubmission {
                pc_id: p.pc_id.clone(),
                start_time: p.start_time,
            },
            other => Self::StoreWriteFailed(other),
        }
    }
}

/// Validates powermetrics reports and writes them to the store.
///
/// Holds the store as an injected dependency; cloning is cheap and every
/// clone shares the same store and rules.
#[derive(Clone)]
pub struct PowerMetricsService {
    store: Arc<dyn ConsumptionStore>,
    validators: Arc<ValidationChain>,
}

impl PowerMetricsService {
    pub fn new(store: Arc<dyn ConsumptionStore>) -> Self {
        Self::with_validators(store, ValidationChain::default())
    }

    pub fn with_validators(store: Arc<dyn ConsumptionStore>, validators: ValidationChain) -> Self {
        Self {
            store,
            validators: Arc::new(validators),
        }
    }

    pub fn validate(&self, payload: &PowerMetrics) -> Result<(), ValidationError> {
        self.validators.validate(payload)
    }

    /// Writes one parent row plus one row per task in a single transaction.
    ///
    /// Fails with [`IngestError::DuplicateSubmission`] when a row for
    /// `(pc_id, start_time)` exists, either found by the pre-check or
    /// reported by the store's uniqueness constraint. Any failure after
    /// `begin` rolls the transaction back; a rollback failure is logged and
    /// the original error is returned.
    pub async fn ingest(&self, payload: &PowerMetrics) -> Result<(), IngestError> {
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(IngestError::StoreUnavailable)?;

        let written = write_report(tx.as_mut(), payload).await;
        if let Err(e) = written {
            if let Err(rollback_err) = tx.rollback().await {
                error!(
                    pc_id = %payload.pc_id,
                    error = %rollback_err,
                    "Failed to roll back powermetrics transaction"
                );
            }
            return Err(e);
        }

        tx.commit()
            .await
            .map_err(|e| IngestError::from_write(payload, e))?;

        info!(
            pc_id = %payload.pc_id,
            start_time = %payload.start_time,
            tasks = payload.tasks.len(),
            "Powermetrics report committed"
        );
        Ok(())
    }
}

async fn write_report(tx: &mut dyn ConsumptionTx, p: &PowerMetrics) -> Result<(), IngestError> {
    let exists = tx
        .entry_exists(&p.pc_id, p.start_time.instant())
        .await
        .map_err(IngestError::StoreWriteFailed)?;
    if exists {
        debug!(pc_id = %p.pc_id, start_time = %p.start_time, "Duplicate powermetrics submission");
        return Err(IngestError::DuplicateSubmission {
            pc_id: p.pc_id.clone(),
            start_time: p.start_time,
        });
    }

    let total = TotalConsumption::from(p);
    tx.insert_total(&total)
        .await
        .map_err(|e| IngestError::from_write(p, e))?;

    for task in &p.tasks {
        tx.insert_task(&TaskConsumption::for_task(&total, task))
            .await
            .map_err(|e| IngestError::from_write(p, e))?;
    }

    Ok(())
}
