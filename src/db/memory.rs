use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{
    models::{TaskConsumption, TotalConsumption},
    ConsumptionStore, ConsumptionTx, StoreError,
};

/// A failure to inject into [`MemoryConsumptionStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `begin` fails.
    Begin,
    /// The task insert with this zero-based index fails.
    TaskInsert(usize),
    /// `commit` fails; staged rows are discarded.
    Commit,
    /// `rollback` fails; staged rows are still discarded.
    Rollback,
}

#[derive(Debug, Default)]
struct Tables {
    totals: Vec<TotalConsumption>,
    tasks: Vec<TaskConsumption>,
}

impl Tables {
    fn has_total(&self, pc_id: &str, start_time: DateTime<Utc>) -> bool {
        self.totals
            .iter()
            .any(|t| t.pc_id == pc_id && t.start_time == start_time)
    }
}

/// In-memory [`ConsumptionStore`].
///
/// Wrapped in `Arc` so clones share the same tables. Writes are staged per
/// transaction and only become visible on commit, which re-checks the
/// `(pc_id, start_time)` uniqueness under the write lock.
#[derive(Clone, Default)]
pub struct MemoryConsumptionStore {
    inner: Arc<RwLock<Tables>>,
    faults: Vec<Fault>,
}

impl MemoryConsumptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle over the same tables that fails at `fault`.
    pub fn with_fault(&self, fault: Fault) -> Self {
        let mut faults = self.faults.clone();
        faults.push(fault);
        Self {
            inner: self.inner.clone(),
            faults,
        }
    }

    /// Snapshot of committed `total_consumption` rows, in insert order.
    pub async fn totals(&self) -> Vec<TotalConsumption> {
        self.inner.read().await.totals.clone()
    }

    /// Snapshot of committed `task_consumption` rows, in insert order.
    pub async fn tasks(&self) -> Vec<TaskConsumption> {
        self.inner.read().await.tasks.clone()
    }
}

#[async_trait]
impl ConsumptionStore for MemoryConsumptionStore {
    async fn begin(&self) -> Result<Box<dyn ConsumptionTx>, StoreError> {
        if self.faults.contains(&Fault::Begin) {
            return Err(StoreError::Backend("injected begin failure".into()));
        }
        Ok(Box::new(MemoryTx {
            tables: self.inner.clone(),
            staged: Tables::default(),
            faults: self.faults.clone(),
        }))
    }
}

struct MemoryTx {
    tables: Arc<RwLock<Tables>>,
    staged: Tables,
    faults: Vec<Fault>,
}

#[async_trait]
impl ConsumptionTx for MemoryTx {
    async fn entry_exists(
        &mut self,
        pc_id: &str,
        start_time: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.staged.has_total(pc_id, start_time)
            || self.tables.read().await.has_total(pc_id, start_time))
    }

    async fn insert_total(&mut self, row: &TotalConsumption) -> Result<(), StoreError> {
        if self.entry_exists(&row.pc_id, row.start_time).await? {
            return Err(StoreError::UniqueViolation);
        }
        self.staged.totals.push(row.clone());
        Ok(())
    }

    async fn insert_task(&mut self, row: &TaskConsumption) -> Result<(), StoreError> {
        let index = self.staged.tasks.len();
        if self.faults.contains(&Fault::TaskInsert(index)) {
            return Err(StoreError::Backend(format!(
                "injected failure inserting task {index}"
            )));
        }
        self.staged.tasks.push(row.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.faults.contains(&Fault::Commit) {
            return Err(StoreError::Backend("injected commit failure".into()));
        }

        let MemoryTx { tables, staged, .. } = *self;
        let mut tables = tables.write().await;
        if staged
            .totals
            .iter()
            .any(|t| tables.has_total(&t.pc_id, t.start_time))
        {
            return Err(StoreError::UniqueViolation);
        }
        tables.totals.extend(staged.totals);
        tables.tasks.extend(staged.tasks);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        if self.faults.contains(&Fault::Rollback) {
            return Err(StoreError::Backend("injected rollback failure".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn total(pc_id: &str, minute: u32) -> TotalConsumption {
        TotalConsumption {
            pc_id: pc_id.to_owned(),
            combined_power: 10.0,
            start_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
            stop_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, minute + 1, 0).unwrap(),
            platform: "linux".to_owned(),
        }
    }

    fn task(parent: &TotalConsumption, name: &str) -> TaskConsumption {
        TaskConsumption {
            task_name: name.to_owned(),
            power: 1.0,
            start_time: parent.start_time,
            stop_time: parent.stop_time,
            platform: parent.platform.clone(),
            pc_id: parent.pc_id.clone(),
        }
    }

    #[tokio::test]
    async fn empty_store_has_no_rows() {
        let store = MemoryConsumptionStore::new();
        assert!(store.totals().await.is_empty());
        assert!(store.tasks().await.is_empty());
    }

    #[tokio::test]
    async fn writes_are_invisible_until_commit() {
        let store = MemoryConsumptionStore::new();
        let row = total("dev1", 0);

        let mut tx = store.begin().await.unwrap();
        tx.insert_total(&row).await.unwrap();
        tx.insert_task(&task(&row, "a")).await.unwrap();
        assert!(tx.entry_exists("dev1", row.start_time).await.unwrap());
        assert!(store.totals().await.is_empty());

        tx.commit().await.unwrap();
        assert_eq!(store.totals().await, vec![row.clone()]);
        assert_eq!(store.tasks().await.len(), 1);
    }

    #[tokio::test]
    async fn rollback_discards_staged_rows() {
        let store = MemoryConsumptionStore::new();
        let row = total("dev1", 0);

        let mut tx = store.begin().await.unwrap();
        tx.insert_total(&row).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(store.totals().await.is_empty());
    }

    #[tokio::test]
    async fn dropping_a_transaction_discards_staged_rows() {
        let store = MemoryConsumptionStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_total(&total("dev1", 0)).await.unwrap();
        }
        assert!(store.totals().await.is_empty());
    }

    #[tokio::test]
    async fn insert_conflicting_with_committed_row_is_rejected() {
        let store = MemoryConsumptionStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_total(&total("dev1", 0)).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = tx.insert_total(&total("dev1", 0)).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation));
    }

    #[tokio::test]
    async fn racing_commits_for_the_same_key_admit_one() {
        let store = MemoryConsumptionStore::new();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        first.insert_total(&total("dev1", 0)).await.unwrap();
        second.insert_total(&total("dev1", 0)).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation));
        assert_eq!(store.totals().await.len(), 1);
    }

    #[tokio::test]
    async fn different_devices_are_separate_keys() {
        let store = MemoryConsumptionStore::new();
        for pc_id in ["dev1", "dev2"] {
            let mut tx = store.begin().await.unwrap();
            tx.insert_total(&total(pc_id, 0)).await.unwrap();
            tx.commit().await.unwrap();
        }
        assert_eq!(store.totals().await.len(), 2);
    }

    #[tokio::test]
    async fn injected_faults() {
        let store = MemoryConsumptionStore::new();
        assert!(store.with_fault(Fault::Begin).begin().await.is_err());

        let row = total("dev1", 0);
        let failing = store.with_fault(Fault::TaskInsert(1));
        let mut tx = failing.begin().await.unwrap();
        tx.insert_task(&task(&row, "a")).await.unwrap();
        assert!(tx.insert_task(&task(&row, "b")).await.is_err());

        let mut tx = store.with_fault(Fault::Commit).begin().await.unwrap();
        tx.insert_total(&row).await.unwrap();
        assert!(tx.commit().await.is_err());
        assert!(store.totals().await.is_empty());

        let tx = store.with_fault(Fault::Rollback).begin().await.unwrap();
        assert!(tx.rollback().await.is_err());
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let store = MemoryConsumptionStore::new();
        let clone = store.clone();

        let mut tx = store.begin().await.unwrap();
        tx.insert_total(&total("dev1", 0)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(clone.totals().await.len(), 1);
    }
}
