/// Snapshot persistence.
///
/// Each partition accumulates an append-only history of canonical records.
/// "Latest" is computed at read time as the record with the greatest
/// `last_update_epoch`; there is no separately maintained pointer. Equal
/// epochs are broken by the later check-time epoch, then by the most
/// recently appended row.
///
/// Reads and writes are not transactional with respect to each other, so
/// two cycles running at once can race. Cycles are expected to be
/// serialized by the external scheduler.
///
/// Submodules:
/// - `pg`: the PostgreSQL backend used in production.

pub mod pg;

use std::collections::HashMap;

use crate::model::{CanonicalRecord, Partition, Table, TrackerError};

pub use self::pg::PostgresStore;

/// Storage capability consumed by the poll cycle.
pub trait SnapshotStore {
    /// Creates the backing tables if they do not exist yet.
    fn ensure_schema(&mut self) -> Result<(), TrackerError>;

    /// Returns the most recent record for `partition`, or `Ok(None)` when the
    /// partition has no history yet.
    fn get_latest(&mut self, partition: &Partition) -> Result<Option<CanonicalRecord>, TrackerError>;

    /// Appends every record to `table`. Either all rows are accepted or the
    /// whole batch is reported as failed. Returns the number of rows written.
    fn append_batch(&mut self, table: Table, records: &[CanonicalRecord]) -> Result<usize, TrackerError>;
}

/// Rejects batches that mix partitions from a different table.
pub fn check_batch_table(table: Table, records: &[CanonicalRecord]) -> Result<(), TrackerError> {
    match records.iter().find(|r| r.partition.table() != table) {
        Some(stray) => Err(TrackerError::StoreError(format!(
            "record for partition '{}' does not belong in table {}",
            stray.partition,
            table.name()
        ))),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// Process-local store with the same recency semantics as the database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<Table, Vec<CanonicalRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows of `table` in append order.
    pub fn rows(&self, table: Table) -> &[CanonicalRecord] {
        self.tables.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Full history of one partition in append order.
    pub fn history(&self, partition: &Partition) -> Vec<&CanonicalRecord> {
        self.rows(partition.table())
            .iter()
            .filter(|r| &r.partition == partition)
            .collect()
    }
}

impl SnapshotStore for MemoryStore {
    fn ensure_schema(&mut self) -> Result<(), TrackerError> {
        self.tables.entry(Table::UsCurrent).or_default();
        self.tables.entry(Table::StatesCurrent).or_default();
        Ok(())
    }

    fn get_latest(&mut self, partition: &Partition) -> Result<Option<CanonicalRecord>, TrackerError> {
        let latest = self
            .rows(partition.table())
            .iter()
            .enumerate()
            .filter(|(_, r)| &r.partition == partition)
            .max_by_key(|(seq, r)| (r.last_update_epoch, r.check_time_epoch, *seq))
            .map(|(_, r)| r.clone());

        Ok(latest)
    }

    fn append_batch(&mut self, table: Table, records: &[CanonicalRecord]) -> Result<usize, TrackerError> {
        check_batch_table(table, records)?;
        self.tables
            .entry(table)
            .or_default()
            .extend_from_slice(records);
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawRecord;

    fn snapshot(partition: Partition, positive: i64, epoch: i64) -> CanonicalRecord {
        CanonicalRecord {
            partition,
            positive,
            negative: 0,
            pending: 0,
            death: 0,
            total: positive,
            last_update_label: format!("epoch {}", epoch),
            last_update_epoch: epoch,
            check_time_label: None,
            check_time_epoch: None,
            attributes: RawRecord::new(),
        }
    }

    fn wa() -> Partition {
        Partition::Region("WA".to_string())
    }

    #[test]
    fn test_empty_partition_is_not_found() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get_latest(&wa()), Ok(None));
        assert_eq!(store.get_latest(&Partition::Aggregate), Ok(None));
    }

    #[test]
    fn test_latest_is_max_epoch_not_last_appended() {
        let mut store = MemoryStore::new();
        store
            .append_batch(Table::StatesCurrent, &[snapshot(wa(), 200, 2_000)])
            .unwrap();
        store
            .append_batch(Table::StatesCurrent, &[snapshot(wa(), 100, 1_000)])
            .unwrap();

        let latest = store.get_latest(&wa()).unwrap().expect("history exists");
        assert_eq!(latest.positive, 200);
    }

    #[test]
    fn test_equal_epochs_prefer_latest_append() {
        let mut store = MemoryStore::new();
        store
            .append_batch(
                Table::StatesCurrent,
                &[snapshot(wa(), 100, 1_000), snapshot(wa(), 150, 1_000)],
            )
            .unwrap();

        assert_eq!(store.get_latest(&wa()).unwrap().map(|r| r.positive), Some(150));
    }

    #[test]
    fn test_partitions_are_independent() {
        let mut store = MemoryStore::new();
        let ca = Partition::Region("CA".to_string());
        store
            .append_batch(Table::StatesCurrent, &[snapshot(ca.clone(), 372, 1_000)])
            .unwrap();

        assert_eq!(store.get_latest(&wa()), Ok(None));
        assert_eq!(store.history(&ca).len(), 1);
    }

    #[test]
    fn test_duplicate_rows_are_tolerated() {
        let mut store = MemoryStore::new();
        let row = snapshot(Partition::Aggregate, 1_000, 5);
        store.append_batch(Table::UsCurrent, &[row.clone()]).unwrap();
        store.append_batch(Table::UsCurrent, &[row.clone()]).unwrap();

        assert_eq!(store.rows(Table::UsCurrent).len(), 2);
        assert_eq!(store.get_latest(&Partition::Aggregate), Ok(Some(row)));
    }

    #[test]
    fn test_batch_for_wrong_table_is_rejected_whole() {
        let mut store = MemoryStore::new();
        let result = store.append_batch(
            Table::UsCurrent,
            &[snapshot(Partition::Aggregate, 1, 1), snapshot(wa(), 2, 2)],
        );
        assert!(matches!(result, Err(TrackerError::StoreError(_))));
        assert!(store.rows(Table::UsCurrent).is_empty());
    }
}
