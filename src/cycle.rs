//! One poll-and-alert cycle.
//!
//! Sequence: fetch the aggregate report, compare it with the stored
//! aggregate, store it, alert; then fetch the region report set once,
//! compare and alert for each monitored region, and store the whole set.
//!
//! Failures are contained to the partition they occur in. A partition with
//! no history is stored as a baseline and produces no alert. Nothing is
//! retried here; retry policy belongs to whatever schedules the cycles.
//!
//! Cycles must not overlap: the read-then-write against the store is not
//! transactional.

use chrono::{DateTime, Utc};

use crate::alert::{detect_increase, dispatch, DispatchSummary, Notifier};
use crate::ingest::covidtracking::{Endpoint, UpstreamSource};
use crate::logging::{self, Component};
use crate::model::{CanonicalRecord, Partition, RawRecord, Table, TrackerError};
use crate::normalize::{FieldIssue, Normalizer};
use crate::store::SnapshotStore;

/// Which regions to watch and who to tell. Read once per cycle from
/// configuration and passed in explicitly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleSettings {
    pub regions: Vec<String>,
    pub recipients: Vec<String>,
}

/// What happened to one partition during a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionOutcome {
    /// First observation; stored, nothing to compare against.
    Baseline,
    /// Compared against history; no increase.
    Unchanged,
    /// Compared against history; increase found and dispatched.
    Alerted(DispatchSummary),
    /// Processing for this partition was abandoned.
    Failed(TrackerError),
}

impl PartitionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, PartitionOutcome::Failed(_))
    }

    fn has_delivery_failures(&self) -> bool {
        matches!(self, PartitionOutcome::Alerted(summary) if !summary.all_delivered())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    Success,
    PartialFailure,
}

/// Everything a cycle did, for logging and exit status.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub aggregate: PartitionOutcome,
    /// Monitored regions in configuration order, each code once.
    pub regions: Vec<(String, PartitionOutcome)>,
    pub aggregate_rows_stored: usize,
    pub region_rows_stored: usize,
    pub store_failures: Vec<(Table, TrackerError)>,
}

impl CycleReport {
    fn new() -> Self {
        Self {
            aggregate: PartitionOutcome::Baseline,
            regions: Vec::new(),
            aggregate_rows_stored: 0,
            region_rows_stored: 0,
            store_failures: Vec::new(),
        }
    }

    /// Outcome for one monitored region, if it was configured.
    pub fn region(&self, code: &str) -> Option<&PartitionOutcome> {
        self.regions
            .iter()
            .find(|(c, _)| c == code)
            .map(|(_, outcome)| outcome)
    }

    fn outcomes(&self) -> impl Iterator<Item = &PartitionOutcome> {
        std::iter::once(&self.aggregate).chain(self.regions.iter().map(|(_, o)| o))
    }

    pub fn alerts_sent(&self) -> usize {
        self.outcomes()
            .filter(|o| matches!(o, PartitionOutcome::Alerted(_)))
            .count()
    }

    pub fn status(&self) -> CycleStatus {
        let any_failed = self
            .outcomes()
            .any(|o| o.is_failed() || o.has_delivery_failures());

        if any_failed || !self.store_failures.is_empty() {
            CycleStatus::PartialFailure
        } else {
            CycleStatus::Success
        }
    }
}

/// Borrowed collaborators for the duration of one cycle.
struct Cycle<'a> {
    source: &'a dyn UpstreamSource,
    store: &'a mut dyn SnapshotStore,
    notifier: &'a dyn Notifier,
    normalizer: &'a Normalizer,
    settings: &'a CycleSettings,
    processing_time: DateTime<Utc>,
}

/// Runs one complete cycle. Never fails as a whole; per-partition problems
/// are reported in the returned `CycleReport`.
pub fn run_cycle(
    source: &dyn UpstreamSource,
    store: &mut dyn SnapshotStore,
    notifier: &dyn Notifier,
    normalizer: &Normalizer,
    settings: &CycleSettings,
    processing_time: DateTime<Utc>,
) -> CycleReport {
    let mut cycle = Cycle {
        source,
        store,
        notifier,
        normalizer,
        settings,
        processing_time,
    };
    let mut report = CycleReport::new();

    let aggregate = cycle.process_aggregate(&mut report);
    report.aggregate = aggregate;
    cycle.process_regions(&mut report);

    let total = 1 + report.regions.len();
    let failed = report.outcomes().filter(|o| o.is_failed()).count();
    logging::log_cycle_summary(total, total - failed, failed, report.alerts_sent());

    report
}

impl Cycle<'_> {
    fn normalize_rows(&self, endpoint: Endpoint, rows: &[RawRecord], table: Table) -> Vec<CanonicalRecord> {
        let mut records = Vec::with_capacity(rows.len());

        for raw in rows {
            let (record, issues) = self.normalizer.normalize_with_issues(raw, self.processing_time);
            for issue in &issues {
                // A stamped region row outranks that region's labelled rows
                // from the same day until upstream moves past it.
                let stamped_region = matches!(issue, FieldIssue::SynthesizedUpdate)
                    && matches!(record.partition, Partition::Region(_));
                if stamped_region {
                    logging::warn(Component::Normalize, Some(record.partition_key()), &issue.to_string());
                } else {
                    logging::debug(Component::Normalize, Some(record.partition_key()), &issue.to_string());
                }
            }

            if record.partition.table() == table {
                records.push(record);
            } else {
                logging::warn(
                    Component::Normalize,
                    Some(record.partition_key()),
                    &format!("Dropping row of unexpected shape from {}", endpoint),
                );
            }
        }

        records
    }

    /// Writes one batch; a failure is recorded on the report, not returned.
    fn store_batch(&mut self, table: Table, records: &[CanonicalRecord], report: &mut CycleReport) -> usize {
        logging::info(Component::Store, None, &format!("Storing data for {}.", table.name()));
        match self.store.append_batch(table, records) {
            Ok(n) => n,
            Err(e) => {
                logging::log_failure(Component::Store, None, &format!("store {}", table.name()), &e);
                report.store_failures.push((table, e));
                0
            }
        }
    }

    fn compare_and_notify(&self, partition: &Partition, old: &CanonicalRecord, new: &CanonicalRecord) -> PartitionOutcome {
        let decision = detect_increase(old, new);
        if !decision.is_alert() {
            logging::debug(
                Component::Cycle,
                Some(partition.key()),
                &format!("No increase ({} -> {})", old.positive, new.positive),
            );
            return PartitionOutcome::Unchanged;
        }

        let summary = dispatch(
            &decision,
            partition.location_label(),
            &self.settings.recipients,
            self.notifier,
        );
        PartitionOutcome::Alerted(summary)
    }

    /// Fetches, stores and evaluates the national aggregate.
    fn process_aggregate(&mut self, report: &mut CycleReport) -> PartitionOutcome {
        let partition = Partition::Aggregate;
        let key = partition.key();

        logging::info(Component::Upstream, Some(key), "Getting report us_current.");
        let rows = match self.source.fetch_records(Endpoint::UsCurrent) {
            Ok(rows) => rows,
            Err(e) => {
                logging::log_failure(Component::Upstream, Some(key), "fetch us_current", &e);
                return PartitionOutcome::Failed(e);
            }
        };

        let records = self.normalize_rows(Endpoint::UsCurrent, &rows, Table::UsCurrent);
        let Some(new) = records.first().cloned() else {
            let e = TrackerError::ParseError("us_current contained no aggregate rows".to_string());
            logging::log_failure(Component::Upstream, Some(key), "fetch us_current", &e);
            return PartitionOutcome::Failed(e);
        };

        // Read before write, or the new row would be its own baseline.
        let previous = self.store.get_latest(&partition);

        let stored = self.store_batch(Table::UsCurrent, &records, report);
        report.aggregate_rows_stored = stored;

        match previous {
            Ok(Some(old)) => self.compare_and_notify(&partition, &old, &new),
            Ok(None) => {
                logging::info(Component::Cycle, Some(key), "No previous snapshot, stored baseline.");
                PartitionOutcome::Baseline
            }
            Err(e) => {
                logging::log_failure(Component::Store, Some(key), "read latest snapshot", &e);
                PartitionOutcome::Failed(e)
            }
        }
    }

    /// Evaluates one monitored region against the already fetched set.
    fn process_region(&mut self, code: &str, records: &[CanonicalRecord]) -> PartitionOutcome {
        let partition = Partition::Region(code.to_string());
        logging::info(Component::Cycle, Some(code), "Working on region.");

        let Some(new) = records.iter().find(|r| r.partition == partition) else {
            let e = TrackerError::RegionNotFound(code.to_string());
            logging::log_failure(Component::Cycle, Some(code), "region lookup", &e);
            return PartitionOutcome::Failed(e);
        };

        match self.store.get_latest(&partition) {
            Ok(Some(old)) => self.compare_and_notify(&partition, &old, new),
            Ok(None) => {
                logging::info(Component::Cycle, Some(code), "No previous snapshot, storing baseline.");
                PartitionOutcome::Baseline
            }
            Err(e) => {
                logging::log_failure(Component::Store, Some(code), "read latest snapshot", &e);
                PartitionOutcome::Failed(e)
            }
        }
    }

    /// Fetches the region set once, evaluates every monitored region, then
    /// stores the entire set (monitored or not).
    fn process_regions(&mut self, report: &mut CycleReport) {
        logging::info(Component::Upstream, None, "Getting report states_current.");
        let rows = match self.source.fetch_records(Endpoint::StatesCurrent) {
            Ok(rows) => rows,
            Err(e) => {
                logging::log_failure(Component::Upstream, None, "fetch states_current", &e);
                for code in &self.settings.regions {
                    if report.region(code).is_some() {
                        continue;
                    }
                    report
                        .regions
                        .push((code.clone(), PartitionOutcome::Failed(e.clone())));
                }
                return;
            }
        };

        let records = self.normalize_rows(Endpoint::StatesCurrent, &rows, Table::StatesCurrent);

        let settings = self.settings;
        for code in &settings.regions {
            if report.region(code).is_some() {
                continue;
            }
            let outcome = self.process_region(code, &records);
            report.regions.push((code.clone(), outcome));
        }

        let stored = self.store_batch(Table::StatesCurrent, &records, report);
        report.region_rows_stored = stored;
    }
}
