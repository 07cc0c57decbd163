/// Core data types for the COVID case alert service.
///
/// This module defines the shared domain model imported by all other modules:
/// raw upstream rows, canonical snapshots, partitions, storage tables and the
/// error taxonomy. It contains no I/O.

use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Upstream field names
// ---------------------------------------------------------------------------

/// Region code column on per-region rows. Aggregate rows do not carry it.
pub const FIELD_STATE: &str = "state";

/// Upstream local-time label of the last data update, e.g. `"3/15 13:00"`.
pub const FIELD_LAST_UPDATE: &str = "lastUpdateEt";

/// Upstream local-time label of the last upstream check.
pub const FIELD_CHECK_TIME: &str = "checkTimeEt";

/// Date-bearing fields. Each gets a derived `ts<field>` epoch when parseable.
pub const DATE_FIELDS: [&str; 2] = [FIELD_LAST_UPDATE, FIELD_CHECK_TIME];

/// Cumulative counters normalized to non-negative integers.
pub const COUNTER_FIELDS: [&str; 5] = ["positive", "negative", "pending", "death", "total"];

/// Sentinel partition key for the national aggregate.
pub const AGGREGATE_KEY: &str = "us";

/// Name of the derived epoch field for a date-bearing field.
pub fn epoch_field(date_field: &str) -> String {
    format!("ts{}", date_field)
}

/// Returns `true` for keys that the normalizer owns and rewrites.
pub fn is_canonical_field(key: &str) -> bool {
    key == FIELD_STATE
        || COUNTER_FIELDS.contains(&key)
        || DATE_FIELDS.iter().any(|f| key == *f || key == epoch_field(f))
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One upstream row as received. No invariants.
pub type RawRecord = Map<String, Value>;

/// A monitored geographic scope with its own snapshot history.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Partition {
    /// National totals (`us_current`).
    Aggregate,
    /// A single region code such as `"WA"` (`states_current`).
    Region(String),
}

impl Partition {
    pub fn key(&self) -> &str {
        match self {
            Partition::Aggregate => AGGREGATE_KEY,
            Partition::Region(code) => code,
        }
    }

    pub fn table(&self) -> Table {
        match self {
            Partition::Aggregate => Table::UsCurrent,
            Partition::Region(_) => Table::StatesCurrent,
        }
    }

    /// Name used in alert text: "the US" or the bare region code.
    pub fn location_label(&self) -> &str {
        match self {
            Partition::Aggregate => "the US",
            Partition::Region(code) => code,
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Logical tables in the snapshot store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    UsCurrent,
    StatesCurrent,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::UsCurrent => "us_current",
            Table::StatesCurrent => "states_current",
        }
    }
}

/// A normalized snapshot of cumulative counts for one partition.
///
/// Created once per poll cycle per partition and never mutated afterwards.
/// `last_update_epoch` is always set: when upstream omits (or garbles) the
/// update label, the normalizer synthesizes both label and epoch from the
/// processing time.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub partition: Partition,
    pub positive: i64,
    pub negative: i64,
    pub pending: i64,
    pub death: i64,
    pub total: i64,
    pub last_update_label: String,
    pub last_update_epoch: i64,
    pub check_time_label: Option<String>,
    pub check_time_epoch: Option<i64>,
    /// Upstream fields the normalizer does not own, kept verbatim.
    pub attributes: RawRecord,
}

impl CanonicalRecord {
    pub fn partition_key(&self) -> &str {
        self.partition.key()
    }

    pub fn counter(&self, field: &str) -> Option<i64> {
        match field {
            "positive" => Some(self.positive),
            "negative" => Some(self.negative),
            "pending" => Some(self.pending),
            "death" => Some(self.death),
            "total" => Some(self.total),
            _ => None,
        }
    }

    /// Renders the record back into upstream shape, including the derived
    /// `ts<field>` epochs. Normalizing the result reproduces this record.
    pub fn to_raw(&self) -> RawRecord {
        let mut raw = self.attributes.clone();

        if let Partition::Region(code) = &self.partition {
            raw.insert(FIELD_STATE.to_string(), Value::from(code.clone()));
        }
        for field in COUNTER_FIELDS {
            raw.insert(field.to_string(), Value::from(self.counter(field).unwrap_or(0)));
        }

        raw.insert(
            FIELD_LAST_UPDATE.to_string(),
            Value::from(self.last_update_label.clone()),
        );
        raw.insert(epoch_field(FIELD_LAST_UPDATE), Value::from(self.last_update_epoch));

        if let Some(label) = &self.check_time_label {
            raw.insert(FIELD_CHECK_TIME.to_string(), Value::from(label.clone()));
            raw.insert(
                epoch_field(FIELD_CHECK_TIME),
                self.check_time_epoch.map(Value::from).unwrap_or(Value::Null),
            );
        }

        raw
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can surface from fetching, storing or notifying.
///
/// Counter coercion failures never appear here; the normalizer recovers from
/// them locally. A partition without history is `Ok(None)` from the store,
/// not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerError {
    /// Non-2xx HTTP response from the upstream API or the webhook.
    HttpError(u16),
    /// The request never produced a response (DNS, TLS, timeout, ...).
    RequestFailed(String),
    /// The response body could not be deserialized into records.
    ParseError(String),
    /// A configured region was absent from the fetched region set.
    RegionNotFound(String),
    /// The snapshot store rejected a read or a batch write.
    StoreError(String),
    /// Delivery to a single recipient failed.
    NotificationFailed { recipient: String, reason: String },
    /// Configuration could not be loaded or is inconsistent.
    ConfigError(String),
}

impl std::fmt::Display for TrackerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerError::HttpError(code) => write!(f, "HTTP error: {}", code),
            TrackerError::RequestFailed(msg) => write!(f, "Request failed: {}", msg),
            TrackerError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            TrackerError::RegionNotFound(code) => {
                write!(f, "Region not found in fetched set: {}", code)
            }
            TrackerError::StoreError(msg) => write!(f, "Store error: {}", msg),
            TrackerError::NotificationFailed { recipient, reason } => {
                write!(f, "Notification to {} failed: {}", recipient, reason)
            }
            TrackerError::ConfigError(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for TrackerError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn region_record() -> CanonicalRecord {
        let mut attributes = RawRecord::new();
        attributes.insert("grade".to_string(), Value::from("A"));
        CanonicalRecord {
            partition: Partition::Region("WA".to_string()),
            positive: 1187,
            negative: 15918,
            pending: 0,
            death: 50,
            total: 17105,
            last_update_label: "3/15 13:00".to_string(),
            last_update_epoch: 1_584_291_600,
            check_time_label: Some("3/15 16:43".to_string()),
            check_time_epoch: None,
            attributes,
        }
    }

    #[test]
    fn test_partition_keys_and_tables() {
        assert_eq!(Partition::Aggregate.key(), "us");
        assert_eq!(Partition::Aggregate.table(), Table::UsCurrent);
        assert_eq!(Partition::Aggregate.location_label(), "the US");

        let wa = Partition::Region("WA".to_string());
        assert_eq!(wa.key(), "WA");
        assert_eq!(wa.table(), Table::StatesCurrent);
        assert_eq!(wa.location_label(), "WA");
    }

    #[test]
    fn test_to_raw_uses_upstream_field_names() {
        let raw = region_record().to_raw();
        assert_eq!(raw.get("state"), Some(&Value::from("WA")));
        assert_eq!(raw.get("positive"), Some(&Value::from(1187)));
        assert_eq!(raw.get("lastUpdateEt"), Some(&Value::from("3/15 13:00")));
        assert_eq!(raw.get("tslastUpdateEt"), Some(&Value::from(1_584_291_600i64)));
        assert_eq!(raw.get("tscheckTimeEt"), Some(&Value::Null));
        assert_eq!(raw.get("grade"), Some(&Value::from("A")));
    }

    #[test]
    fn test_aggregate_to_raw_has_no_state_column() {
        let mut record = region_record();
        record.partition = Partition::Aggregate;
        assert!(!record.to_raw().contains_key("state"));
    }

    #[test]
    fn test_canonical_fields_cover_epoch_columns() {
        assert!(is_canonical_field("tslastUpdateEt"));
        assert!(is_canonical_field("checkTimeEt"));
        assert!(is_canonical_field("death"));
        assert!(!is_canonical_field("hash"));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(TrackerError::HttpError(503).to_string(), "HTTP error: 503");
        assert_eq!(
            TrackerError::RegionNotFound("ZZ".to_string()).to_string(),
            "Region not found in fetched set: ZZ"
        );
    }
}
