/// Record normalization: loosely-typed upstream rows into `CanonicalRecord`s.
///
/// Upstream rows disagree with themselves: counters arrive as integers,
/// floats, numeric strings or not at all, and timestamps are local-time
/// labels like `"3/15 13:00"` with no year and no zero-padding. Every field
/// is handled by an explicit pass that yields a value or a `FieldIssue`;
/// nothing here fails and nothing here performs I/O.
///
/// # Clock injection
/// `processing_time` is a parameter rather than `Utc::now()` so that the
/// synthesized timestamp path is deterministic in tests.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::model::{
    is_canonical_field, CanonicalRecord, Partition, RawRecord, COUNTER_FIELDS, FIELD_CHECK_TIME,
    FIELD_LAST_UPDATE, FIELD_STATE,
};

/// Format of labels synthesized from the processing time (rendered in UTC).
pub const SYNTHESIZED_LABEL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// Field-level results
// ---------------------------------------------------------------------------

/// Why a counter could not be taken from the raw row.
#[derive(Debug, Clone, PartialEq)]
pub enum CoercionError {
    Missing,
    NotNumeric(String),
    Negative(i64),
}

/// A recoverable problem found while normalizing one row.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldIssue {
    /// Counter defaulted to 0.
    Counter { field: &'static str, error: CoercionError },
    /// Date label present but not in `month/day HH:MM` form.
    UnparsedDate { field: &'static str, label: String },
    /// No usable update label; label and epoch came from the processing time.
    SynthesizedUpdate,
}

impl std::fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldIssue::Counter { field, error } => {
                write!(f, "Cannot clean counter {} ({:?}), using 0", field, error)
            }
            FieldIssue::UnparsedDate { field, label } => {
                write!(f, "Unrecognized {} label '{}'", field, label)
            }
            FieldIssue::SynthesizedUpdate => {
                write!(f, "No usable update label, stamped with processing time")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scalar parsers
// ---------------------------------------------------------------------------

/// Parses an upstream label such as `"3/15 13:00"` or `"12/1 09:05"` into a
/// Unix timestamp, interpreting it as wall-clock time in `zone` during
/// `year`.
///
/// Month and day are one or two digits; hour and minute are exactly two.
/// Returns `None` for anything else, including impossible calendar dates.
pub fn parse_update_label(label: &str, year: i32, zone: &FixedOffset) -> Option<i64> {
    let (date, time) = label.split_once(' ')?;
    let (month, day) = date.split_once('/')?;
    let (hour, minute) = time.split_once(':')?;

    if !is_digits(month, 1, 2) || !is_digits(day, 1, 2) {
        return None;
    }
    if !is_digits(hour, 2, 2) || !is_digits(minute, 2, 2) {
        return None;
    }

    let naive = NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)?
        .and_hms_opt(hour.parse().ok()?, minute.parse().ok()?, 0)?;

    zone.from_local_datetime(&naive)
        .single()
        .map(|dt| dt.timestamp())
}

fn is_digits(s: &str, min_len: usize, max_len: usize) -> bool {
    (min_len..=max_len).contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit())
}

/// Converts an upstream counter value into a non-negative integer.
///
/// Integers, finite floats (truncated toward zero), numeric strings and
/// booleans convert. Everything else is a `CoercionError`; callers default
/// those to 0.
pub fn coerce_counter(value: Option<&Value>) -> Result<i64, CoercionError> {
    let n = match value {
        None | Some(Value::Null) => return Err(CoercionError::Missing),
        Some(Value::Bool(b)) => i64::from(*b),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i
            } else if n.as_u64().is_some() {
                i64::MAX
            } else {
                truncate_float(n.as_f64())
                    .ok_or_else(|| CoercionError::NotNumeric(n.to_string()))?
            }
        }
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            match trimmed.parse::<i64>() {
                Ok(i) => i,
                Err(_) => truncate_float(trimmed.parse::<f64>().ok())
                    .ok_or_else(|| CoercionError::NotNumeric(s.clone()))?,
            }
        }
        Some(Value::Array(_)) => return Err(CoercionError::NotNumeric("array".to_string())),
        Some(Value::Object(_)) => return Err(CoercionError::NotNumeric("object".to_string())),
    };

    if n < 0 {
        Err(CoercionError::Negative(n))
    } else {
        Ok(n)
    }
}

fn truncate_float(f: Option<f64>) -> Option<i64> {
    f.filter(|f| f.is_finite()).map(|f| f.trunc() as i64)
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Turns raw rows into canonical records for a fixed reference year and
/// reference timezone.
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// Calendar year assumed for upstream labels, which carry none.
    pub reference_year: i32,
    /// Zone the upstream wall-clock labels are written in.
    pub zone: FixedOffset,
}

impl Normalizer {
    pub fn new(reference_year: i32, zone: FixedOffset) -> Self {
        Self { reference_year, zone }
    }

    /// Normalizes one row, discarding the per-field diagnostics.
    ///
    /// Idempotent: `normalize(&normalize(raw, t).to_raw(), t) == normalize(raw, t)`.
    pub fn normalize(&self, raw: &RawRecord, processing_time: DateTime<Utc>) -> CanonicalRecord {
        self.normalize_with_issues(raw, processing_time).0
    }

    /// Normalizes one row and reports every field that needed a fallback.
    pub fn normalize_with_issues(
        &self,
        raw: &RawRecord,
        processing_time: DateTime<Utc>,
    ) -> (CanonicalRecord, Vec<FieldIssue>) {
        let mut issues = Vec::new();

        let partition = match raw.get(FIELD_STATE).and_then(Value::as_str) {
            Some(code) => Partition::Region(code.to_string()),
            None => Partition::Aggregate,
        };

        let mut counters = [0i64; COUNTER_FIELDS.len()];
        for (slot, field) in counters.iter_mut().zip(COUNTER_FIELDS) {
            match coerce_counter(raw.get(field)) {
                Ok(n) => *slot = n,
                Err(error) => issues.push(FieldIssue::Counter { field, error }),
            }
        }
        let [positive, negative, pending, death, total] = counters;

        let (check_time_label, check_time_epoch) = self.date_field(raw, FIELD_CHECK_TIME, &mut issues);

        let (last_update_label, last_update_epoch) =
            match self.date_field(raw, FIELD_LAST_UPDATE, &mut issues) {
                (Some(label), Some(epoch)) => (label, epoch),
                _ => {
                    issues.push(FieldIssue::SynthesizedUpdate);
                    (
                        processing_time.format(SYNTHESIZED_LABEL_FORMAT).to_string(),
                        processing_time.timestamp(),
                    )
                }
            };

        let attributes = raw
            .iter()
            .filter(|(key, _)| !is_canonical_field(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let record = CanonicalRecord {
            partition,
            positive,
            negative,
            pending,
            death,
            total,
            last_update_label,
            last_update_epoch,
            check_time_label,
            check_time_epoch,
            attributes,
        };

        (record, issues)
    }

    /// Reads a date label and its derived epoch. Non-string values count as
    /// absent.
    fn date_field(
        &self,
        raw: &RawRecord,
        field: &'static str,
        issues: &mut Vec<FieldIssue>,
    ) -> (Option<String>, Option<i64>) {
        let Some(label) = raw.get(field).and_then(Value::as_str) else {
            return (None, None);
        };

        let epoch = parse_update_label(label, self.reference_year, &self.zone);
        if epoch.is_none() {
            issues.push(FieldIssue::UnparsedDate { field, label: label.to_string() });
        }
        (Some(label.to_string()), epoch)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
