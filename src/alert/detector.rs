//! Positive-case increase detection.
//!
//! Compares the stored snapshot with the freshly fetched one for the same
//! partition. The comparison is strictly greater-than so that repeated polls
//! of an unchanged upstream never alert.

use crate::model::CanonicalRecord;

/// Outcome of comparing two snapshots of one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertDecision {
    Alert { old_positive: i64, new_positive: i64 },
    NoAlert,
}

impl AlertDecision {
    pub fn is_alert(&self) -> bool {
        matches!(self, AlertDecision::Alert { .. })
    }

    /// Alert text for `location_label`, or `None` when there is nothing to say.
    pub fn message(&self, location_label: &str) -> Option<String> {
        match self {
            AlertDecision::Alert { old_positive, new_positive } => Some(format!(
                "Alert: \nInfections in {} have increased, from {} to {}.",
                location_label, old_positive, new_positive
            )),
            AlertDecision::NoAlert => None,
        }
    }
}

/// Returns `Alert` iff `new.positive > old.positive`.
///
/// Only call this when a previous snapshot exists; a partition's first
/// observation is a baseline and never alerts.
pub fn detect_increase(old: &CanonicalRecord, new: &CanonicalRecord) -> AlertDecision {
    if new.positive > old.positive {
        AlertDecision::Alert {
            old_positive: old.positive,
            new_positive: new.positive,
        }
    } else {
        AlertDecision::NoAlert
    }
}
