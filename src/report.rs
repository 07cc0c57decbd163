//! Report inspection
//!
//! Fetches one upstream report and renders every row, after normalization,
//! as a table for eyeballing: upstream columns alongside the
//! cleaned counters and the derived `ts*` epochs. `tracker_urls` is not a
//! record set and is printed verbatim.

use chrono::{DateTime, Utc};
use comfy_table::Table;
use serde_json::Value;

use crate::ingest::covidtracking::{Endpoint, UpstreamSource};
use crate::model::{RawRecord, TrackerError};
use crate::normalize::Normalizer;

/// Fetches `endpoint` and renders it for the terminal.
pub fn render_report(
    source: &dyn UpstreamSource,
    endpoint: Endpoint,
    normalizer: &Normalizer,
    processing_time: DateTime<Utc>,
) -> Result<String, TrackerError> {
    if !endpoint.returns_records() {
        return source.fetch_text(endpoint);
    }

    let rows: Vec<RawRecord> = source
        .fetch_records(endpoint)?
        .iter()
        .map(|raw| normalizer.normalize(raw, processing_time).to_raw())
        .collect();

    Ok(render_table(&rows).to_string())
}

/// One column per key, in order of first appearance across `rows`.
pub fn column_names(rows: &[RawRecord]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn render_table(rows: &[RawRecord]) -> Table {
    let columns = column_names(rows);

    let mut table = Table::new();
    table.set_header(columns.clone());
    for row in rows {
        table.add_row(
            columns
                .iter()
                .map(|column| cell_text(row.get(column)))
                .collect::<Vec<_>>(),
        );
    }
    table
}
