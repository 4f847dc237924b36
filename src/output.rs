//! Flat-file output of the derived tables.
//!
//! Every file is rewritten from scratch on each run.

use anyhow::{Context, Result};
use chrono::NaiveTime;
use csv::WriterBuilder;
use serde::Serializer;
use std::path::Path;
use tracing::{debug, info};

use crate::db::TableRecord;
use crate::stats::RunSummary;

pub const SCHEDULED_FILE: &str = "scheduled_stop_times.csv";
pub const ACTUAL_FILE: &str = "actual_stop_times.csv";
pub const ACCESSIBILITY_FILE: &str = "stop_accessibility.csv";
pub const STOPS_CLEANED_FILE: &str = "stops_cleaned.csv";
pub const ROUTES_CLEANED_FILE: &str = "routes_cleaned.csv";

pub fn serialize_time<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&time.format("%H:%M:%S"))
}

/// Writes `records` to `path` with a header row, replacing any existing file.
///
/// The header is written even when there are no records.
pub fn write_records<T: TableRecord>(path: &Path, records: &[T]) -> Result<()> {
    debug!(path = %path.display(), rows = records.len(), "Writing CSV");

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    writer.write_record(T::COLUMNS.iter().map(|(name, _)| *name))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

/// Logs the run summary as pretty-printed JSON.
pub fn print_json(summary: &RunSummary) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}
