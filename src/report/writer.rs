//! CSV report artifact.

use std::path::Path;

use anyhow::{Context, Result};
use csv::Writer;

use crate::models::ReportRow;

/// Column order is part of the downstream delivery contract.
pub const CSV_HEADER: [&str; 7] = [
    "store_id",
    "uptime_last_hour",
    "uptime_last_day",
    "uptime_last_week",
    "downtime_last_hour",
    "downtime_last_day",
    "downtime_last_week",
];

/// Writes the report rows to `path`, one line per site, durations as
/// integer minutes.
pub fn write_csv(path: &Path, rows: &[ReportRow]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create report file: {}", path.display()))?;
    let mut writer = Writer::from_writer(file);

    writer.write_record(CSV_HEADER)?;
    for row in rows {
        writer.write_record(&[
            row.site_id.clone(),
            row.uptime_last_hour.to_string(),
            row.uptime_last_day.to_string(),
            row.uptime_last_week.to_string(),
            row.downtime_last_hour.to_string(),
            row.downtime_last_day.to_string(),
            row.downtime_last_week.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
