//! Flat-file ingestion.
//!
//! Loads the three monitoring CSVs (status polls, business hours,
//! timezones) into the relational store in chunked transactions. Rows are
//! validated into typed records here, at the boundary; a malformed row is
//! skipped with a warning and counted, never fatal.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::models::{BusinessHoursRule, Observation, SiteStatus, SiteTimezone};
use crate::storage::Storage;

const CHUNK_SIZE: usize = 1000;

#[derive(Debug, Default, Clone, Copy)]
pub struct IngestStats {
    pub inserted: u64,
    pub skipped: u64,
}

// The upstream exports name the site column `store_id`; both spellings are
// accepted.

#[derive(Debug, Deserialize)]
struct StatusRecord {
    #[serde(alias = "store_id")]
    site_id: String,
    status: String,
    timestamp_utc: String,
}

#[derive(Debug, Deserialize)]
struct HoursRecord {
    #[serde(alias = "store_id")]
    site_id: String,
    #[serde(alias = "dayOfWeek")]
    day_of_week: u8,
    start_time_local: String,
    end_time_local: String,
}

#[derive(Debug, Deserialize)]
struct TimezoneRecord {
    #[serde(alias = "store_id")]
    site_id: String,
    #[serde(alias = "timezone_str")]
    timezone: String,
}

/// Parses poll timestamps like `2023-01-22 12:09:39.388884 UTC` (the
/// export format) or RFC 3339.
fn parse_utc_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim().trim_end_matches(" UTC");
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
        .with_context(|| format!("unparseable timestamp '{raw}'"))?;
    Ok(naive.and_utc())
}

fn parse_local_time(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M"))
        .with_context(|| format!("unparseable local time '{raw}'"))
}

fn parse_status_record(record: StatusRecord) -> Result<Observation> {
    Ok(Observation {
        timestamp_utc: parse_utc_timestamp(&record.timestamp_utc)?,
        status: record.status.parse::<SiteStatus>()?,
        site_id: record.site_id,
    })
}

fn parse_hours_record(record: HoursRecord) -> Result<BusinessHoursRule> {
    if record.day_of_week > 6 {
        anyhow::bail!("day_of_week {} out of range", record.day_of_week);
    }
    Ok(BusinessHoursRule {
        day_of_week: record.day_of_week,
        start_time_local: parse_local_time(&record.start_time_local)?,
        end_time_local: parse_local_time(&record.end_time_local)?,
        site_id: record.site_id,
    })
}

/// Loads status polls. Input rows need not be sorted; the store orders
/// observations on read.
pub async fn load_status_csv(storage: &dyn Storage, path: &Path) -> Result<IngestStats> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open status file: {}", path.display()))?;

    let mut stats = IngestStats::default();
    let mut chunk: Vec<Observation> = Vec::with_capacity(CHUNK_SIZE);

    for record in reader.deserialize::<StatusRecord>() {
        let parsed = record
            .map_err(anyhow::Error::from)
            .and_then(parse_status_record);
        match parsed {
            Ok(obs) => chunk.push(obs),
            Err(e) => {
                warn!(error = %e, "skipping malformed status row");
                stats.skipped += 1;
            }
        }
        if chunk.len() >= CHUNK_SIZE {
            stats.inserted += storage.insert_observations(&chunk).await?;
            chunk.clear();
        }
    }
    if !chunk.is_empty() {
        stats.inserted += storage.insert_observations(&chunk).await?;
    }

    info!(
        path = %path.display(),
        inserted = stats.inserted,
        skipped = stats.skipped,
        "loaded status observations"
    );
    Ok(stats)
}

pub async fn load_business_hours_csv(storage: &dyn Storage, path: &Path) -> Result<IngestStats> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open business-hours file: {}", path.display()))?;

    let mut stats = IngestStats::default();
    let mut chunk: Vec<BusinessHoursRule> = Vec::with_capacity(CHUNK_SIZE);

    for record in reader.deserialize::<HoursRecord>() {
        let parsed = record
            .map_err(anyhow::Error::from)
            .and_then(parse_hours_record);
        match parsed {
            Ok(rule) => chunk.push(rule),
            Err(e) => {
                warn!(error = %e, "skipping malformed business-hours row");
                stats.skipped += 1;
            }
        }
        if chunk.len() >= CHUNK_SIZE {
            stats.inserted += storage.insert_rules(&chunk).await?;
            chunk.clear();
        }
    }
    if !chunk.is_empty() {
        stats.inserted += storage.insert_rules(&chunk).await?;
    }

    info!(
        path = %path.display(),
        inserted = stats.inserted,
        skipped = stats.skipped,
        "loaded business-hours rules"
    );
    Ok(stats)
}

pub async fn load_timezones_csv(storage: &dyn Storage, path: &Path) -> Result<IngestStats> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open timezone file: {}", path.display()))?;

    let mut stats = IngestStats::default();
    let mut chunk: Vec<SiteTimezone> = Vec::with_capacity(CHUNK_SIZE);

    for record in reader.deserialize::<TimezoneRecord>() {
        match record {
            Ok(tz) => chunk.push(SiteTimezone {
                site_id: tz.site_id,
                timezone: tz.timezone,
            }),
            Err(e) => {
                warn!(error = %e, "skipping malformed timezone row");
                stats.skipped += 1;
            }
        }
        if chunk.len() >= CHUNK_SIZE {
            stats.inserted += storage.upsert_timezones(&chunk).await?;
            chunk.clear();
        }
    }
    if !chunk.is_empty() {
        stats.inserted += storage.upsert_timezones(&chunk).await?;
    }

    info!(
        path = %path.display(),
        inserted = stats.inserted,
        skipped = stats.skipped,
        "loaded timezones"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_export_timestamp_format() {
        let parsed = parse_utc_timestamp("2023-01-22 12:09:39.388884 UTC").unwrap();
        assert_eq!(parsed.timestamp(), 1674389379);
    }

    #[test]
    fn parses_rfc3339_timestamp() {
        let parsed = parse_utc_timestamp("2023-01-22T12:09:39Z").unwrap();
        assert_eq!(parsed.timestamp(), 1674389379);
    }

    #[test]
    fn rejects_garbage_timestamp() {
        assert!(parse_utc_timestamp("last tuesday").is_err());
    }

    #[test]
    fn hours_record_validates_day_range() {
        let record = HoursRecord {
            site_id: "s1".to_string(),
            day_of_week: 7,
            start_time_local: "09:00:00".to_string(),
            end_time_local: "17:00:00".to_string(),
        };
        assert!(parse_hours_record(record).is_err());
    }
}
