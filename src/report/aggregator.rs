//! Per-site report assembly.
//!
//! Runs the resolve → partition → estimate pipeline once per site per
//! window and collects the rows. Sites are independent, so each batch is
//! fanned out onto the runtime; a site that violates the estimator's input
//! contract is skipped and counted rather than failing the whole report.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, error, info, warn};

use super::hours::{Schedule, DEFAULT_TIMEZONE};
use super::interval::Interval;
use super::timeline::{self, StatusPoint};
use super::windows::ReportWindows;
use super::{estimator, ReportError};
use crate::models::{ReportRow, RowDiagnostics};
use crate::storage::Storage;

const DEFAULT_BATCH_SIZE: usize = 100;

/// A finished report run.
#[derive(Debug, Clone)]
pub struct Report {
    /// The reference instant the windows trail from.
    pub generated_at: DateTime<Utc>,
    /// One row per site, ordered by site id.
    pub rows: Vec<ReportRow>,
    /// Sites dropped after an input-contract violation.
    pub skipped_sites: u32,
    /// Sites where some business-hours span had no evidence.
    pub assumed_active_sites: u32,
    /// Malformed business-hours rules skipped across all sites.
    pub rule_warnings: u32,
}

pub struct ReportAggregator {
    storage: Arc<dyn Storage>,
    batch_size: usize,
}

impl ReportAggregator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Generates a row for every known site. The reference instant is the
    /// newest observation in the store, so replayed datasets report
    /// against their own clock rather than the wall clock.
    pub async fn generate(&self) -> anyhow::Result<Report> {
        let generated_at = self
            .storage
            .max_observation_timestamp()
            .await?
            .unwrap_or_else(Utc::now);
        let site_ids = self.storage.list_site_ids().await?;
        info!(
            sites = site_ids.len(),
            reference = %generated_at,
            "generating uptime report"
        );

        let mut rows = Vec::with_capacity(site_ids.len());
        let mut skipped_sites = 0u32;
        let mut assumed_active_sites = 0u32;
        let mut rule_warnings = 0u32;

        for chunk in site_ids.chunks(self.batch_size) {
            let mut handles = Vec::with_capacity(chunk.len());
            for site_id in chunk {
                let storage = Arc::clone(&self.storage);
                let site_id = site_id.clone();
                handles.push(tokio::spawn(async move {
                    compute_site_row(storage, site_id, generated_at).await
                }));
            }
            for handle in handles {
                match handle.await? {
                    Ok(row) => {
                        if row.diagnostics.assumed_active {
                            assumed_active_sites += 1;
                        }
                        rule_warnings += row.diagnostics.skipped_rules;
                        rows.push(row);
                    }
                    Err(ReportError::InvalidInput(reason)) => {
                        error!(%reason, "skipping site after input contract violation");
                        skipped_sites += 1;
                    }
                    Err(ReportError::Other(e)) => return Err(e),
                }
            }
            debug!(
                processed = rows.len() + skipped_sites as usize,
                total = site_ids.len(),
                "report progress"
            );
        }

        rows.sort_by(|a, b| a.site_id.cmp(&b.site_id));
        Ok(Report {
            generated_at,
            rows,
            skipped_sites,
            assumed_active_sites,
            rule_warnings,
        })
    }
}

async fn compute_site_row(
    storage: Arc<dyn Storage>,
    site_id: String,
    now: DateTime<Utc>,
) -> Result<ReportRow, ReportError> {
    let windows = ReportWindows::trailing(now);

    let mut invalid_timezone = false;
    let tz: Tz = match storage.get_timezone(&site_id).await? {
        Some(name) => match name.parse() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(site = %site_id, timezone = %name, "unknown timezone, using default");
                invalid_timezone = true;
                DEFAULT_TIMEZONE
            }
        },
        None => DEFAULT_TIMEZONE,
    };

    let rules = storage.get_rules(&site_id).await?;
    let (schedule, warnings) = Schedule::from_rules(&rules);

    let fetch = windows.widest();
    let observations = storage
        .get_observations(&site_id, fetch.start, fetch.end)
        .await?;
    let points = timeline::normalize(&observations)?;

    let hour = estimate_window(&schedule, tz, &points, windows.hour)?;
    let day = estimate_window(&schedule, tz, &points, windows.day)?;
    let week = estimate_window(&schedule, tz, &points, windows.week)?;

    let diagnostics = RowDiagnostics {
        skipped_rules: warnings.len() as u32,
        assumed_active: hour.assumed_active || day.assumed_active || week.assumed_active,
        invalid_timezone,
    };
    if diagnostics.assumed_active {
        debug!(site = %site_id, "business hours without observation evidence, assumed active");
    }

    Ok(ReportRow {
        site_id,
        uptime_last_hour: hour.uptime_minutes,
        uptime_last_day: day.uptime_minutes,
        uptime_last_week: week.uptime_minutes,
        downtime_last_hour: hour.downtime_minutes,
        downtime_last_day: day.downtime_minutes,
        downtime_last_week: week.downtime_minutes,
        diagnostics,
    })
}

fn estimate_window(
    schedule: &Schedule,
    tz: Tz,
    points: &[StatusPoint],
    window: Interval,
) -> Result<estimator::WindowEstimate, ReportError> {
    let intervals = schedule.resolve(tz, window);
    let segments = timeline::partition(&intervals, points)?;
    estimator::estimate(&segments)
}
