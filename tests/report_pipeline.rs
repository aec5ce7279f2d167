//! End-to-end report pipeline tests over in-memory SQLite.
//!
//! These exercise the full resolve → partition → estimate path through
//! the aggregator, including the default policies for sites with no
//! rules, no timezone, or no observations at all.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};

use sitewatch::models::{BusinessHoursRule, Observation, SiteStatus, SiteTimezone};
use sitewatch::report::ReportAggregator;
use sitewatch::storage::{SqliteStorage, Storage};

use sitewatch::models::SiteStatus::{Active, Inactive};

// A single connection keeps every statement on the same in-memory
// database.
async fn create_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn obs(site_id: &str, at: DateTime<Utc>, status: SiteStatus) -> Observation {
    Observation {
        site_id: site_id.to_string(),
        timestamp_utc: at,
        status,
    }
}

fn rule(site_id: &str, day: u8, start: (u32, u32), end: (u32, u32)) -> BusinessHoursRule {
    BusinessHoursRule {
        site_id: site_id.to_string(),
        day_of_week: day,
        start_time_local: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
        end_time_local: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
    }
}

#[tokio::test]
async fn midpoint_interpolation_over_open_site() {
    let storage = create_storage().await;
    let now = Utc.with_ymd_and_hms(2023, 1, 25, 12, 0, 0).unwrap();
    // active an hour before the reference instant, inactive exactly at it;
    // the site is open around the clock (no rules, default timezone).
    storage
        .insert_observations(&[
            obs("s1", now - Duration::hours(1), Active),
            obs("s1", now, Inactive),
        ])
        .await
        .unwrap();

    let report = ReportAggregator::new(storage).generate().await.unwrap();
    assert_eq!(report.generated_at, now);
    assert_eq!(report.rows.len(), 1);

    let row = &report.rows[0];
    assert_eq!(row.uptime_last_hour, 30);
    assert_eq!(row.downtime_last_hour, 30);
    assert_eq!(row.uptime_last_day, 1410);
    assert_eq!(row.downtime_last_day, 30);
    assert_eq!(row.uptime_last_week, 10050);
    assert_eq!(row.downtime_last_week, 30);
    assert!(!row.diagnostics.assumed_active);
}

#[tokio::test]
async fn site_with_no_observations_is_optimistically_up() {
    let storage = create_storage().await;
    // The site only exists in the timezone table; there is no polling
    // history anywhere in the store.
    storage
        .upsert_timezones(&[SiteTimezone {
            site_id: "silent".to_string(),
            timezone: "America/Chicago".to_string(),
        }])
        .await
        .unwrap();

    let report = ReportAggregator::new(storage).generate().await.unwrap();
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.assumed_active_sites, 1);

    let row = &report.rows[0];
    assert_eq!(row.site_id, "silent");
    assert_eq!(row.uptime_last_hour, 60);
    assert_eq!(row.uptime_last_day, 1440);
    assert_eq!(row.uptime_last_week, 10080);
    assert_eq!(row.downtime_last_hour, 0);
    assert_eq!(row.downtime_last_day, 0);
    assert_eq!(row.downtime_last_week, 0);
    assert!(row.diagnostics.assumed_active);
}

#[tokio::test]
async fn unobserved_site_still_gets_a_row_alongside_observed_ones() {
    let storage = create_storage().await;
    let now = Utc.with_ymd_and_hms(2023, 1, 25, 12, 0, 0).unwrap();
    storage
        .insert_observations(&[obs("observed", now, Active)])
        .await
        .unwrap();
    storage
        .upsert_timezones(&[SiteTimezone {
            site_id: "silent".to_string(),
            timezone: "America/Chicago".to_string(),
        }])
        .await
        .unwrap();

    let report = ReportAggregator::new(storage).generate().await.unwrap();
    let site_ids: Vec<&str> = report.rows.iter().map(|r| r.site_id.as_str()).collect();
    assert_eq!(site_ids, vec!["observed", "silent"]);
}

#[tokio::test]
async fn off_hours_contribute_to_neither_bucket() {
    let storage = create_storage().await;
    // 09:00-17:00 Chicago every day. The reference instant is 23:00 local
    // on Tuesday 2023-01-17, so the trailing hour is entirely off-hours.
    let rules: Vec<_> = (0..7).map(|d| rule("shop", d, (9, 0), (17, 0))).collect();
    storage.insert_rules(&rules).await.unwrap();
    storage
        .upsert_timezones(&[SiteTimezone {
            site_id: "shop".to_string(),
            timezone: "America/Chicago".to_string(),
        }])
        .await
        .unwrap();

    let now = Utc.with_ymd_and_hms(2023, 1, 18, 5, 0, 0).unwrap();
    storage
        .insert_observations(&[
            // 09:00 and 13:00 local on Tuesday
            obs("shop", Utc.with_ymd_and_hms(2023, 1, 17, 15, 0, 0).unwrap(), Active),
            obs("shop", Utc.with_ymd_and_hms(2023, 1, 17, 19, 0, 0).unwrap(), Inactive),
            obs("shop", now, Active),
        ])
        .await
        .unwrap();

    let report = ReportAggregator::new(storage).generate().await.unwrap();
    let row = &report.rows[0];

    // Trailing hour is 22:00-23:00 local: closed, nothing accrues.
    assert_eq!(row.uptime_last_hour, 0);
    assert_eq!(row.downtime_last_hour, 0);

    // Tuesday's open stretch is 8h: active 09:00-11:00 (midpoint of the
    // two polls), inactive from there to close.
    assert_eq!(row.uptime_last_day, 120);
    assert_eq!(row.downtime_last_day, 360);

    // Six earlier open days carry the backward-extrapolated active status.
    assert_eq!(row.uptime_last_week, 6 * 480 + 120);
    assert_eq!(row.downtime_last_week, 360);
}

#[tokio::test]
async fn degenerate_rule_falls_back_to_default_policy() {
    let storage = create_storage().await;
    storage
        .insert_rules(&[rule("s1", 2, (12, 0), (12, 0))])
        .await
        .unwrap();

    let report = ReportAggregator::new(storage).generate().await.unwrap();
    let row = &report.rows[0];

    // The only rule is degenerate, so the site is treated as open 24/7.
    assert_eq!(row.diagnostics.skipped_rules, 1);
    assert_eq!(row.uptime_last_week, 10080);
    assert_eq!(report.rule_warnings, 1);
}

#[tokio::test]
async fn last_write_wins_for_same_instant_polls() {
    let storage = create_storage().await;
    let t = Utc.with_ymd_and_hms(2023, 1, 25, 12, 0, 0).unwrap();
    storage
        .insert_observations(&[obs("s1", t, Active), obs("s1", t, Inactive)])
        .await
        .unwrap();

    let report = ReportAggregator::new(storage).generate().await.unwrap();
    let row = &report.rows[0];
    assert_eq!(row.uptime_last_hour, 0);
    assert_eq!(row.downtime_last_hour, 60);
}

#[tokio::test]
async fn totals_reconcile_and_widen_monotonically() {
    let storage = create_storage().await;
    let now = Utc.with_ymd_and_hms(2023, 1, 25, 12, 0, 0).unwrap();
    let rules: Vec<_> = (0..7).map(|d| rule("s1", d, (8, 30), (20, 15))).collect();
    storage.insert_rules(&rules).await.unwrap();

    let mut polls = Vec::new();
    for i in 0..40 {
        let status = if i % 3 == 0 { Inactive } else { Active };
        polls.push(obs("s1", now - Duration::minutes(17 * i), status));
    }
    polls.reverse();
    polls.push(obs("s1", now, Active));
    storage.insert_observations(&polls).await.unwrap();

    let report = ReportAggregator::new(storage).generate().await.unwrap();
    let row = &report.rows[0];

    let hour_total = row.uptime_last_hour + row.downtime_last_hour;
    let day_total = row.uptime_last_day + row.downtime_last_day;
    let week_total = row.uptime_last_week + row.downtime_last_week;

    // Widening the window never shrinks the accounted time, and no window
    // can account for more than its own span.
    assert!(hour_total <= day_total);
    assert!(day_total <= week_total);
    assert!(hour_total <= 60);
    assert!(day_total <= 1440);
    assert!(week_total <= 10080);
}

/// Storage double that violates the ordering contract for one site.
struct MisbehavingStorage {
    inner: Arc<dyn Storage>,
}

#[async_trait]
impl Storage for MisbehavingStorage {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }
    async fn insert_observations(&self, rows: &[Observation]) -> Result<u64> {
        self.inner.insert_observations(rows).await
    }
    async fn insert_rules(&self, rows: &[BusinessHoursRule]) -> Result<u64> {
        self.inner.insert_rules(rows).await
    }
    async fn upsert_timezones(&self, rows: &[SiteTimezone]) -> Result<u64> {
        self.inner.upsert_timezones(rows).await
    }
    async fn get_rules(&self, site_id: &str) -> Result<Vec<BusinessHoursRule>> {
        self.inner.get_rules(site_id).await
    }
    async fn get_timezone(&self, site_id: &str) -> Result<Option<String>> {
        self.inner.get_timezone(site_id).await
    }
    async fn get_observations(
        &self,
        site_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Observation>> {
        let mut rows = self.inner.get_observations(site_id, from, to).await?;
        if site_id == "broken" {
            rows.reverse();
        }
        Ok(rows)
    }
    async fn list_site_ids(&self) -> Result<Vec<String>> {
        self.inner.list_site_ids().await
    }
    async fn max_observation_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        self.inner.max_observation_timestamp().await
    }
}

#[tokio::test]
async fn contract_violation_skips_the_site_not_the_report() {
    let inner = create_storage().await;
    let now = Utc.with_ymd_and_hms(2023, 1, 25, 12, 0, 0).unwrap();
    inner
        .insert_observations(&[
            obs("broken", now - Duration::minutes(30), Active),
            obs("broken", now - Duration::minutes(10), Inactive),
            obs("healthy", now, Active),
        ])
        .await
        .unwrap();

    let storage: Arc<dyn Storage> = Arc::new(MisbehavingStorage { inner });
    let report = ReportAggregator::new(storage).generate().await.unwrap();

    assert_eq!(report.skipped_sites, 1);
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].site_id, "healthy");
}
