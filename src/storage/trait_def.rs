use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{BusinessHoursRule, Observation, SiteTimezone};

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes).
    async fn init(&self) -> Result<()>;

    /// Append a batch of status observations.
    async fn insert_observations(&self, rows: &[Observation]) -> Result<u64>;

    /// Append a batch of business-hours rules.
    async fn insert_rules(&self, rows: &[BusinessHoursRule]) -> Result<u64>;

    /// Insert or replace per-site timezone assignments.
    async fn upsert_timezones(&self, rows: &[SiteTimezone]) -> Result<u64>;

    /// Business-hours rules for a site, ordered by weekday and start time.
    async fn get_rules(&self, site_id: &str) -> Result<Vec<BusinessHoursRule>>;

    /// IANA timezone name for a site, if one was ingested.
    async fn get_timezone(&self, site_id: &str) -> Result<Option<String>>;

    /// Observations for a site within `[from, to]`, ascending by
    /// timestamp, plus the nearest observation before `from` and the
    /// nearest after `to` when they exist (boundary interpolation margin).
    async fn get_observations(
        &self,
        site_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Observation>>;

    /// Every site id referenced by observations, rules or timezones.
    async fn list_site_ids(&self) -> Result<Vec<String>>;

    /// Timestamp of the newest observation in the store.
    async fn max_observation_timestamp(&self) -> Result<Option<DateTime<Utc>>>;
}
