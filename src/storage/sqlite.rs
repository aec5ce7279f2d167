use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::models::{BusinessHoursRule, Observation, SiteStatus, SiteTimezone};
use crate::storage::Storage;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

// Timestamps are stored as unix epoch milliseconds, local times as
// "HH:MM:SS" text.

fn decode_observation(site_id: String, timestamp_ms: i64, status: String) -> Result<Observation> {
    let timestamp_utc = DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .with_context(|| format!("invalid stored timestamp {timestamp_ms}"))?;
    let status: SiteStatus = status.parse()?;
    Ok(Observation {
        site_id,
        timestamp_utc,
        status,
    })
}

fn decode_local_time(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .with_context(|| format!("invalid stored local time '{raw}'"))
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS observations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id TEXT NOT NULL,
                timestamp_utc INTEGER NOT NULL,
                status TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_observations_site_time \
             ON observations(site_id, timestamp_utc)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS business_hours (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id TEXT NOT NULL,
                day_of_week INTEGER NOT NULL,
                start_time_local TEXT NOT NULL,
                end_time_local TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_business_hours_site ON business_hours(site_id)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS timezones (
                site_id TEXT PRIMARY KEY,
                timezone TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn insert_observations(&self, rows: &[Observation]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        for obs in rows {
            sqlx::query(
                "INSERT INTO observations (site_id, timestamp_utc, status) VALUES (?, ?, ?)",
            )
            .bind(&obs.site_id)
            .bind(obs.timestamp_utc.timestamp_millis())
            .bind(obs.status.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(rows.len() as u64)
    }

    async fn insert_rules(&self, rows: &[BusinessHoursRule]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        for rule in rows {
            sqlx::query(
                "INSERT INTO business_hours (site_id, day_of_week, start_time_local, end_time_local) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&rule.site_id)
            .bind(rule.day_of_week as i64)
            .bind(rule.start_time_local.format("%H:%M:%S").to_string())
            .bind(rule.end_time_local.format("%H:%M:%S").to_string())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(rows.len() as u64)
    }

    async fn upsert_timezones(&self, rows: &[SiteTimezone]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        for tz in rows {
            sqlx::query(
                r#"
                INSERT INTO timezones (site_id, timezone)
                VALUES (?, ?)
                ON CONFLICT (site_id) DO UPDATE SET timezone = excluded.timezone
                "#,
            )
            .bind(&tz.site_id)
            .bind(&tz.timezone)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(rows.len() as u64)
    }

    async fn get_rules(&self, site_id: &str) -> Result<Vec<BusinessHoursRule>> {
        let rows = sqlx::query_as::<_, (String, i64, String, String)>(
            r#"
            SELECT site_id, day_of_week, start_time_local, end_time_local
            FROM business_hours
            WHERE site_id = ?
            ORDER BY day_of_week, start_time_local
            "#,
        )
        .bind(site_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter()
            .map(|(site_id, day_of_week, start, end)| {
                Ok(BusinessHoursRule {
                    site_id,
                    day_of_week: u8::try_from(day_of_week)
                        .with_context(|| format!("invalid stored day_of_week {day_of_week}"))?,
                    start_time_local: decode_local_time(&start)?,
                    end_time_local: decode_local_time(&end)?,
                })
            })
            .collect()
    }

    async fn get_timezone(&self, site_id: &str) -> Result<Option<String>> {
        let timezone =
            sqlx::query_scalar::<_, String>("SELECT timezone FROM timezones WHERE site_id = ?")
                .bind(site_id)
                .fetch_optional(self.pool.as_ref())
                .await?;

        Ok(timezone)
    }

    async fn get_observations(
        &self,
        site_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Observation>> {
        let from_ms = from.timestamp_millis();
        let to_ms = to.timestamp_millis();

        let preceding = sqlx::query_as::<_, (String, i64, String)>(
            r#"
            SELECT site_id, timestamp_utc, status
            FROM observations
            WHERE site_id = ? AND timestamp_utc < ?
            ORDER BY timestamp_utc DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(site_id)
        .bind(from_ms)
        .fetch_optional(self.pool.as_ref())
        .await?;

        let contained = sqlx::query_as::<_, (String, i64, String)>(
            r#"
            SELECT site_id, timestamp_utc, status
            FROM observations
            WHERE site_id = ? AND timestamp_utc >= ? AND timestamp_utc <= ?
            ORDER BY timestamp_utc ASC, id ASC
            "#,
        )
        .bind(site_id)
        .bind(from_ms)
        .bind(to_ms)
        .fetch_all(self.pool.as_ref())
        .await?;

        let following = sqlx::query_as::<_, (String, i64, String)>(
            r#"
            SELECT site_id, timestamp_utc, status
            FROM observations
            WHERE site_id = ? AND timestamp_utc > ?
            ORDER BY timestamp_utc ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(site_id)
        .bind(to_ms)
        .fetch_optional(self.pool.as_ref())
        .await?;

        preceding
            .into_iter()
            .chain(contained)
            .chain(following)
            .map(|(site_id, ts, status)| decode_observation(site_id, ts, status))
            .collect()
    }

    async fn list_site_ids(&self) -> Result<Vec<String>> {
        let site_ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT site_id FROM observations
            UNION
            SELECT site_id FROM business_hours
            UNION
            SELECT site_id FROM timezones
            ORDER BY site_id
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(site_ids)
    }

    async fn max_observation_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        let max_ms =
            sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(timestamp_utc) FROM observations")
                .fetch_one(self.pool.as_ref())
                .await?;

        max_ms
            .map(|ms| {
                DateTime::<Utc>::from_timestamp_millis(ms)
                    .with_context(|| format!("invalid stored timestamp {ms}"))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // A single connection keeps every test statement on the same
    // in-memory database.
    async fn storage() -> SqliteStorage {
        let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
        storage.init().await.unwrap();
        storage
    }

    fn obs(site_id: &str, secs: i64, status: SiteStatus) -> Observation {
        Observation {
            site_id: site_id.to_string(),
            timestamp_utc: Utc.timestamp_opt(secs, 0).unwrap(),
            status,
        }
    }

    #[tokio::test]
    async fn observations_include_boundary_neighbors() {
        let storage = storage().await;
        storage
            .insert_observations(&[
                obs("s1", 100, SiteStatus::Active),
                obs("s1", 500, SiteStatus::Inactive),
                obs("s1", 900, SiteStatus::Active),
                obs("s1", 1300, SiteStatus::Inactive),
                obs("s2", 600, SiteStatus::Active),
            ])
            .await
            .unwrap();

        let fetched = storage
            .get_observations(
                "s1",
                Utc.timestamp_opt(400, 0).unwrap(),
                Utc.timestamp_opt(1000, 0).unwrap(),
            )
            .await
            .unwrap();

        let times: Vec<i64> = fetched.iter().map(|o| o.timestamp_utc.timestamp()).collect();
        assert_eq!(times, vec![100, 500, 900, 1300]);
        assert!(fetched.iter().all(|o| o.site_id == "s1"));
    }

    #[tokio::test]
    async fn observations_without_neighbors() {
        let storage = storage().await;
        storage
            .insert_observations(&[obs("s1", 500, SiteStatus::Active)])
            .await
            .unwrap();

        let fetched = storage
            .get_observations(
                "s1",
                Utc.timestamp_opt(0, 0).unwrap(),
                Utc.timestamp_opt(1000, 0).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(fetched.len(), 1);
    }

    #[tokio::test]
    async fn site_ids_union_all_tables() {
        let storage = storage().await;
        storage
            .insert_observations(&[obs("obs-only", 100, SiteStatus::Active)])
            .await
            .unwrap();
        storage
            .insert_rules(&[BusinessHoursRule {
                site_id: "rules-only".to_string(),
                day_of_week: 0,
                start_time_local: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_time_local: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            }])
            .await
            .unwrap();
        storage
            .upsert_timezones(&[SiteTimezone {
                site_id: "tz-only".to_string(),
                timezone: "America/New_York".to_string(),
            }])
            .await
            .unwrap();

        let site_ids = storage.list_site_ids().await.unwrap();
        assert_eq!(site_ids, vec!["obs-only", "rules-only", "tz-only"]);
    }

    #[tokio::test]
    async fn rules_round_trip() {
        let storage = storage().await;
        let rule = BusinessHoursRule {
            site_id: "s1".to_string(),
            day_of_week: 3,
            start_time_local: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            end_time_local: NaiveTime::from_hms_opt(22, 15, 0).unwrap(),
        };
        storage
            .insert_rules(std::slice::from_ref(&rule))
            .await
            .unwrap();

        assert_eq!(storage.get_rules("s1").await.unwrap(), vec![rule]);
        assert!(storage.get_rules("absent").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn timezone_upsert_replaces() {
        let storage = storage().await;
        let tz = |name: &str| SiteTimezone {
            site_id: "s1".to_string(),
            timezone: name.to_string(),
        };
        storage
            .upsert_timezones(&[tz("America/Chicago")])
            .await
            .unwrap();
        storage
            .upsert_timezones(&[tz("America/Denver")])
            .await
            .unwrap();

        assert_eq!(
            storage.get_timezone("s1").await.unwrap().as_deref(),
            Some("America/Denver")
        );
        assert_eq!(storage.get_timezone("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn max_timestamp_tracks_newest() {
        let storage = storage().await;
        assert_eq!(storage.max_observation_timestamp().await.unwrap(), None);

        storage
            .insert_observations(&[
                obs("s1", 100, SiteStatus::Active),
                obs("s2", 900, SiteStatus::Inactive),
            ])
            .await
            .unwrap();

        assert_eq!(
            storage.max_observation_timestamp().await.unwrap(),
            Some(Utc.timestamp_opt(900, 0).unwrap())
        );
    }
}
