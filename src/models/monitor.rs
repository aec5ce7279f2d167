use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a single status poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteStatus {
    Active,
    Inactive,
}

impl SiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteStatus::Active => "active",
            SiteStatus::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for SiteStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(SiteStatus::Active),
            "inactive" => Ok(SiteStatus::Inactive),
            other => Err(anyhow::anyhow!("unknown site status '{other}'")),
        }
    }
}

impl std::fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped poll result for a site. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub site_id: String,
    pub timestamp_utc: DateTime<Utc>,
    pub status: SiteStatus,
}

/// A local open interval for one weekday. `day_of_week` counts from
/// Monday = 0 through Sunday = 6. A site may carry several rules per day;
/// a site with no rules at all is treated as open around the clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHoursRule {
    pub site_id: String,
    pub day_of_week: u8,
    pub start_time_local: NaiveTime,
    pub end_time_local: NaiveTime,
}

/// IANA timezone assignment for a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteTimezone {
    pub site_id: String,
    pub timezone: String,
}

/// Per-row data-quality metadata. Not part of the CSV artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowDiagnostics {
    /// Business-hours rules skipped as malformed.
    pub skipped_rules: u32,
    /// At least one business-hours span had no observation evidence and
    /// was counted as active.
    pub assumed_active: bool,
    /// The stored timezone name did not parse; the default zone was used.
    pub invalid_timezone: bool,
}

/// One line of the uptime report. All durations are whole minutes; for each
/// window uptime + downtime equals the rounded business-hours duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub site_id: String,
    pub uptime_last_hour: i64,
    pub uptime_last_day: i64,
    pub uptime_last_week: i64,
    pub downtime_last_hour: i64,
    pub downtime_last_day: i64,
    pub downtime_last_week: i64,
    pub diagnostics: RowDiagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("active".parse::<SiteStatus>().unwrap(), SiteStatus::Active);
        assert_eq!(
            " INACTIVE ".parse::<SiteStatus>().unwrap(),
            SiteStatus::Inactive
        );
        assert!("unknown".parse::<SiteStatus>().is_err());
    }

    #[test]
    fn status_round_trips_through_as_str() {
        for status in [SiteStatus::Active, SiteStatus::Inactive] {
            assert_eq!(status.as_str().parse::<SiteStatus>().unwrap(), status);
        }
    }
}
