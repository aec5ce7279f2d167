//! Business-hours resolution.
//!
//! Clips a UTC interval to the sub-intervals that fall inside a site's
//! local business-hours calendar. Wall-clock rules are applied per local
//! calendar day and converted back to UTC afterwards, so a span crossing a
//! daylight-saving transition shrinks or grows by the offset change.

use chrono::offset::LocalResult;
use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use tracing::warn;

use super::interval::{coalesce, Interval};
use crate::models::BusinessHoursRule;

/// Sites without a timezone record fall back to this zone.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Chicago;

/// A malformed rule that was skipped. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleWarning {
    pub day_of_week: u8,
    pub reason: String,
}

#[derive(Debug, Clone, Copy)]
struct DayRule {
    weekday: u8,
    start: NaiveTime,
    end: NaiveTime,
}

/// A validated weekly schedule. Rules are screened once per site, then the
/// schedule can be resolved against any number of windows.
#[derive(Debug, Clone)]
pub struct Schedule {
    rules: Vec<DayRule>,
    always_open: bool,
}

impl Schedule {
    /// Screens raw rules, dropping malformed ones with a warning. A site
    /// with no valid rules left (or none to begin with) is open 24/7.
    pub fn from_rules(rules: &[BusinessHoursRule]) -> (Self, Vec<RuleWarning>) {
        let mut warnings = Vec::new();
        let mut valid = Vec::new();

        for rule in rules {
            if rule.day_of_week > 6 {
                warnings.push(RuleWarning {
                    day_of_week: rule.day_of_week,
                    reason: format!("day_of_week {} out of range", rule.day_of_week),
                });
                continue;
            }
            if rule.start_time_local >= rule.end_time_local {
                warnings.push(RuleWarning {
                    day_of_week: rule.day_of_week,
                    reason: format!(
                        "start {} is not before end {}",
                        rule.start_time_local, rule.end_time_local
                    ),
                });
                continue;
            }
            valid.push(DayRule {
                weekday: rule.day_of_week,
                start: rule.start_time_local,
                end: rule.end_time_local,
            });
        }

        for warning in &warnings {
            warn!(
                day_of_week = warning.day_of_week,
                reason = %warning.reason,
                "skipping malformed business-hours rule"
            );
        }

        let always_open = valid.is_empty();
        (
            Schedule {
                rules: valid,
                always_open,
            },
            warnings,
        )
    }

    /// Resolves this schedule against a UTC window: the ordered, disjoint
    /// UTC sub-intervals of `window` that are within business hours.
    pub fn resolve(&self, tz: Tz, window: Interval) -> Vec<Interval> {
        let first_day = window.start.with_timezone(&tz).date_naive();
        // The end boundary is exclusive; back off one tick before taking
        // its local date.
        let last_day = (window.end - Duration::milliseconds(1))
            .with_timezone(&tz)
            .date_naive();

        let mut spans = Vec::new();
        let mut date = first_day;
        while date <= last_day {
            let Some(next_date) = date.succ_opt() else {
                break;
            };
            let weekday = date.weekday().num_days_from_monday() as u8;

            if self.always_open {
                spans.push((date.and_time(NaiveTime::MIN), next_date.and_time(NaiveTime::MIN)));
            } else {
                for rule in self.rules.iter().filter(|r| r.weekday == weekday) {
                    // An end in the final second of the day closes at the
                    // next midnight, so an all-day rule covers the whole day.
                    let end = if is_end_of_day(rule.end) {
                        next_date.and_time(NaiveTime::MIN)
                    } else {
                        date.and_time(rule.end)
                    };
                    spans.push((date.and_time(rule.start), end));
                }
            }

            date = next_date;
        }

        let clipped = spans
            .into_iter()
            .filter_map(|(start, end)| {
                let start_utc = local_to_utc(tz, start);
                let end_utc = local_to_utc(tz, end);
                Interval::new(start_utc, end_utc)?.intersect(&window)
            })
            .collect();

        coalesce(clipped)
    }
}

/// One-shot helper: screen rules and resolve a single window.
pub fn resolve(
    tz: Tz,
    rules: &[BusinessHoursRule],
    window: Interval,
) -> (Vec<Interval>, Vec<RuleWarning>) {
    let (schedule, warnings) = Schedule::from_rules(rules);
    (schedule.resolve(tz, window), warnings)
}

fn is_end_of_day(t: NaiveTime) -> bool {
    t.hour() == 23 && t.minute() == 59 && t.second() == 59
}

/// Maps a local wall-clock instant to UTC. Ambiguous instants (fall-back)
/// take the earlier mapping; nonexistent instants (spring-forward gap)
/// advance to the first valid wall-clock time.
fn local_to_utc(tz: Tz, local: NaiveDateTime) -> chrono::DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc),
        LocalResult::None => {
            // Transition gaps start and end on quarter-hour boundaries in
            // tzdata, so probing those finds the first valid instant.
            let past_boundary =
                (local.minute() % 15) as i64 * 60 + local.second() as i64;
            let mut probe = local - Duration::seconds(past_boundary);
            for _ in 0..13 {
                probe += Duration::minutes(15);
                if probe <= local {
                    continue;
                }
                match tz.from_local_datetime(&probe) {
                    LocalResult::Single(dt) => return dt.with_timezone(&Utc),
                    LocalResult::Ambiguous(earlier, _) => return earlier.with_timezone(&Utc),
                    LocalResult::None => continue,
                }
            }
            warn!(%local, zone = %tz, "could not resolve local instant, treating as UTC");
            Utc.from_utc_datetime(&local)
        }
    }
}
