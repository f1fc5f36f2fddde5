use std::collections::{BTreeMap, VecDeque};

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{classifier::Category, utils::time::local_date};

/// Summary of one completed session. These are only created once the session stops and are never
/// changed afterwards.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VisitRecord {
    pub url: String,
    pub domain: String,
    pub title: String,
    pub category: Category,
    #[serde(with = "duration_ms")]
    pub duration: TimeDelta,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end_time: DateTime<Utc>,
    pub date: NaiveDate,
}

impl VisitRecord {
    /// Builds a record covering `[start_time, end_time)`. An end before the start means the clock
    /// went backwards, the end is clamped to the start so the duration is zero.
    pub fn new(
        url: String,
        domain: String,
        title: String,
        category: Category,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let end_time = end_time.max(start_time);
        Self {
            url,
            domain,
            title,
            category,
            duration: end_time - start_time,
            start_time,
            end_time,
            date: local_date(start_time),
        }
    }
}

/// Ordered log of visits, oldest first. Stored under `timeData`.
pub type HistoryLog = VecDeque<VisitRecord>;

/// Statistics of a single domain for one day.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct SiteStatistics {
    #[serde(with = "duration_ms")]
    pub time: TimeDelta,
    pub visits: u64,
    pub category: Category,
}

impl SiteStatistics {
    pub fn new(category: Category) -> Self {
        Self {
            time: TimeDelta::zero(),
            visits: 0,
            category,
        }
    }
}

/// Aggregated durations for one calendar date.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DailyStatistics {
    #[serde(with = "duration_ms")]
    pub total_time: TimeDelta,
    #[serde(with = "duration_ms")]
    pub productive_time: TimeDelta,
    #[serde(with = "duration_ms")]
    pub unproductive_time: TimeDelta,
    #[serde(with = "duration_ms")]
    pub neutral_time: TimeDelta,
    #[serde(default)]
    pub sites: BTreeMap<String, SiteStatistics>,
}

impl Default for DailyStatistics {
    fn default() -> Self {
        Self {
            total_time: TimeDelta::zero(),
            productive_time: TimeDelta::zero(),
            unproductive_time: TimeDelta::zero(),
            neutral_time: TimeDelta::zero(),
            sites: BTreeMap::new(),
        }
    }
}

impl DailyStatistics {
    pub fn time_for(&self, category: Category) -> TimeDelta {
        match category {
            Category::Productive => self.productive_time,
            Category::Unproductive => self.unproductive_time,
            Category::Neutral => self.neutral_time,
        }
    }

    fn bucket_mut(&mut self, category: Category) -> &mut TimeDelta {
        match category {
            Category::Productive => &mut self.productive_time,
            Category::Unproductive => &mut self.unproductive_time,
            Category::Neutral => &mut self.neutral_time,
        }
    }

    /// Adds a visit to the day. The category of a site is the one it had when first seen on this
    /// day and is not re-evaluated later. Nothing is changed if any of the sums would overflow.
    pub fn fold(&mut self, visit: &VisitRecord) -> Result<()> {
        let duration = visit.duration.max(TimeDelta::zero());
        let total_time = add_duration(self.total_time, duration)?;
        let bucket_time = add_duration(self.time_for(visit.category), duration)?;
        let (site_time, site_visits) = match self.sites.get(&visit.domain) {
            Some(site) => (
                add_duration(site.time, duration)?,
                site.visits
                    .checked_add(1)
                    .ok_or_else(|| anyhow!("Visit count of {} overflows", visit.domain))?,
            ),
            None => (duration, 1),
        };

        self.total_time = total_time;
        *self.bucket_mut(visit.category) = bucket_time;
        let site = self
            .sites
            .entry(visit.domain.clone())
            .or_insert_with(|| SiteStatistics::new(visit.category));
        site.time = site_time;
        site.visits = site_visits;
        Ok(())
    }
}

fn add_duration(current: TimeDelta, added: TimeDelta) -> Result<TimeDelta> {
    current
        .checked_add(&added)
        .ok_or_else(|| {
            anyhow!(
                "Adding {}ms to {}ms overflows",
                added.num_milliseconds(),
                current.num_milliseconds()
            )
        })
}

/// Mapping from a date to its statistics. Stored under `dailyStats`, serialized with
/// `YYYY-MM-DD` keys.
pub type DailyStatsMap = BTreeMap<NaiveDate, DailyStatistics>;

/// Everything the presentation side reads: all daily statistics plus the history log.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub daily_stats: DailyStatsMap,
    pub time_data: HistoryLog,
}

/// Layout of an exported file. Parsing an export gives back the exact snapshot it was made from.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub export_date: DateTime<Utc>,
    #[serde(flatten)]
    pub snapshot: StatsSnapshot,
}

/// Fields missing from a stored or received value take their default.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub auto_tracking: bool,
    pub notifications: bool,
    #[serde(with = "duration_ms")]
    pub productivity_goal: TimeDelta,
    pub break_reminders: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_tracking: true,
            notifications: true,
            productivity_goal: TimeDelta::hours(6),
            break_reminders: true,
        }
    }
}

/// Durations are stored as whole milliseconds, the same way instants are.
pub mod duration_ms {
    use chrono::TimeDelta;
    use serde::{self, de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_milliseconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<TimeDelta, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = i64::deserialize(deserializer)?;
        TimeDelta::try_milliseconds(ms)
            .ok_or_else(|| D::Error::custom(format!("Duration of {ms}ms is out of range")))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone, Utc};
    use serde_json::json;

    use crate::{
        classifier::Category,
        daemon::storage::entities::{DailyStatistics, DailyStatsMap, Settings, VisitRecord},
        utils::time::local_date,
    };

    fn visit(domain: &str, category: Category, ms: i64) -> VisitRecord {
        let start = Utc.with_ymd_and_hms(2024, 5, 14, 12, 0, 0).unwrap();
        VisitRecord::new(
            format!("https://{domain}/"),
            domain.into(),
            domain.into(),
            category,
            start,
            start + TimeDelta::milliseconds(ms),
        )
    }

    #[test]
    fn test_visit_record_clamps_backwards_clock() {
        let start = Utc.with_ymd_and_hms(2024, 5, 14, 12, 0, 0).unwrap();
        let record = VisitRecord::new(
            "https://example.org".into(),
            "example.org".into(),
            "Example".into(),
            Category::Neutral,
            start,
            start - TimeDelta::seconds(5),
        );
        assert_eq!(record.duration, TimeDelta::zero());
        assert_eq!(record.end_time, record.start_time);
        assert_eq!(record.date, local_date(start));
    }

    #[test]
    fn test_visit_record_json_layout() {
        let record = visit("github.com", Category::Productive, 600_000);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["domain"], json!("github.com"));
        assert_eq!(value["category"], json!("productive"));
        assert_eq!(value["duration"], json!(600_000));
        assert_eq!(
            value["startTime"],
            json!(record.start_time.timestamp_millis())
        );
        assert_eq!(
            value["date"],
            json!(record.date.format("%Y-%m-%d").to_string())
        );
    }

    #[test]
    fn test_fold_keeps_category_sums() {
        let mut stats = DailyStatistics::default();
        stats.fold(&visit("facebook.com", Category::Unproductive, 120_000)).unwrap();
        stats.fold(&visit("wikipedia.org", Category::Productive, 300_000)).unwrap();
        stats.fold(&visit("example.org", Category::Neutral, 1_000)).unwrap();
        stats.fold(&visit("wikipedia.org", Category::Productive, 50_000)).unwrap();

        assert_eq!(
            stats.total_time,
            stats.productive_time + stats.unproductive_time + stats.neutral_time
        );
        let site_sum: TimeDelta = stats.sites.values().map(|s| s.time).sum();
        assert_eq!(site_sum, stats.total_time);
        assert_eq!(stats.sites["wikipedia.org"].visits, 2);
        assert_eq!(stats.time_for(Category::Productive), TimeDelta::milliseconds(350_000));
    }

    #[test]
    fn test_fold_freezes_site_category() {
        let mut stats = DailyStatistics::default();
        stats.fold(&visit("example.org", Category::Neutral, 1_000)).unwrap();
        stats.fold(&visit("example.org", Category::Productive, 1_000)).unwrap();

        assert_eq!(stats.sites["example.org"].category, Category::Neutral);
        assert_eq!(stats.neutral_time, TimeDelta::seconds(1));
        assert_eq!(stats.productive_time, TimeDelta::seconds(1));
    }

    #[test]
    fn test_daily_stats_map_uses_date_keys() {
        let mut map = DailyStatsMap::new();
        let record = visit("github.com", Category::Productive, 10);
        map.entry(record.date).or_default().fold(&record).unwrap();

        let value = serde_json::to_value(&map).unwrap();
        let key = record.date.format("%Y-%m-%d").to_string();
        assert_eq!(value[&key]["totalTime"], json!(10));
        assert_eq!(value[&key]["sites"]["github.com"]["visits"], json!(1));

        let parsed: DailyStatsMap = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, map);
    }

    #[test]
    fn test_fold_overflow_changes_nothing() {
        let mut stats = DailyStatistics::default();
        stats.fold(&visit("github.com", Category::Productive, 1_000)).unwrap();
        stats.total_time = TimeDelta::MAX;
        let before = stats.clone();

        assert!(stats.fold(&visit("github.com", Category::Productive, 1_000)).is_err());
        assert_eq!(stats, before);
    }

    #[test]
    fn test_out_of_range_durations_are_rejected() {
        let parsed = serde_json::from_value::<Settings>(json!({ "productivityGoal": i64::MIN }));
        assert!(parsed.is_err());
        let parsed = serde_json::from_value::<Settings>(json!({ "productivityGoal": i64::MAX }));
        assert_eq!(parsed.unwrap().productivity_goal, TimeDelta::MAX);
    }

    #[test]
    fn test_settings_defaults() {
        let value = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "autoTracking": true,
                "notifications": true,
                "productivityGoal": 21_600_000,
                "breakReminders": true,
            })
        );
    }
}
