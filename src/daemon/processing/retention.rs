use anyhow::Result;
use chrono::{DateTime, Days, NaiveDate, Utc};
use tracing::{error, info};

use crate::{
    daemon::storage::{
        decode, encode,
        entities::{DailyStatsMap, HistoryLog},
        store::{KeyValueStore, StorageKey, StorageValues},
    },
    utils::time::{date_key, local_date},
};

pub const DEFAULT_RETENTION_DAYS: u64 = 30;

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct SweepOutcome {
    pub removed_visits: usize,
    pub removed_days: usize,
}

/// Drops everything dated before the retention window.
pub struct RetentionSweeper<S> {
    store: S,
    retention: Days,
}

impl<S: KeyValueStore> RetentionSweeper<S> {
    pub fn new(store: S, retention_days: u64) -> Self {
        Self {
            store,
            retention: Days::new(retention_days),
        }
    }

    pub async fn sweep(&self, now: DateTime<Utc>) {
        match self.sweep_from(local_date(now)).await {
            Ok(outcome) => info!(
                "Sweep removed {} visits and {} days",
                outcome.removed_visits, outcome.removed_days
            ),
            Err(e) => error!("Sweep failed, skipping this cycle: {e:?}"),
        }
    }

    /// Keeps entries dated `today - retention` or later. Nothing is written if nothing expired.
    pub async fn sweep_from(&self, today: NaiveDate) -> Result<SweepOutcome> {
        let cutoff = today.checked_sub_days(self.retention).unwrap_or(NaiveDate::MIN);
        info!("Sweeping entries before {}", date_key(cutoff));

        let mut values = self
            .store
            .get(&[StorageKey::TimeData, StorageKey::DailyStats])
            .await?;
        let mut history: HistoryLog = decode(&mut values, StorageKey::TimeData)?;
        let mut daily_stats: DailyStatsMap = decode(&mut values, StorageKey::DailyStats)?;

        let outcome = retain_from(&mut history, &mut daily_stats, cutoff);
        if outcome == SweepOutcome::default() {
            return Ok(outcome);
        }

        self.store
            .set(StorageValues::from([
                (StorageKey::DailyStats, encode(&daily_stats)?),
                (StorageKey::TimeData, encode(&history)?),
            ]))
            .await?;
        Ok(outcome)
    }
}

/// Removes every visit and every day dated strictly before `cutoff`.
pub fn retain_from(
    history: &mut HistoryLog,
    daily_stats: &mut DailyStatsMap,
    cutoff: NaiveDate,
) -> SweepOutcome {
    let visits_before = history.len();
    history.retain(|visit| visit.date >= cutoff);

    let days_before = daily_stats.len();
    daily_stats.retain(|date, _| *date >= cutoff);

    SweepOutcome {
        removed_visits: visits_before - history.len(),
        removed_days: days_before - daily_stats.len(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::{Local, NaiveDate, TimeDelta, TimeZone, Utc};

    use crate::{
        classifier::Category,
        daemon::storage::{
            decode,
            entities::{DailyStatistics, DailyStatsMap, HistoryLog, VisitRecord},
            encode,
            store::{testing::FlakyStore, KeyValueStore, StorageKey, StorageValues},
        },
        utils::logging::TEST_LOGGING,
    };

    use super::{retain_from, RetentionSweeper, SweepOutcome, DEFAULT_RETENTION_DAYS};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    /// A visit at local noon of `date`, so its local date is `date` in every time zone.
    fn visit_on(date: NaiveDate) -> VisitRecord {
        let start = Local
            .from_local_datetime(&date.and_hms_opt(12, 0, 0).unwrap())
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        VisitRecord::new(
            "https://example.org/".into(),
            "example.org".into(),
            "Example".into(),
            Category::Neutral,
            start,
            start + TimeDelta::seconds(10),
        )
    }

    fn days(dates: &[NaiveDate]) -> DailyStatsMap {
        dates
            .iter()
            .map(|date| {
                let mut day = DailyStatistics::default();
                day.fold(&visit_on(*date)).unwrap();
                (*date, day)
            })
            .collect()
    }

    #[test]
    fn test_retain_keeps_boundary() {
        let dates = [date(1), date(5), date(6), date(7), date(30)];
        let mut history = dates.iter().map(|d| visit_on(*d)).collect::<HistoryLog>();
        let mut daily_stats = days(&dates);

        let outcome = retain_from(&mut history, &mut daily_stats, date(6));

        assert_eq!(
            outcome,
            SweepOutcome {
                removed_visits: 2,
                removed_days: 2
            }
        );
        assert_eq!(
            daily_stats.keys().copied().collect::<Vec<_>>(),
            vec![date(6), date(7), date(30)]
        );
        assert_eq!(
            history.iter().map(|v| v.date).collect::<Vec<_>>(),
            vec![date(6), date(7), date(30)]
        );
    }

    #[tokio::test]
    async fn test_sweep_thirty_day_window() -> Result<()> {
        let store = Arc::new(FlakyStore::default());
        // 2024-07-01 - 30 days = 2024-06-01
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let dates = [
            NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
            date(1),
            date(2),
            today,
        ];
        store
            .set(StorageValues::from([
                (
                    StorageKey::TimeData,
                    encode(&dates.iter().map(|d| visit_on(*d)).collect::<HistoryLog>())?,
                ),
                (StorageKey::DailyStats, encode(&days(&dates))?),
            ]))
            .await?;

        let sweeper = RetentionSweeper::new(store.clone(), DEFAULT_RETENTION_DAYS);
        let outcome = sweeper.sweep_from(today).await?;
        assert_eq!(
            outcome,
            SweepOutcome {
                removed_visits: 1,
                removed_days: 1
            }
        );

        let mut values = store.get(&StorageKey::ALL).await?;
        let history: HistoryLog = decode(&mut values, StorageKey::TimeData)?;
        let daily_stats: DailyStatsMap = decode(&mut values, StorageKey::DailyStats)?;
        assert_eq!(history.front().map(|v| v.date), Some(date(1)));
        assert_eq!(daily_stats.keys().next(), Some(&date(1)));
        assert_eq!(daily_stats.len(), 3);

        // A second run has nothing left to do and doesn't write.
        let writes = store.write_count();
        assert_eq!(sweeper.sweep_from(today).await?, SweepOutcome::default());
        assert_eq!(store.write_count(), writes);
        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_failure_is_not_partial() -> Result<()> {
        *TEST_LOGGING;
        let store = Arc::new(FlakyStore::default());
        let dates = [date(1), date(20)];
        let stored_stats = days(&dates);
        store
            .set(StorageValues::from([
                (
                    StorageKey::TimeData,
                    encode(&dates.iter().map(|d| visit_on(*d)).collect::<HistoryLog>())?,
                ),
                (StorageKey::DailyStats, encode(&stored_stats)?),
            ]))
            .await?;

        store.fail_writes(true);
        let sweeper = RetentionSweeper::new(store.clone(), 5);
        assert!(sweeper.sweep_from(date(21)).await.is_err());
        // Logged and swallowed.
        sweeper
            .sweep(Utc.with_ymd_and_hms(2024, 6, 21, 12, 0, 0).unwrap())
            .await;
        store.fail_writes(false);

        let mut values = store.get(&StorageKey::ALL).await?;
        let daily_stats: DailyStatsMap = decode(&mut values, StorageKey::DailyStats)?;
        assert_eq!(daily_stats, stored_stats);
        Ok(())
    }
}
