use anyhow::Result;
use tracing::{debug, error};

use crate::daemon::storage::{
    decode, encode,
    entities::{DailyStatsMap, HistoryLog, VisitRecord},
    store::{KeyValueStore, StorageKey, StorageValues},
};

pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Folds finished visits into the history log and the daily statistics.
pub struct Aggregator<S> {
    store: S,
    history_limit: usize,
}

impl<S: KeyValueStore> Aggregator<S> {
    pub fn new(store: S, history_limit: usize) -> Self {
        Self {
            store,
            history_limit,
        }
    }

    /// Records a visit. A storage failure loses this visit and leaves the stored state as it was.
    pub async fn record(&self, visit: VisitRecord) {
        let domain = visit.domain.clone();
        if let Err(e) = self.try_record(visit).await {
            error!("Failed to record visit to {domain}: {e:?}");
        }
    }

    pub async fn try_record(&self, visit: VisitRecord) -> Result<()> {
        // Always start from what is stored right now. Another handler might have written since the
        // last fold.
        let mut values = self
            .store
            .get(&[StorageKey::TimeData, StorageKey::DailyStats])
            .await?;
        let mut history: HistoryLog = decode(&mut values, StorageKey::TimeData)?;
        let mut daily_stats: DailyStatsMap = decode(&mut values, StorageKey::DailyStats)?;

        daily_stats.entry(visit.date).or_default().fold(&visit)?;
        let evicted = append_bounded(&mut history, visit, self.history_limit);
        if evicted > 0 {
            debug!("Evicted {evicted} oldest visits from history");
        }

        // Both keys go into the same write, readers never see one without the other.
        self.store
            .set(StorageValues::from([
                (StorageKey::DailyStats, encode(&daily_stats)?),
                (StorageKey::TimeData, encode(&history)?),
            ]))
            .await
    }
}

/// Appends to the end of the log and drops the oldest entries beyond `limit`. Returns how many
/// were dropped.
pub fn append_bounded(history: &mut HistoryLog, visit: VisitRecord, limit: usize) -> usize {
    history.push_back(visit);
    let mut evicted = 0;
    while history.len() > limit {
        history.pop_front();
        evicted += 1;
    }
    evicted
}
