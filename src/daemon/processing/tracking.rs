use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::{
    daemon::{
        events::{Reply, Request, Response, TrackerEvent},
        session::SessionTracker,
        storage::{
            decode, encode,
            entities::{Settings, StatsSnapshot, VisitRecord},
            store::{KeyValueStore, StorageKey, StorageValues},
        },
    },
    utils::clock::Clock,
};

use super::{aggregator::Aggregator, module::EventProcessor, retention::RetentionSweeper};

/// Bridges tracker events with the session state machine and storage. It's the only thing that
/// writes into storage while the host is running.
pub struct TrackingProcessor<S> {
    tracker: SessionTracker,
    aggregator: Aggregator<S>,
    sweeper: RetentionSweeper<S>,
    store: S,
    replies: mpsc::Sender<Reply>,
    clock: Box<dyn Clock>,
}

impl<S: KeyValueStore + Clone> TrackingProcessor<S> {
    pub fn new(
        store: S,
        history_limit: usize,
        retention_days: u64,
        replies: mpsc::Sender<Reply>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            tracker: SessionTracker::new(),
            aggregator: Aggregator::new(store.clone(), history_limit),
            sweeper: RetentionSweeper::new(store.clone(), retention_days),
            store,
            replies,
            clock,
        }
    }
}

impl<S: KeyValueStore> TrackingProcessor<S> {
    async fn record(&self, visit: Option<VisitRecord>) {
        if let Some(visit) = visit {
            self.aggregator.record(visit).await;
        }
    }

    async fn respond(&mut self, request: Request) -> Response {
        let result = match request {
            Request::GetCurrentStatus => Ok(Response::Status(self.tracker.status())),
            Request::GetStats => self.stats().await.map(Response::Stats),
            Request::OpenDashboard => {
                info!("Dashboard requested");
                Ok(Response::success())
            }
            Request::GetSettings => self
                .settings()
                .await
                .map(|settings| Response::Settings { settings }),
            Request::SaveSettings(settings) => {
                self.save_settings(&settings).await.map(|_| Response::success())
            }
        };
        result.unwrap_or_else(|e| {
            error!("Request failed: {e:?}");
            Response::error(&e)
        })
    }

    async fn stats(&self) -> Result<StatsSnapshot> {
        let mut values = self
            .store
            .get(&[StorageKey::DailyStats, StorageKey::TimeData])
            .await?;
        Ok(StatsSnapshot {
            daily_stats: decode(&mut values, StorageKey::DailyStats)?,
            time_data: decode(&mut values, StorageKey::TimeData)?,
        })
    }

    async fn settings(&self) -> Result<Settings> {
        let mut values = self.store.get(&[StorageKey::Settings]).await?;
        decode(&mut values, StorageKey::Settings)
    }

    async fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.store
            .set(StorageValues::from([(StorageKey::Settings, encode(settings)?)]))
            .await
    }
}

impl<S: KeyValueStore> EventProcessor for TrackingProcessor<S> {
    async fn process_next(&mut self, event: TrackerEvent) -> Result<()> {
        match event {
            TrackerEvent::FocusChanged(tab) => {
                let finished = self.tracker.focus_changed(tab.as_ref(), self.clock.time());
                self.record(finished).await;
            }
            TrackerEvent::Navigated(tab) => {
                let finished = self.tracker.focus_changed(Some(&tab), self.clock.time());
                self.record(finished).await;
            }
            TrackerEvent::Sweep => {
                self.sweeper.sweep(self.clock.time()).await;
            }
            TrackerEvent::Request { id, request } => {
                let response = self.respond(request).await;
                self.replies.send(Reply { id, response }).await?;
            }
        }
        Ok(())
    }

    /// The session that is still open when the host stops is recorded up to this moment.
    async fn finalize(&mut self) -> Result<()> {
        let finished = self.tracker.stop(self.clock.time());
        self.record(finished).await;
        Ok(())
    }
}
