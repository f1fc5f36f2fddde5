use std::{sync::Arc, time::Duration};

use anyhow::Result;
use collection::{
    host::{HostEventSource, ReplyWriter},
    ticker::{SweepTicker, DEFAULT_SWEEP_INTERVAL},
};
use events::{Reply, TrackerEvent};
use processing::{
    aggregator::DEFAULT_HISTORY_LIMIT, retention::DEFAULT_RETENTION_DAYS,
    tracking::TrackingProcessor, ProcessingModule,
};
use storage::{initialize, store::KeyValueStore};
use tokio::{
    io::{AsyncBufRead, AsyncWrite, BufReader},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::utils::clock::{Clock, DefaultClock};

pub mod args;
pub mod collection;
pub mod events;
pub mod processing;
pub mod session;
pub mod shutdown;
pub mod storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostConfig {
    pub retention_days: u64,
    pub history_limit: usize,
    pub sweep_interval: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Represents the starting point for the host. Talks to the browser over stdin and stdout until
/// either side goes away.
pub async fn start_host<S: KeyValueStore>(store: S, config: HostConfig) -> Result<()> {
    let shutdown_token = CancellationToken::new();

    let (_, result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        run_host(
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            Arc::new(store),
            config,
            DefaultClock,
            shutdown_token.clone(),
        ),
    );

    result
}

pub async fn run_host<S: KeyValueStore>(
    reader: impl AsyncBufRead + Unpin,
    writer: impl AsyncWrite + Unpin,
    store: Arc<S>,
    config: HostConfig,
    clock: impl Clock + Clone,
    shutdown_token: CancellationToken,
) -> Result<()> {
    // Tracking works without initialized keys, they decode into defaults.
    if let Err(e) = initialize(&store).await {
        error!("Failed to initialize storage {e:?}");
    }

    let (sender, receiver) = mpsc::channel::<TrackerEvent>(10);
    let (reply_sender, reply_receiver) = mpsc::channel::<Reply>(10);

    let source = HostEventSource::new(reader, sender.clone(), shutdown_token.clone());
    let ticker = SweepTicker::new(
        sender,
        config.sweep_interval,
        shutdown_token.clone(),
        Box::new(clock.clone()),
    );
    let processor = ProcessingModule::new(
        receiver,
        TrackingProcessor::new(
            store,
            config.history_limit,
            config.retention_days,
            reply_sender,
            Box::new(clock),
        ),
    );
    let replies = ReplyWriter::new(reply_receiver, writer);

    info!("Host started");
    let (source_result, ticker_result, processing_result, reply_result) =
        tokio::join!(source.run(), ticker.run(), processor.run(), replies.run());

    if let Err(e) = source_result {
        error!("Browser input got an error {e:?}");
    }

    if let Err(e) = ticker_result {
        error!("Sweep ticker got an error {e:?}");
    }

    if let Err(e) = processing_result {
        error!("Processing module got an error {e:?}");
    }

    if let Err(e) = reply_result {
        error!("Reply writer got an error {e:?}");
    }

    info!("Host stopped");
    Ok(())
}

#[cfg(test)]
mod host_tests {
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use serde_json::Value;
    use tempfile::tempdir;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{
            run_host,
            storage::{
                decode,
                entities::{HistoryLog, Settings},
                store::{JsonFileStore, KeyValueStore, MemoryStore, StorageKey},
            },
            HostConfig,
        },
        utils::{clock::Clock, logging::TEST_LOGGING},
    };

    /// Moves one second forward every time it's asked for the time.
    #[derive(Clone)]
    struct SteppingClock {
        now: Arc<Mutex<DateTime<Utc>>>,
    }

    impl SteppingClock {
        fn new() -> Self {
            Self {
                now: Arc::new(Mutex::new(Utc.with_ymd_and_hms(2024, 5, 14, 9, 0, 0).unwrap())),
            }
        }
    }

    #[async_trait]
    impl Clock for SteppingClock {
        fn time(&self) -> DateTime<Utc> {
            let mut now = self.now.lock().unwrap();
            *now += TimeDelta::seconds(1);
            *now
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        async fn sleep_until(&self, instant: Instant) {
            tokio::time::sleep_until(instant).await;
        }
    }

    fn replies(output: &[u8]) -> Vec<Value> {
        std::str::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn reply(replies: &[Value], id: u64) -> &Value {
        replies
            .iter()
            .find(|r| r["id"] == Value::from(id))
            .unwrap_or_else(|| panic!("No reply for {id}"))
    }

    /// Plays a short browsing session through the whole host and stops once input ends.
    #[tokio::test]
    async fn smoke_test_host() -> Result<()> {
        *TEST_LOGGING;
        let input: &[u8] = br#"{"action":"tabActivated","tab":{"url":"https://github.com/","title":"GitHub"}}
{"action":"getCurrentStatus","id":1}
{"action":"tabUpdated","status":"complete","active":true,"tab":{"url":"https://www.youtube.com/watch","title":"Video"}}
{"action":"windowFocusLost"}
{"action":"tabActivated","tab":{"url":"chrome://extensions","title":"Extensions"}}
{"action":"getStats","id":2}
{"action":"saveSettings","id":3,"settings":{"autoTracking":false,"notifications":true,"productivityGoal":3600000,"breakReminders":false}}
{"action":"getSettings","id":4}
"#;
        let store = Arc::new(MemoryStore::new());
        let mut output = Vec::new();
        let shutdown = CancellationToken::new();

        run_host(
            input,
            &mut output,
            store.clone(),
            HostConfig::default(),
            SteppingClock::new(),
            shutdown.clone(),
        )
        .await?;

        assert!(shutdown.is_cancelled());
        let replies = replies(&output);
        assert_eq!(replies.len(), 4);

        let status = reply(&replies, 1);
        assert_eq!(status["isTracking"], Value::Bool(true));
        assert_eq!(status["currentTab"]["url"], "https://github.com/");

        let stats = reply(&replies, 2);
        let history = stats["timeData"].as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["domain"], "github.com");
        assert_eq!(history[1]["domain"], "www.youtube.com");
        assert_eq!(history[1]["category"], "unproductive");

        assert_eq!(reply(&replies, 3)["success"], Value::Bool(true));
        assert_eq!(reply(&replies, 4)["settings"]["productivityGoal"], 3_600_000);

        let mut values = store.get(&StorageKey::ALL).await?;
        let history: HistoryLog = decode(&mut values, StorageKey::TimeData)?;
        // The extensions page is never tracked, nothing is left open at shutdown.
        assert_eq!(history.len(), 2);
        let settings: Settings = decode(&mut values, StorageKey::Settings)?;
        assert!(!settings.auto_tracking);
        Ok(())
    }

    #[tokio::test]
    async fn test_open_session_is_recorded_on_shutdown() -> Result<()> {
        let dir = tempdir()?;
        let input: &[u8] =
            br#"{"action":"tabActivated","tab":{"url":"https://stackoverflow.com/q/1","title":"Q"}}
"#;
        let store = Arc::new(JsonFileStore::new(dir.path().to_path_buf())?);

        run_host(
            input,
            Vec::new(),
            store.clone(),
            HostConfig::default(),
            SteppingClock::new(),
            CancellationToken::new(),
        )
        .await?;

        // A fresh store over the same directory sees what the host left behind.
        let reopened = JsonFileStore::new(dir.path().to_path_buf())?;
        let mut values = reopened.get(&StorageKey::ALL).await?;
        let history: HistoryLog = decode(&mut values, StorageKey::TimeData)?;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].domain, "stackoverflow.com");
        assert!(history[0].duration > TimeDelta::zero());
        assert!(values.contains_key(&StorageKey::Settings));
        Ok(())
    }
}
