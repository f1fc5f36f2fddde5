use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{daemon::events::TrackerEvent, utils::clock::Clock};

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Asks for a retention sweep right away and then once per `period`. The sweep itself runs in the
/// processing module, so it never overlaps with recording a visit.
pub struct SweepTicker {
    next: mpsc::Sender<TrackerEvent>,
    period: Duration,
    shutdown: CancellationToken,
    time_provider: Box<dyn Clock>,
}

impl SweepTicker {
    pub fn new(
        next: mpsc::Sender<TrackerEvent>,
        period: Duration,
        shutdown: CancellationToken,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            period,
            shutdown,
            time_provider,
        }
    }

    /// Executes the timer loop.
    pub async fn run(self) -> Result<()> {
        let mut sweep_point = self.time_provider.instant();
        loop {
            debug!("Requesting sweep");
            if self.next.send(TrackerEvent::Sweep).await.is_err() {
                info!("Processing stopped, no more sweeps");
                return Ok(());
            }

            let Some(next_point) = sweep_point.checked_add(self.period) else {
                warn!("Sweep period {:?} is out of range, no more sweeps", self.period);
                return Ok(());
            };
            sweep_point = next_point;

            tokio::select! {
                // Cancelation drops the sender, which lets the processing module finish.
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(sweep_point) => ()
            }
        }
    }
}
