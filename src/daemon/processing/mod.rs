use anyhow::Result;
use module::EventProcessor;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, debug_span, error, Instrument};

use super::events::TrackerEvent;

pub mod aggregator;
pub mod module;
pub mod retention;
pub mod tracking;

/// Represents the single writer of the application. Every event comes through one channel and is
/// handled to completion before the next one is taken.
pub struct ProcessingModule<Processor> {
    receiver: Receiver<TrackerEvent>,
    processor: Processor,
}

impl<P: EventProcessor> ProcessingModule<P> {
    pub fn new(receiver: Receiver<TrackerEvent>, processor: P) -> Self {
        Self {
            receiver,
            processor,
        }
    }

    /// Runs until every sender is gone, then lets the processor finish whatever it keeps in
    /// memory.
    pub async fn run(mut self) -> Result<()> {
        while let Some(event) = self.receiver.recv().await {
            let kind = event.kind();
            let span = debug_span!("event", kind);
            if let Err(e) = self.processor.process_next(event).instrument(span).await {
                error!("Error processing {kind} event: {e:?}")
            }
        }

        debug!("Event channel closed");
        let result = self.processor.finalize().await;
        self.receiver.close();
        result
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{anyhow, Result};
    use tokio::sync::mpsc;

    use crate::daemon::events::TrackerEvent;

    use super::{module::EventProcessor, ProcessingModule};

    #[derive(Default)]
    struct Recorder {
        seen: Vec<&'static str>,
        finalized: bool,
    }

    impl EventProcessor for &mut Recorder {
        async fn process_next(&mut self, event: TrackerEvent) -> Result<()> {
            self.seen.push(event.kind());
            match event {
                TrackerEvent::Sweep => Err(anyhow!("Sweep failed")),
                _ => Ok(()),
            }
        }

        async fn finalize(&mut self) -> Result<()> {
            self.finalized = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_errors_dont_stop_processing() -> Result<()> {
        let (sender, receiver) = mpsc::channel(10);
        let mut recorder = Recorder::default();

        sender.send(TrackerEvent::Sweep).await?;
        sender.send(TrackerEvent::FocusChanged(None)).await?;
        drop(sender);

        ProcessingModule::new(receiver, &mut recorder).run().await?;

        assert_eq!(recorder.seen, vec!["sweep", "blur"]);
        assert!(recorder.finalized);
        Ok(())
    }
}
