use anyhow::Result;

use crate::daemon::events::TrackerEvent;

/// Represents an event processor. Handlers run one at a time and may only be suspended while
/// waiting for storage.
pub trait EventProcessor {
    fn process_next(&mut self, event: TrackerEvent) -> impl std::future::Future<Output = Result<()>>;

    fn finalize(&mut self) -> impl std::future::Future<Output = Result<()>>;
}
