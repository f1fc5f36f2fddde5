//! Producers of [TrackerEvent](crate::daemon::events::TrackerEvent)s: the browser connection and
//! the sweep timer.

pub mod host;
pub mod protocol;
pub mod ticker;
