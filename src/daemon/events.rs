use serde::{Deserialize, Serialize};

use super::{
    session::CurrentStatus,
    storage::entities::{Settings, StatsSnapshot},
};

/// A browser tab as reported by the host. Tabs without an url (or with non-web urls) are valid
/// input, they simply never start a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub url: Option<String>,
    #[serde(default)]
    pub title: String,
}

/// Everything the processing loop reacts to. All of them go through one channel so that only one
/// handler touches storage at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// Another tab became the focused one. `None` means the browser lost focus altogether.
    FocusChanged(Option<TabInfo>),
    /// The focused tab finished loading a new page.
    Navigated(TabInfo),
    /// Time to drop data outside of the retention window.
    Sweep,
    Request { id: u64, request: Request },
}

impl TrackerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            TrackerEvent::FocusChanged(Some(_)) => "focus",
            TrackerEvent::FocusChanged(None) => "blur",
            TrackerEvent::Navigated(_) => "navigation",
            TrackerEvent::Sweep => "sweep",
            TrackerEvent::Request { .. } => "request",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    GetCurrentStatus,
    GetStats,
    OpenDashboard,
    GetSettings,
    SaveSettings(Settings),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Status(CurrentStatus),
    Stats(StatsSnapshot),
    Settings { settings: Settings },
    Success { success: bool },
    Error { error: String },
}

impl Response {
    pub fn success() -> Self {
        Response::Success { success: true }
    }

    pub fn error(error: &anyhow::Error) -> Self {
        Response::Error {
            error: format!("{error:#}"),
        }
    }
}

/// Response to a request, paired with the id the request came with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub id: u64,
    #[serde(flatten)]
    pub response: Response,
}
