//! JSON lines spoken with the browser bridge. Each inbound line is one message tagged by
//! `action`, each outbound line is one [Reply].

use anyhow::Result;
use serde::Deserialize;

use crate::daemon::{
    events::{Reply, Request, TabInfo, TrackerEvent},
    storage::entities::Settings,
};

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum HostMessage {
    TabActivated {
        tab: TabInfo,
    },
    TabUpdated {
        tab: TabInfo,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        active: bool,
    },
    WindowFocusLost,
    GetCurrentStatus {
        id: u64,
    },
    GetStats {
        id: u64,
    },
    OpenDashboard {
        id: u64,
    },
    GetSettings {
        id: u64,
    },
    SaveSettings {
        id: u64,
        settings: Settings,
    },
}

impl HostMessage {
    fn into_event(self) -> Option<TrackerEvent> {
        let request = |id, request| Some(TrackerEvent::Request { id, request });
        match self {
            HostMessage::TabActivated { tab } => Some(TrackerEvent::FocusChanged(Some(tab))),
            // Only a finished load of the focused tab moves the session boundary.
            HostMessage::TabUpdated { tab, status, active }
                if active && status.as_deref() == Some("complete") =>
            {
                Some(TrackerEvent::Navigated(tab))
            }
            HostMessage::TabUpdated { .. } => None,
            HostMessage::WindowFocusLost => Some(TrackerEvent::FocusChanged(None)),
            HostMessage::GetCurrentStatus { id } => request(id, Request::GetCurrentStatus),
            HostMessage::GetStats { id } => request(id, Request::GetStats),
            HostMessage::OpenDashboard { id } => request(id, Request::OpenDashboard),
            HostMessage::GetSettings { id } => request(id, Request::GetSettings),
            HostMessage::SaveSettings { id, settings } => {
                request(id, Request::SaveSettings(settings))
            }
        }
    }
}

/// Parses one inbound line. Messages that are valid but irrelevant produce `None`.
pub fn decode_line(line: &str) -> Result<Option<TrackerEvent>> {
    let message = serde_json::from_str::<HostMessage>(line)?;
    Ok(message.into_event())
}

/// Serializes a reply into a single line, including the trailing newline.
pub fn encode_reply(reply: &Reply) -> Result<Vec<u8>> {
    let mut buffer = serde_json::to_vec(reply)?;
    buffer.push(b'\n');
    Ok(buffer)
}
