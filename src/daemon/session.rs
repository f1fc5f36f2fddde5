use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::{classifier::classify, daemon::storage::entities::VisitRecord};

use super::events::TabInfo;

/// The tab currently being tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub url: String,
    pub domain: String,
    pub title: String,
    pub started_at: DateTime<Utc>,
}

impl ActiveSession {
    /// The record is classified here, at the moment the session ends.
    fn finish(self, now: DateTime<Utc>) -> VisitRecord {
        if now < self.started_at {
            warn!(
                "Session for {} ends before it started ({} < {}), clamping",
                self.url, now, self.started_at
            );
        }
        let category = classify(&self.domain);
        VisitRecord::new(
            self.url,
            self.domain,
            self.title,
            category,
            self.started_at,
            now,
        )
    }
}

#[derive(Debug, Default)]
enum SessionState {
    #[default]
    Idle,
    Active(ActiveSession),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentTab {
    pub url: String,
    pub title: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentStatus {
    pub is_tracking: bool,
    pub current_tab: Option<CurrentTab>,
}

/// Tracks at most one session at a time. Any change of focus first closes the running session,
/// so no interval is ever counted twice and no interval is lost.
#[derive(Debug, Default)]
pub struct SessionTracker {
    state: SessionState,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&ActiveSession> {
        match &self.state {
            SessionState::Idle => None,
            SessionState::Active(session) => Some(session),
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.current().is_some()
    }

    /// Focus moved to `tab`, or away from the browser for `None`. Navigation inside the focused
    /// tab goes through here as well.
    pub fn focus_changed(&mut self, tab: Option<&TabInfo>, now: DateTime<Utc>) -> Option<VisitRecord> {
        let finished = self.stop(now);
        if let Some(tab) = tab {
            self.start(tab, now);
        }
        finished
    }

    /// Ends the current session. Does nothing while idle.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<VisitRecord> {
        match std::mem::take(&mut self.state) {
            SessionState::Idle => None,
            SessionState::Active(session) => {
                let record = session.finish(now);
                info!(
                    "Stopped tracking {} ({}ms)",
                    record.url,
                    record.duration.num_milliseconds()
                );
                Some(record)
            }
        }
    }

    fn start(&mut self, tab: &TabInfo, now: DateTime<Utc>) {
        let Some((url, domain)) = tab.url.as_deref().and_then(web_domain) else {
            debug!("Not tracking tab {:?}", tab.url);
            return;
        };
        info!("Started tracking {url}");
        self.state = SessionState::Active(ActiveSession {
            url,
            domain,
            title: tab.title.clone(),
            started_at: now,
        });
    }

    pub fn status(&self) -> CurrentStatus {
        CurrentStatus {
            is_tracking: self.is_tracking(),
            current_tab: self.current().map(|session| CurrentTab {
                url: session.url.clone(),
                title: session.title.clone(),
                start_time: session.started_at,
            }),
        }
    }
}

/// Returns the url together with its hostname if it's a page worth tracking: http or https with a
/// host.
pub fn web_domain(url: &str) -> Option<(String, String)> {
    let parsed = Url::parse(url).ok()?;
    match parsed.scheme() {
        "http" | "https" => parsed
            .host_str()
            .map(|host| (url.to_owned(), host.to_owned())),
        _ => None,
    }
}
