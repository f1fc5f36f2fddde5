pub mod analysis;

use std::io::IsTerminal;

use ansi_term::{Colour, Style};
use anyhow::Result;
use chrono::TimeDelta;

use crate::{
    classifier::Category,
    daemon::storage::{
        decode,
        entities::{Settings, StatsSnapshot},
        store::{KeyValueStore, StorageKey},
    },
};

/// Reads everything the reports need in one go. Absent keys come back empty.
pub async fn load_snapshot(store: &impl KeyValueStore) -> Result<(StatsSnapshot, Settings)> {
    let mut values = store.get(&StorageKey::ALL).await?;
    let snapshot = StatsSnapshot {
        daily_stats: decode(&mut values, StorageKey::DailyStats)?,
        time_data: decode(&mut values, StorageKey::TimeData)?,
    };
    Ok((snapshot, decode(&mut values, StorageKey::Settings)?))
}

pub fn format_duration(v: TimeDelta) -> String {
    if v.num_hours() > 0 {
        format!(
            "{}h{}m{}s",
            v.num_hours(),
            v.num_minutes() % 60,
            v.num_seconds() % 60
        )
    } else if v.num_minutes() > 0 {
        format!("{}m{}s", v.num_minutes() % 60, v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds() % 60)
    }
}

pub fn format_change(change: i64) -> String {
    format!("{change:+}%")
}

/// Colors are only used when stdout is a terminal, so piped output stays plain.
pub struct Painter {
    enabled: bool,
}

impl Painter {
    pub fn for_stdout() -> Self {
        Self {
            enabled: std::io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { enabled: false }
    }

    fn paint(&self, style: Style, text: &str) -> String {
        if self.enabled {
            style.paint(text).to_string()
        } else {
            text.to_owned()
        }
    }

    pub fn category(&self, category: Category, text: &str) -> String {
        let style = match category {
            Category::Productive => Colour::Green.normal(),
            Category::Unproductive => Colour::Red.normal(),
            Category::Neutral => Colour::Yellow.normal(),
        };
        self.paint(style, text)
    }

    pub fn change(&self, change: i64) -> String {
        let style = if change >= 0 {
            Colour::Green.normal()
        } else {
            Colour::Red.normal()
        };
        self.paint(style, &format_change(change))
    }

    pub fn heading(&self, text: &str) -> String {
        self.paint(Style::new().bold(), text)
    }
}
