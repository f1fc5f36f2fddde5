use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tracing::level_filters::LevelFilter;

use super::{
    collection::ticker::DEFAULT_SWEEP_INTERVAL,
    processing::{aggregator::DEFAULT_HISTORY_LIMIT, retention::DEFAULT_RETENTION_DAYS},
    HostConfig,
};

/// A year.
const MAX_SWEEP_INTERVAL_HOURS: u64 = 24 * 365;

#[derive(Parser, Debug)]
#[command(name = "tabtally-host", version)]
#[command(about = "Tracks browser tab focus. Speaks JSON lines on stdin and stdout", long_about = None)]
pub struct HostArgs {
    #[arg(
        long,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    pub dir: Option<PathBuf>,
    /// Keep all data in memory. Nothing survives a restart.
    #[arg(long)]
    pub ephemeral: bool,
    /// This option is for debugging purposes only. Logs are mirrored to stderr.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
    #[arg(long, default_value_t = DEFAULT_RETENTION_DAYS, help = "Days of history to keep")]
    pub retention_days: u64,
    #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT, help = "Maximum number of visits kept in the history log")]
    pub history_limit: usize,
    #[arg(long, default_value_t = DEFAULT_SWEEP_INTERVAL.as_secs() / 3600, value_parser = clap::value_parser!(u64).range(1..=MAX_SWEEP_INTERVAL_HOURS))]
    pub sweep_interval_hours: u64,
}

impl HostArgs {
    pub fn config(&self) -> HostConfig {
        HostConfig {
            retention_days: self.retention_days,
            history_limit: self.history_limit,
            sweep_interval: Duration::from_secs(self.sweep_interval_hours * 60 * 60),
        }
    }
}
