use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::{
    daemon::storage::{
        entities::{ExportDocument, StatsSnapshot},
        store::JsonFileStore,
    },
    fs::operations::write_atomically,
};

use super::output::load_snapshot;

#[derive(Debug, Parser)]
pub struct ExportCommand {
    #[arg(long, short, help = "File to write into. Prints to stdout when omitted")]
    out: Option<PathBuf>,
}

pub fn export_document(snapshot: StatsSnapshot, now: DateTime<Utc>) -> ExportDocument {
    ExportDocument {
        export_date: now,
        snapshot,
    }
}

/// Dumps every daily statistic and the whole history as one pretty printed JSON document.
pub async fn process_export_command(
    ExportCommand { out }: ExportCommand,
    dir: &Path,
) -> Result<()> {
    let store = JsonFileStore::new(dir.to_path_buf())?;
    let (snapshot, _) = load_snapshot(&store).await?;
    let document = export_document(snapshot, Utc::now());
    let bytes = serde_json::to_vec_pretty(&document)?;

    match out {
        Some(path) => {
            write_atomically(&path, &bytes)
                .await
                .with_context(|| format!("Failed to write export into {path:?}"))?;
            info!("Exported {} visits into {path:?}", document.snapshot.time_data.len());
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&bytes).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}
