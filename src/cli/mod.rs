pub mod export;
pub mod output;
pub mod summary;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use export::{process_export_command, ExportCommand};
use summary::{process_summary_command, SummaryCommand};
use tracing::level_filters::LevelFilter;

use crate::{
    classifier::classify,
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

use output::Painter;

#[derive(Parser, Debug)]
#[command(name = "tabtally", version, long_about = None)]
#[command(about = "Reports on the time spent on websites", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to read from $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Display totals, productivity and top sites for a range of days")]
    Summary {
        #[command(flatten)]
        command: SummaryCommand,
    },
    #[command(about = "Export every recorded day and visit as JSON")]
    Export {
        #[command(flatten)]
        command: ExportCommand,
    },
    #[command(about = "Show the category a domain falls into")]
    Classify { domain: String },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = args.dir.map_or_else(create_application_default_path, Ok)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &app_dir, logging_level, args.log)?;

    match args.commands {
        Commands::Summary { command } => process_summary_command(command, &app_dir).await,
        Commands::Export { command } => process_export_command(command, &app_dir).await,
        Commands::Classify { domain } => {
            let category = classify(&domain);
            println!(
                "{}\t{}",
                domain,
                Painter::for_stdout().category(category, &category.to_string())
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Args, Commands};

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_dir_is_accepted_after_subcommand() {
        let args = Args::parse_from([
            "tabtally",
            "export",
            "--dir",
            "/tmp/tabtally",
            "--out",
            "x.json",
        ]);
        assert_eq!(args.dir, Some("/tmp/tabtally".into()));
        assert!(matches!(args.commands, Commands::Export { .. }));

        let args = Args::parse_from(["tabtally", "classify", "github.com"]);
        assert!(matches!(args.commands, Commands::Classify { domain } if domain == "github.com"));
    }
}
