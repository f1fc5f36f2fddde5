use std::env::args;

use anyhow::Result;
use clap::Parser;
use tabtally::{
    daemon::{
        args::HostArgs,
        start_host,
        storage::store::{JsonFileStore, MemoryStore},
    },
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, HOST_PREFIX},
        runtime::single_thread_runtime,
    },
};
use tracing::{error, info};

fn main() -> Result<()> {
    let args = HostArgs::parse_from(args());
    run(args).inspect_err(|e| error!("Host failed {e:?}"))
}

fn run(args: HostArgs) -> Result<()> {
    let app_dir = args.dir.clone().map_or_else(create_application_default_path, Ok)?;
    enable_logging(HOST_PREFIX, &app_dir, args.log, args.log_console)?;
    let config = args.config();

    let runtime = single_thread_runtime()?;
    let result = runtime.block_on(async move {
        if args.ephemeral {
            info!("Running with in-memory storage");
            start_host(MemoryStore::new(), config).await
        } else {
            start_host(JsonFileStore::new(app_dir)?, config).await
        }
    });
    // Stdin is read on a blocking thread that can't be interrupted.
    runtime.shutdown_background();
    result
}
