mod config;
mod cli;
mod connection;
mod drivers;
mod error;
mod ops;
mod pipeline;
mod sql;
mod storage;
mod utils;

use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;

use cli::{Cli, Commands};
use config::Context;
use pipeline::worker::{EXIT_DEFAULT, EXIT_FAILURE};

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(err) => {
            log::error!("{:#}", err);
            eprintln!("Error: {:#}", err);
            EXIT_FAILURE
        }
    };
    log::logger().flush();
    std::process::exit(code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Version => {
            ops::do_version();
            return Ok(EXIT_DEFAULT);
        }
        Commands::Backups { dir } => {
            // The directory flag makes the settings file optional here.
            let cfg = match dir {
                Some(_) => None,
                None => Some(config::load_config(&cli.config, std::env::vars())?),
            };
            ops::do_backups(cfg.as_ref(), dir.clone())?;
            return Ok(EXIT_DEFAULT);
        }
        Commands::Compare | Commands::Deploy => {}
    }

    let cfg = config::load_config(&cli.config, std::env::vars())?;
    utils::logging::init(&cfg.logging, cli.command.pipeline_name(), !cli.quiet)?;
    let ctx = Context::new(cfg);

    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Cancellation requested; the running stage will finish, later stages are skipped");
            cancel.cancel();
        }
    });

    let bar = if cli.quiet { ops::create_progress_bar("Starting") } else { ProgressBar::hidden() };

    let code = match cli.command {
        Commands::Compare => ops::do_compare(&ctx, &bar).await?,
        Commands::Deploy => ops::do_deploy(&ctx, &bar).await,
        Commands::Backups { .. } | Commands::Version => EXIT_DEFAULT,
    };
    Ok(code)
}
