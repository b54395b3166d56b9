use anyhow::{anyhow, Result};
use colored::*;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use log::error;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{non_empty, AppConfig, Context};
use crate::drivers::sqlcmd::SqlCmdClient;
use crate::pipeline::compare::strategy_for;
use crate::pipeline::orchestrator::{CompareOutcome, ComparePlan, Orchestrator, RollbackCause};
use crate::pipeline::rollback::{PlaceholderRollback, RestoreLatestBackup};
use crate::pipeline::verify::SmokeTest;
use crate::pipeline::worker::{DeployPlan, DeployWorker, EXIT_FAILURE, EXIT_SUCCESS};
use crate::storage;
use crate::utils::hash::short_hash;

/// Backup-compare pipeline. Returns the process exit code.
pub async fn do_compare(ctx: &Context, bar: &ProgressBar) -> Result<i32> {
    log::info!("Database Backup Service Starting...");
    let plan = ComparePlan::from_config(&ctx.config)?;
    let settings = &ctx.config.backup_settings;

    let client = SqlCmdClient::new(&settings.sql_cmd_path)
        .trusted(true)
        .query_timeout(settings.sql_cmd_timeout);
    let orchestrator = Orchestrator::new(
        Arc::new(client),
        strategy_for(settings.diff_strategy),
        Box::new(SmokeTest),
        Box::new(PlaceholderRollback),
        ctx.cancel.clone(),
    );

    let outcome = orchestrator.run(&plan, bar).await;
    bar.finish_and_clear();
    let outcome = outcome?;

    match &outcome {
        CompareOutcome::NoDifferences => {
            println!("{} {}", "✔".green().bold(), "No differences between production and development".green());
        }
        CompareOutcome::StagingSkipped { diff_path } => {
            println!(
                "{} {}",
                "i".yellow().bold(),
                format!("Differences written to {}; staging not configured, migration skipped", diff_path.display()).yellow()
            );
        }
        CompareOutcome::Migrated { diff_path } => {
            println!(
                "{} {}",
                "✔".green().bold(),
                format!("Applied {} to staging and tests passed", diff_path.display()).green()
            );
        }
        CompareOutcome::RolledBack { cause, restored, .. } => {
            let why = match cause {
                RollbackCause::MigrationFailed(detail) => format!("migration failed ({})", detail),
                RollbackCause::TestsFailed => "post-migration tests failed".to_string(),
            };
            eprintln!("{} {}: {}", "✖".red().bold(), "Staging rolled back".red(), why);
            if !restored {
                eprintln!("{} {}", "!".yellow().bold(), "Rollback did not complete; check the log".yellow());
            }
        }
    }

    log::info!("Database Backup Service finished.");
    Ok(if outcome.is_success() { 0 } else { EXIT_FAILURE })
}

/// Continuous-deployment pipeline. Configuration problems are logged and
/// reported through the exit code like every other failure.
pub async fn do_deploy(ctx: &Context, bar: &ProgressBar) -> i32 {
    let plan = match DeployPlan::from_config(&ctx.config) {
        Ok(plan) => plan,
        Err(err) => {
            error!("{}", err);
            return EXIT_FAILURE;
        }
    };

    let client = SqlCmdClient::new(&plan.sqlcmd_path);
    let rollback = RestoreLatestBackup { backup_dir: plan.backup_dir.clone() };
    let worker = DeployWorker::new(Arc::new(client), Box::new(rollback), ctx.cancel.clone());

    let code = worker.run_once(&plan, bar).await;
    bar.finish_and_clear();

    if code == EXIT_SUCCESS {
        println!("{} {}", "✔".green().bold(), "Migration applied to production".green());
    } else {
        eprintln!("{} {}", "✖".red().bold(), "Production deployment failed; see the log".red());
    }
    code
}

pub fn do_backups(config: Option<&AppConfig>, dir: Option<PathBuf>) -> Result<()> {
    let dir = match dir {
        Some(d) => d,
        None => config
            .and_then(|c| non_empty(&c.backup.path))
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("no backup directory: pass --dir or set Backup:Path"))?,
    };

    let backups = storage::list_backups(&dir)?;
    if backups.is_empty() {
        println!("{} {}", "i".yellow().bold(), format!("No backups found in {}", dir.display()).yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Taken (UTC)").add_attribute(Attribute::Bold),
            Cell::new("Size").add_attribute(Attribute::Bold),
            Cell::new("SHA-256").add_attribute(Attribute::Bold),
            Cell::new("Rollback").add_attribute(Attribute::Bold),
        ]);

    // Newest first, so the first row is the one a rollback restores.
    for (i, b) in backups.iter().enumerate() {
        let ts = b
            .taken_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "?".into());
        table.add_row(vec![
            Cell::new(&b.name),
            Cell::new(ts),
            Cell::new(human_size(b.size)),
            Cell::new(short_hash(&b.sha256, 12)),
            Cell::new(if i == 0 { "latest" } else { "" }),
        ]);
    }

    println!("{}", table);
    Ok(())
}

pub fn do_version() {
    println!("{} {}", "dbpipeline".bold(), env!("CARGO_PKG_VERSION").cyan());
}

pub fn create_progress_bar(prefix: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
    );
    bar.set_message(prefix.to_string());
    bar.enable_steady_tick(std::time::Duration::from_millis(80));
    bar
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
