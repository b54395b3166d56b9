use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// dbpipeline: backup, compare, migrate and roll back SQL Server databases
#[derive(Parser, Debug)]
#[command(name = "dbpipeline", version, about = "Back up, diff and migrate SQL Server databases through sqlcmd.", long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Settings file (appsettings.json layout)
    #[arg(short = 'c', long = "config", default_value = "appsettings.json", global = true)]
    pub config: PathBuf,

    /// Log to file only and show a progress spinner instead of console logs
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Back up production and development, diff them, and trial the diff on staging
    Compare,

    /// Back up production, apply the migration script, restore on failure (exits 200 on success)
    Deploy,

    /// List production backups available for rollback
    Backups {
        /// Backup directory (defaults to Backup:Path from the settings file)
        #[arg(short = 'd', long = "dir")]
        dir: Option<PathBuf>,
    },

    /// Print CLI version
    Version,
}

impl Commands {
    /// Name used for the log file of a pipeline run.
    pub fn pipeline_name(&self) -> &'static str {
        match self {
            Commands::Compare => "backup-compare",
            Commands::Deploy => "cd-prod-deploy",
            Commands::Backups { .. } => "backups",
            Commands::Version => "version",
        }
    }
}
