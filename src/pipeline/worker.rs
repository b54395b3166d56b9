use chrono::Utc;
use indicatif::ProgressBar;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::backup::full_backup;
use super::migrate::apply_script;
use super::rollback::RollbackStrategy;
use super::{checkpoint, Stage};
use crate::config::{non_empty, AppConfig};
use crate::connection::{mask_connection_string, strict_parse, ConnectionDescriptor};
use crate::drivers::DatabaseClient;
use crate::error::{PipelineError, Result};

/// Exit code before a run has decided anything.
pub const EXIT_DEFAULT: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
/// Non-standard success sentinel read by the deployment scheduler. Callers
/// must treat any other non-zero code as failure.
pub const EXIT_SUCCESS: i32 = 200;

/// Inputs of one production deployment, resolved from configuration.
#[derive(Debug, Clone)]
pub struct DeployPlan {
    pub production: ConnectionDescriptor,
    pub script: PathBuf,
    pub sqlcmd_path: PathBuf,
    pub backup_dir: PathBuf,
}

impl DeployPlan {
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let prod = non_empty(&cfg.connection_strings.production);
        let script = non_empty(&cfg.migration.script_path);
        let sqlcmd = non_empty(&cfg.sql_cmd.path);
        let backup = non_empty(&cfg.backup.path);

        let (Some(prod), Some(script), Some(sqlcmd), Some(backup)) = (prod, script, sqlcmd, backup) else {
            return Err(PipelineError::config("Missing configuration settings. Aborting CD process."));
        };

        info!("Production: {}", mask_connection_string(prod));
        Ok(Self {
            production: strict_parse(prod)?,
            script: PathBuf::from(script),
            sqlcmd_path: PathBuf::from(sqlcmd),
            backup_dir: PathBuf::from(backup),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    Applied { backup: PathBuf },
    RolledBack { backup: PathBuf, reason: String, restored: bool },
}

impl DeployOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployOutcome::Applied { .. } => EXIT_SUCCESS,
            DeployOutcome::RolledBack { .. } => EXIT_FAILURE,
        }
    }
}

/// Backup → apply migration → restore on failure, against production.
/// Runs once per invocation.
pub struct DeployWorker {
    client: Arc<dyn DatabaseClient>,
    rollback: Box<dyn RollbackStrategy>,
    cancel: CancellationToken,
}

impl DeployWorker {
    pub fn new(client: Arc<dyn DatabaseClient>, rollback: Box<dyn RollbackStrategy>, cancel: CancellationToken) -> Self {
        Self { client, rollback, cancel }
    }

    /// Run the deployment and map the result to a process exit code.
    pub async fn run_once(&self, plan: &DeployPlan, bar: &ProgressBar) -> i32 {
        info!("Starting CD process to deploy migration script to production at {}", Utc::now());
        match self.execute(plan, bar).await {
            Ok(outcome) => {
                match &outcome {
                    DeployOutcome::Applied { backup } => {
                        info!("Pre-migration backup kept at {}", backup.display());
                    }
                    DeployOutcome::RolledBack { reason, restored, .. } => {
                        error!("Deployment rolled back after: {} (restore succeeded: {})", reason, restored);
                    }
                }
                outcome.exit_code()
            }
            Err(err) => {
                error!("An error occurred during the CD process. Aborting. {}", err);
                EXIT_FAILURE
            }
        }
    }

    pub async fn execute(&self, plan: &DeployPlan, bar: &ProgressBar) -> Result<DeployOutcome> {
        let client = self.client.as_ref();
        log::debug!("client: {}, rollback: {}", client.name(), self.rollback.name());

        checkpoint(&self.cancel, Stage::BackupProd)?;
        bar.set_message(Stage::BackupProd.to_string());
        let backup = full_backup(client, &plan.production, &plan.backup_dir, Utc::now()).await?;

        checkpoint(&self.cancel, Stage::ApplyMigration)?;
        bar.set_message(Stage::ApplyMigration.to_string());
        let Err(err) = apply_script(client, &plan.production, &plan.script, Stage::ApplyMigration).await else {
            info!("Migration script applied successfully to production.");
            return Ok(DeployOutcome::Applied { backup });
        };

        error!("Failed to apply migration script to production. Initiating rollback.");
        bar.set_message(Stage::Rollback.to_string());
        let restored = match self.rollback.rollback(client, &plan.production).await {
            Ok(restored) => restored,
            Err(rollback_err) => {
                error!("Rollback failed: {}", rollback_err);
                false
            }
        };
        Ok(DeployOutcome::RolledBack { backup, reason: err.to_string(), restored })
    }
}
