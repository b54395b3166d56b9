use async_trait::async_trait;
use log::{error, info, warn};
use std::path::PathBuf;

use crate::connection::ConnectionDescriptor;
use crate::drivers::DatabaseClient;
use crate::error::Result;
use crate::sql;
use crate::storage;

/// Recovery after a failed migration or failed verification. Runs once and
/// is never retried.
#[async_trait]
pub trait RollbackStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(true)` when the recovery command succeeded.
    async fn rollback(&self, client: &dyn DatabaseClient, target: &ConnectionDescriptor) -> Result<bool>;
}

/// Staging rollback stub: prints a message on the server and restores nothing.
pub struct PlaceholderRollback;

#[async_trait]
impl RollbackStrategy for PlaceholderRollback {
    fn name(&self) -> &'static str { "placeholder" }

    async fn rollback(&self, client: &dyn DatabaseClient, target: &ConnectionDescriptor) -> Result<bool> {
        info!("Starting rollback process");
        warn!("Staging rollback is a placeholder: no data on {} is restored", target.server);
        let outcome = client.run_query(target, sql::PLACEHOLDER_ROLLBACK).await?;
        if !outcome.success() {
            error!("Rollback script failed: {}", outcome.diagnostics());
            return Ok(false);
        }
        info!("Rollback process completed");
        Ok(true)
    }
}

/// Restores the newest `prod_backup_*.bak` in `backup_dir` over the target.
pub struct RestoreLatestBackup {
    pub backup_dir: PathBuf,
}

#[async_trait]
impl RollbackStrategy for RestoreLatestBackup {
    fn name(&self) -> &'static str { "restore-latest" }

    async fn rollback(&self, client: &dyn DatabaseClient, target: &ConnectionDescriptor) -> Result<bool> {
        info!(
            "Initiating rollback by restoring production database from {}",
            self.backup_dir.display()
        );
        let Some(latest) = storage::latest_backup(&self.backup_dir) else {
            error!("No backup file found for rollback.");
            return Ok(false);
        };

        let outcome = client.restore(target, &latest).await?;
        if outcome.success() {
            info!("Rollback executed successfully from {}", latest.display());
            Ok(true)
        } else {
            error!("Rollback failed. Error: {}", outcome.diagnostics());
            Ok(false)
        }
    }
}
