use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::drivers::ExecutionOutcome;
use crate::error::{PipelineError, Result};

pub mod backup;
pub mod compare;
pub mod migrate;
pub mod orchestrator;
pub mod rollback;
pub mod verify;
pub mod worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    BackupProd,
    BackupDev,
    Compare,
    MigrateStaging,
    TestStaging,
    Rollback,
    ApplyMigration,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::BackupProd => "production backup",
            Stage::BackupDev => "development backup",
            Stage::Compare => "backup comparison",
            Stage::MigrateStaging => "staging migration",
            Stage::TestStaging => "post-migration tests",
            Stage::Rollback => "rollback",
            Stage::ApplyMigration => "production migration",
        };
        f.write_str(name)
    }
}

/// Refuse to start `stage` once cancellation has been requested. A stage
/// already running is left to finish.
pub fn checkpoint(cancel: &CancellationToken, stage: Stage) -> Result<()> {
    if cancel.is_cancelled() {
        log::warn!("cancellation requested; not starting {}", stage);
        return Err(PipelineError::Cancelled(stage));
    }
    Ok(())
}

/// Turn a non-zero exit into a stage failure carrying the client's diagnostics.
pub(crate) fn check(stage: Stage, outcome: ExecutionOutcome) -> Result<ExecutionOutcome> {
    if outcome.success() {
        return Ok(outcome);
    }
    let detail = outcome.diagnostics();
    log::error!("{} failed. Exit code: {:?}, Error: {}", stage, outcome.exit_code, detail);
    Err(PipelineError::stage(stage, detail))
}
