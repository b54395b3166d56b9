use log::{error, info};
use std::path::Path;

use super::{check, Stage};
use crate::connection::ConnectionDescriptor;
use crate::drivers::DatabaseClient;
use crate::error::{PipelineError, Result};

/// Run `script` against `target`. A missing script fails before the client
/// is started.
pub async fn apply_script(
    client: &dyn DatabaseClient,
    target: &ConnectionDescriptor,
    script: &Path,
    stage: Stage,
) -> Result<()> {
    if !script.is_file() {
        error!("Migration script not found at {}", script.display());
        return Err(PipelineError::MissingFile(script.to_path_buf()));
    }

    info!("Applying migration script {} to {}", script.display(), target.server);
    let outcome = check(stage, client.run_script(target, script, None).await?)?;
    info!("Migration executed successfully");
    if !outcome.stdout.trim().is_empty() {
        log::debug!("{} output: {}", stage, outcome.stdout.trim());
    }
    Ok(())
}
