use async_trait::async_trait;
use log::{error, info};

use crate::connection::ConnectionDescriptor;
use crate::drivers::DatabaseClient;
use crate::error::Result;
use crate::sql;

/// Post-migration check against the migrated database.
#[async_trait]
pub trait Verifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(false)` means the checks ran and failed; `Err` means they could not run.
    async fn verify(&self, client: &dyn DatabaseClient, target: &ConnectionDescriptor) -> Result<bool>;
}

/// Counts tables and views. Passes whenever the client exits with 0; the
/// counts are logged, not checked.
pub struct SmokeTest;

#[async_trait]
impl Verifier for SmokeTest {
    fn name(&self) -> &'static str { "smoke-test" }

    async fn verify(&self, client: &dyn DatabaseClient, target: &ConnectionDescriptor) -> Result<bool> {
        info!("Running post-migration tests");
        let outcome = client.run_query(target, &sql::smoke_test(&target.database)).await?;
        if outcome.success() {
            info!("Post-migration tests passed. Output: {}", outcome.stdout.trim());
            Ok(true)
        } else {
            error!("Post-migration tests failed. Error: {}", outcome.diagnostics());
            Ok(false)
        }
    }
}
