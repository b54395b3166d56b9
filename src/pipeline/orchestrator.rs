use indicatif::ProgressBar;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::backup::export_schema;
use super::compare::{compare_files, DiffResult, DiffStrategy};
use super::migrate::apply_script;
use super::rollback::RollbackStrategy;
use super::verify::Verifier;
use super::{checkpoint, Stage};
use crate::config::{non_empty, AppConfig};
use crate::connection::{lenient_parse, mask_connection_string, ConnectionDescriptor};
use crate::drivers::DatabaseClient;
use crate::error::{PipelineError, Result};
use crate::utils::io::ensure_dir;

/// Inputs of one backup-compare run, resolved from configuration.
#[derive(Debug, Clone)]
pub struct ComparePlan {
    pub production: ConnectionDescriptor,
    pub development: ConnectionDescriptor,
    pub staging: Option<ConnectionDescriptor>,
    pub backup_dir: PathBuf,
    pub prod_backup: PathBuf,
    pub dev_backup: PathBuf,
    pub diff_file: PathBuf,
}

impl ComparePlan {
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let cs = &cfg.connection_strings;
        let (Some(prod), Some(dev)) = (non_empty(&cs.production), non_empty(&cs.development)) else {
            return Err(PipelineError::config("Connection strings are not configured properly"));
        };

        let settings = &cfg.backup_settings;
        let required = [
            ("BackupDirectory", &settings.backup_directory),
            ("ProdBackupFile", &settings.prod_backup_file),
            ("DevBackupFile", &settings.dev_backup_file),
            ("DiffScriptFile", &settings.diff_script_file),
        ];
        if let Some((key, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(PipelineError::config(format!("BackupSettings:{} is not set", key)));
        }

        info!("Production: {}", mask_connection_string(prod));
        info!("Development: {}", mask_connection_string(dev));

        let backup_dir = PathBuf::from(settings.backup_directory.trim());
        Ok(Self {
            production: lenient_parse(prod),
            development: lenient_parse(dev),
            staging: non_empty(&cs.staging).map(lenient_parse),
            prod_backup: backup_dir.join(settings.prod_backup_file.trim()),
            dev_backup: backup_dir.join(settings.dev_backup_file.trim()),
            diff_file: backup_dir.join(settings.diff_script_file.trim()),
            backup_dir,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackCause {
    MigrationFailed(String),
    TestsFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareOutcome {
    NoDifferences,
    /// Differences found but no staging database to try them on.
    StagingSkipped { diff_path: PathBuf },
    Migrated { diff_path: PathBuf },
    RolledBack { diff_path: PathBuf, cause: RollbackCause, restored: bool },
}

impl CompareOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, CompareOutcome::RolledBack { .. })
    }
}

/// Drives backup → compare → migrate → test → rollback. Any stage failure
/// before the staging branch ends the run with an error; nothing is retried.
pub struct Orchestrator {
    client: Arc<dyn DatabaseClient>,
    diff: Box<dyn DiffStrategy>,
    verifier: Box<dyn Verifier>,
    rollback: Box<dyn RollbackStrategy>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn DatabaseClient>,
        diff: Box<dyn DiffStrategy>,
        verifier: Box<dyn Verifier>,
        rollback: Box<dyn RollbackStrategy>,
        cancel: CancellationToken,
    ) -> Self {
        Self { client, diff, verifier, rollback, cancel }
    }

    pub async fn run(&self, plan: &ComparePlan, bar: &ProgressBar) -> Result<CompareOutcome> {
        log::debug!(
            "client: {}, diff: {}, verifier: {}, rollback: {}",
            self.client.name(),
            self.diff.name(),
            self.verifier.name(),
            self.rollback.name()
        );
        ensure_dir(&plan.backup_dir)?;

        self.enter(Stage::BackupProd, bar)?;
        info!("Starting production backup...");
        export_schema(self.client.as_ref(), &plan.production, &plan.prod_backup, Stage::BackupProd).await?;

        self.enter(Stage::BackupDev, bar)?;
        info!("Starting development backup...");
        export_schema(self.client.as_ref(), &plan.development, &plan.dev_backup, Stage::BackupDev).await?;

        self.enter(Stage::Compare, bar)?;
        info!("Comparing backup files...");
        let diff_path = match compare_files(&plan.prod_backup, &plan.dev_backup, &plan.diff_file, self.diff.as_ref())? {
            DiffResult::Identical => {
                info!("No differences detected between databases.");
                return Ok(CompareOutcome::NoDifferences);
            }
            DiffResult::Different { diff_path, changes } => {
                info!("Differences detected! Diff script created ({} changed lines).", changes);
                diff_path
            }
        };

        let Some(staging) = &plan.staging else {
            warn!("Staging connection string not configured. Skipping migration test.");
            return Ok(CompareOutcome::StagingSkipped { diff_path });
        };

        self.enter(Stage::MigrateStaging, bar)?;
        info!("Running migration on staging...");
        if let Err(err) = apply_script(self.client.as_ref(), staging, &diff_path, Stage::MigrateStaging).await {
            error!("Migration failed: {}. Rolling back...", err);
            let restored = self.roll_back(staging, bar).await;
            let cause = RollbackCause::MigrationFailed(err.to_string());
            return Ok(CompareOutcome::RolledBack { diff_path, cause, restored });
        }

        self.enter(Stage::TestStaging, bar)?;
        info!("Migration successful. Running tests...");
        if self.tests_pass(staging).await {
            info!("All tests passed after migration.");
            return Ok(CompareOutcome::Migrated { diff_path });
        }

        warn!("Tests failed after migration. Rolling back...");
        let restored = self.roll_back(staging, bar).await;
        Ok(CompareOutcome::RolledBack { diff_path, cause: RollbackCause::TestsFailed, restored })
    }

    fn enter(&self, stage: Stage, bar: &ProgressBar) -> Result<()> {
        checkpoint(&self.cancel, stage)?;
        bar.set_message(stage.to_string());
        Ok(())
    }

    async fn tests_pass(&self, target: &ConnectionDescriptor) -> bool {
        match self.verifier.verify(self.client.as_ref(), target).await {
            Ok(passed) => passed,
            Err(err) => {
                error!("{} could not run: {}", self.verifier.name(), err);
                false
            }
        }
    }

    // Recovery runs even after cancellation has been requested.
    async fn roll_back(&self, target: &ConnectionDescriptor, bar: &ProgressBar) -> bool {
        bar.set_message(Stage::Rollback.to_string());
        match self.rollback.rollback(self.client.as_ref(), target).await {
            Ok(restored) => restored,
            Err(err) => {
                error!("Error during {} rollback: {}", self.rollback.name(), err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::stub::{Call, RecordingClient};
    use crate::pipeline::compare::PositionalDiff;
    use crate::pipeline::rollback::PlaceholderRollback;
    use crate::pipeline::verify::SmokeTest;
    use std::path::Path;
    use tempfile::TempDir;

    fn config(dir: &Path, staging: Option<&str>) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.connection_strings.production = Some("Server=prod;Database=Sales".into());
        cfg.connection_strings.development = Some("Server=dev;Database=Sales".into());
        cfg.connection_strings.staging = staging.map(str::to_string);
        cfg.backup_settings.backup_directory = dir.join("backups").display().to_string();
        cfg.backup_settings.prod_backup_file = "prod.sql".into();
        cfg.backup_settings.dev_backup_file = "dev.sql".into();
        cfg.backup_settings.diff_script_file = "diff.sql".into();
        cfg
    }

    fn orchestrator(client: Arc<RecordingClient>) -> Orchestrator {
        Orchestrator::new(
            client,
            Box::new(PositionalDiff),
            Box::new(SmokeTest),
            Box::new(PlaceholderRollback),
            CancellationToken::new(),
        )
    }

    fn setup(staging: Option<&str>) -> (TempDir, ComparePlan) {
        let dir = tempfile::tempdir().unwrap();
        let plan = ComparePlan::from_config(&config(dir.path(), staging)).unwrap();
        (dir, plan)
    }

    fn is_rollback(c: &Call) -> bool {
        matches!(c, Call::Query { query, .. } if query == crate::sql::PLACEHOLDER_ROLLBACK)
    }

    #[test]
    fn plan_requires_prod_and_dev_connection_strings() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), None);
        cfg.connection_strings.development = Some("  ".into());
        assert!(matches!(ComparePlan::from_config(&cfg), Err(PipelineError::Config(_))));
    }

    #[test]
    fn plan_uses_lenient_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), Some("Trusted_Connection=True"));
        cfg.connection_strings.production = Some("Database=Sales".into());
        let plan = ComparePlan::from_config(&cfg).unwrap();
        assert_eq!(plan.production.server, "localhost");
        assert_eq!(plan.staging.unwrap().database, "master");
    }

    #[tokio::test]
    async fn identical_backups_end_the_run() {
        let (_dir, plan) = setup(Some("Server=stage"));
        let client = Arc::new(RecordingClient::new().export("prod", "same").export("dev", "same"));

        let outcome = orchestrator(client.clone()).run(&plan, &ProgressBar::hidden()).await.unwrap();

        assert_eq!(outcome, CompareOutcome::NoDifferences);
        assert!(!plan.diff_file.exists());
        assert_eq!(client.calls().len(), 2);
    }

    #[tokio::test]
    async fn differences_without_staging_skip_migration() {
        let (_dir, plan) = setup(None);
        let client = Arc::new(RecordingClient::new().export("prod", "a\nb").export("dev", "a\nc"));

        let outcome = orchestrator(client.clone()).run(&plan, &ProgressBar::hidden()).await.unwrap();

        assert_eq!(outcome, CompareOutcome::StagingSkipped { diff_path: plan.diff_file.clone() });
        assert!(outcome.is_success());
        assert!(plan.diff_file.exists());
        assert_eq!(client.calls().len(), 2, "no migration, test or rollback may run");
    }

    #[tokio::test]
    async fn successful_migration_and_tests() {
        let (_dir, plan) = setup(Some("Server=stage;Database=Sales"));
        let client = Arc::new(RecordingClient::new().export("prod", "a").export("dev", "b"));

        let outcome = orchestrator(client.clone()).run(&plan, &ProgressBar::hidden()).await.unwrap();

        assert_eq!(outcome, CompareOutcome::Migrated { diff_path: plan.diff_file.clone() });
        let calls = client.calls();
        assert_eq!(
            calls[2],
            Call::Script { server: "stage".into(), script: plan.diff_file.clone(), output: None }
        );
        assert!(matches!(&calls[3], Call::Query { server, .. } if server == "stage"));
        assert_eq!(client.count(is_rollback), 0);
    }

    #[tokio::test]
    async fn failed_migration_rolls_back_once() {
        let (_dir, plan) = setup(Some("Server=stage"));
        let client = Arc::new(
            RecordingClient::new()
                .export("prod", "a")
                .export("dev", "b")
                .script_exit("stage", 1),
        );

        let outcome = orchestrator(client.clone()).run(&plan, &ProgressBar::hidden()).await.unwrap();

        assert!(!outcome.is_success());
        assert!(matches!(
            outcome,
            CompareOutcome::RolledBack { cause: RollbackCause::MigrationFailed(_), restored: true, .. }
        ));
        assert_eq!(client.count(is_rollback), 1);
        assert_eq!(client.count(|c| matches!(c, Call::Query { .. })), 1, "tests must not run");
    }

    #[tokio::test]
    async fn failed_tests_roll_back_once() {
        let (_dir, plan) = setup(Some("Server=stage"));
        let client = Arc::new(RecordingClient::new().export("prod", "a").export("dev", "b").query_exit(1));

        let outcome = orchestrator(client.clone()).run(&plan, &ProgressBar::hidden()).await.unwrap();

        assert!(matches!(
            outcome,
            CompareOutcome::RolledBack { cause: RollbackCause::TestsFailed, restored: false, .. }
        ));
        assert_eq!(client.count(is_rollback), 1);
    }

    #[tokio::test]
    async fn failed_prod_backup_short_circuits() {
        let (_dir, plan) = setup(Some("Server=stage"));
        let client = Arc::new(RecordingClient::new().script_exit("prod", 1));

        let err = orchestrator(client.clone()).run(&plan, &ProgressBar::hidden()).await.unwrap_err();

        assert!(matches!(err, PipelineError::StageFailed { stage: Stage::BackupProd, .. }));
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn missing_backup_output_fails_comparison() {
        let (_dir, plan) = setup(Some("Server=stage"));
        // Client exits 0 for dev but writes nothing.
        let client = Arc::new(RecordingClient::new().export("prod", "a"));

        let err = orchestrator(client.clone()).run(&plan, &ProgressBar::hidden()).await.unwrap_err();

        assert!(matches!(err, PipelineError::MissingFile(p) if p == plan.dev_backup));
        assert_eq!(client.calls().len(), 2);
    }

    #[tokio::test]
    async fn cancellation_before_start_runs_nothing() {
        let (_dir, plan) = setup(Some("Server=stage"));
        let client = Arc::new(RecordingClient::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let orch = Orchestrator::new(
            client.clone(),
            Box::new(PositionalDiff),
            Box::new(SmokeTest),
            Box::new(PlaceholderRollback),
            cancel,
        );

        let err = orch.run(&plan, &ProgressBar::hidden()).await.unwrap_err();

        assert!(matches!(err, PipelineError::Cancelled(Stage::BackupProd)));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn cancellation_during_prod_backup_stops_before_dev_backup() {
        let (_dir, plan) = setup(Some("Server=stage"));
        let cancel = CancellationToken::new();
        let client = Arc::new(
            RecordingClient::new()
                .export("prod", "CREATE TABLE [dbo].[A] ([Id] int);")
                .export("dev", "CREATE TABLE [dbo].[A] ([Id] bigint);")
                .cancel_after_script("prod", cancel.clone()),
        );
        let orch = Orchestrator::new(
            client.clone(),
            Box::new(PositionalDiff),
            Box::new(SmokeTest),
            Box::new(PlaceholderRollback),
            cancel,
        );

        let err = orch.run(&plan, &ProgressBar::hidden()).await.unwrap_err();

        assert!(matches!(err, PipelineError::Cancelled(Stage::BackupDev)));
        assert!(plan.prod_backup.is_file());
        assert_eq!(client.count(|c| matches!(c, Call::Script { server, .. } if server == "prod")), 1);
        assert_eq!(client.count(|c| matches!(c, Call::Script { server, .. } if server == "dev")), 0);
        assert_eq!(client.calls().len(), 1);
    }
}
