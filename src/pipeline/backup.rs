use chrono::{DateTime, Utc};
use log::info;
use std::path::{Path, PathBuf};

use super::{check, Stage};
use crate::connection::ConnectionDescriptor;
use crate::drivers::DatabaseClient;
use crate::error::Result;
use crate::sql;
use crate::storage;
use crate::utils::io::{ensure_dir, ensure_parent_dir, temp_script};

/// Export `target`'s table definitions as approximate `CREATE TABLE`
/// statements into `destination`. This is a schema snapshot for diffing, not a
/// restorable backup.
pub async fn export_schema(
    client: &dyn DatabaseClient,
    target: &ConnectionDescriptor,
    destination: &Path,
    stage: Stage,
) -> Result<()> {
    info!("Starting database backup to {}", destination.display());
    ensure_parent_dir(destination)?;

    let script = temp_script(&sql::schema_export(&target.database))?;
    let outcome = client.run_script(target, script.path(), Some(destination)).await;
    // The script is deleted before the outcome is judged, on success and failure alike.
    drop(script);

    check(stage, outcome?)?;
    info!("Database backup completed successfully: {}", destination.display());
    Ok(())
}

/// Full binary backup of `target` into `dir`, named with the UTC time `at`.
pub async fn full_backup(
    client: &dyn DatabaseClient,
    target: &ConnectionDescriptor,
    dir: &Path,
    at: DateTime<Utc>,
) -> Result<PathBuf> {
    ensure_dir(dir)?;
    let path = storage::prod_backup_path(dir, at);
    info!("Backing up production database to {}", path.display());

    let outcome = client.backup(target, &path).await?;
    check(Stage::BackupProd, outcome)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::stub::{Call, RecordingClient};
    use crate::error::PipelineError;
    use chrono::TimeZone;

    fn target(server: &str) -> ConnectionDescriptor {
        ConnectionDescriptor { server: server.into(), database: "Sales".into() }
    }

    #[tokio::test]
    async fn export_creates_missing_destination_directory_first() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("backups").join("prod.sql");
        let client = RecordingClient::new().export("prod", "CREATE TABLE [dbo].[A] ([Id] int NOT NULL);");

        export_schema(&client, &target("prod"), &dest, Stage::BackupProd).await.unwrap();

        assert!(dest.parent().unwrap().is_dir());
        assert!(std::fs::read_to_string(&dest).unwrap().contains("CREATE TABLE"));
    }

    #[tokio::test]
    async fn export_removes_its_temporary_script() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("dev.sql");
        let client = RecordingClient::new().script_exit("dev", 1);

        let err = export_schema(&client, &target("dev"), &dest, Stage::BackupDev).await.unwrap_err();
        assert!(matches!(err, PipelineError::StageFailed { stage: Stage::BackupDev, .. }));

        let calls = client.calls();
        let Call::Script { script, output, .. } = &calls[0] else { panic!("expected a script run") };
        assert_eq!(output.as_deref(), Some(dest.as_path()));
        assert!(!script.exists());
    }

    #[tokio::test]
    async fn full_backup_names_file_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let backups = dir.path().join("bak");
        let client = RecordingClient::new();
        let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();

        let path = full_backup(&client, &target("prod"), &backups, at).await.unwrap();

        assert_eq!(path, backups.join("prod_backup_20240506070809.bak"));
        assert_eq!(client.count(|c| matches!(c, Call::Backup { .. })), 1);
    }

    #[tokio::test]
    async fn failed_full_backup_is_a_stage_failure() {
        let dir = tempfile::tempdir().unwrap();
        let client = RecordingClient::new().backup_exit(2);
        let err = full_backup(&client, &target("prod"), dir.path(), Utc::now()).await.unwrap_err();
        assert!(matches!(err, PipelineError::StageFailed { stage: Stage::BackupProd, .. }));
    }
}
