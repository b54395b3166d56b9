use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::utils::hash::sha256_file;

pub const PROD_BACKUP_PREFIX: &str = "prod_backup_";
pub const BACKUP_EXTENSION: &str = ".bak";
const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// `<dir>/prod_backup_<yyyyMMddHHmmss>.bak`; the stamp sorts chronologically.
pub fn prod_backup_path(dir: &Path, at: DateTime<Utc>) -> PathBuf {
    dir.join(format!("{}{}{}", PROD_BACKUP_PREFIX, at.format(STAMP_FORMAT), BACKUP_EXTENSION))
}

pub fn is_prod_backup_name(name: &str) -> bool {
    name.starts_with(PROD_BACKUP_PREFIX) && name.ends_with(BACKUP_EXTENSION)
}

/// Decode the UTC timestamp embedded in a backup filename.
pub fn backup_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let stamp = name.strip_prefix(PROD_BACKUP_PREFIX)?.strip_suffix(BACKUP_EXTENSION)?;
    NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn backup_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_str().map(is_prod_backup_name).unwrap_or(false))
        .map(|e| e.into_path())
        .collect()
}

/// The backup a rollback restores: greatest file name among `prod_backup_*.bak`.
pub fn latest_backup(dir: &Path) -> Option<PathBuf> {
    backup_files(dir)
        .into_iter()
        .max_by(|a, b| a.file_name().cmp(&b.file_name()))
}

pub struct BackupEntry {
    pub name: String,
    pub taken_at: Option<DateTime<Utc>>,
    pub size: u64,
    pub sha256: String,
}

/// All production backups in `dir`, newest name first.
pub fn list_backups(dir: &Path) -> Result<Vec<BackupEntry>> {
    let mut files = backup_files(dir);
    files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    let mut out = Vec::with_capacity(files.len());
    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let size = std::fs::metadata(&path)?.len();
        out.push(BackupEntry {
            taken_at: backup_timestamp(&name),
            sha256: sha256_file(&path)?,
            name,
            size,
        });
    }
    Ok(out)
}
