use std::fs;
use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::error::{PipelineError, Result};

pub mod settings;

pub use settings::{AppConfig, DiffStrategyKind};

/// Prefix for environment overrides: `DBPIPELINE__<Section>__<Key>`.
pub const ENV_PREFIX: &str = "DBPIPELINE__";

/// Read the JSON settings file and layer environment overrides on top.
pub fn load_config<I>(path: &Path, env: I) -> Result<AppConfig>
where
    I: IntoIterator<Item = (String, String)>,
{
    if !path.is_file() {
        return Err(PipelineError::config(format!(
            "settings file not found at {}",
            path.display()
        )));
    }
    let content = fs::read_to_string(path)?;
    let mut cfg: AppConfig = serde_json::from_str(&content)
        .map_err(|e| PipelineError::config(format!("{}: {}", path.display(), e)))?;
    apply_env_overrides(&mut cfg, env)?;
    Ok(cfg)
}

pub fn apply_env_overrides<I>(cfg: &mut AppConfig, env: I) -> Result<()>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (name, value) in env {
        let Some(rest) = strip_prefix_ignore_case(&name, ENV_PREFIX) else {
            continue;
        };
        let Some((section, key)) = rest.split_once("__") else {
            continue;
        };
        set_value(cfg, section, key, value)?;
    }
    Ok(())
}

fn strip_prefix_ignore_case<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let head = name.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &name[prefix.len()..])
}

fn set_value(cfg: &mut AppConfig, section: &str, key: &str, value: String) -> Result<()> {
    let section = section.to_ascii_lowercase();
    let key = key.to_ascii_lowercase();
    match (section.as_str(), key.as_str()) {
        ("connectionstrings", "production") => cfg.connection_strings.production = Some(value),
        ("connectionstrings", "development") => cfg.connection_strings.development = Some(value),
        ("connectionstrings", "staging") => cfg.connection_strings.staging = Some(value),
        ("backupsettings", "backupdirectory") => cfg.backup_settings.backup_directory = value,
        ("backupsettings", "prodbackupfile") => cfg.backup_settings.prod_backup_file = value,
        ("backupsettings", "devbackupfile") => cfg.backup_settings.dev_backup_file = value,
        ("backupsettings", "diffscriptfile") => cfg.backup_settings.diff_script_file = value,
        ("backupsettings", "sqlcmdpath") => cfg.backup_settings.sql_cmd_path = value,
        ("backupsettings", "sqlcmdtimeout") => {
            cfg.backup_settings.sql_cmd_timeout = value.trim().parse().map_err(|_| {
                PipelineError::config(format!("BackupSettings:SqlCmdTimeout is not a number: '{}'", value))
            })?;
        }
        ("backupsettings", "diffstrategy") => {
            cfg.backup_settings.diff_strategy = match value.trim().to_ascii_lowercase().as_str() {
                "positional" => DiffStrategyKind::Positional,
                "lcs" => DiffStrategyKind::Lcs,
                other => {
                    return Err(PipelineError::config(format!(
                        "BackupSettings:DiffStrategy must be 'positional' or 'lcs', got '{}'",
                        other
                    )));
                }
            };
        }
        ("migration", "scriptpath") => cfg.migration.script_path = Some(value),
        ("sqlcmd", "path") => cfg.sql_cmd.path = Some(value),
        ("backup", "path") => cfg.backup.path = Some(value),
        ("logging", "directory") => cfg.logging.directory = value,
        ("logging", "level") => cfg.logging.level = value,
        // Unknown keys are left alone; the logger is not installed yet.
        _ => {}
    }
    Ok(())
}

/// `Some(trimmed)` unless the value is missing or blank.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Built once at process entry; read-only afterwards.
pub struct Context {
    pub config: AppConfig,
    pub cancel: CancellationToken,
}

impl Context {
    pub fn new(config: AppConfig) -> Self {
        Self { config, cancel: CancellationToken::new() }
    }
}
