use serde::{Deserialize, Serialize};

/// Mirror of the `appsettings.json` layout. Every key is optional on disk;
/// callers decide which ones they require.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AppConfig {
    pub connection_strings: ConnectionStrings,
    pub backup_settings: BackupSettings,
    pub migration: MigrationSettings,
    pub sql_cmd: SqlCmdSettings,
    pub backup: BackupPathSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ConnectionStrings {
    pub production: Option<String>,
    pub development: Option<String>,
    pub staging: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BackupSettings {
    pub backup_directory: String,
    pub prod_backup_file: String,
    pub dev_backup_file: String,
    pub diff_script_file: String,
    pub sql_cmd_path: String,
    /// Seconds; handed to the client as its query timeout.
    pub sql_cmd_timeout: u32,
    pub diff_strategy: DiffStrategyKind,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            backup_directory: String::new(),
            prod_backup_file: String::new(),
            dev_backup_file: String::new(),
            diff_script_file: String::new(),
            sql_cmd_path: "sqlcmd".into(),
            sql_cmd_timeout: 300,
            diff_strategy: DiffStrategyKind::Positional,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStrategyKind {
    #[default]
    Positional,
    Lcs,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MigrationSettings {
    pub script_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SqlCmdSettings {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BackupPathSettings {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoggingSettings {
    pub directory: String,
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { directory: "logs".into(), level: "info".into() }
    }
}
