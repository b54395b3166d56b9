use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{process, DatabaseClient, ExecutionOutcome};
use crate::connection::ConnectionDescriptor;
use crate::error::Result;

/// `DatabaseClient` backed by the `sqlcmd` command-line tool.
pub struct SqlCmdClient {
    path: PathBuf,
    trusted: bool,
    query_timeout: Option<u32>,
}

impl SqlCmdClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), trusted: false, query_timeout: None }
    }

    /// Authenticate with the caller's Windows identity (`-E`).
    pub fn trusted(mut self, trusted: bool) -> Self {
        self.trusted = trusted;
        self
    }

    /// Query timeout in seconds passed to the client (`-t`); zero disables it.
    pub fn query_timeout(mut self, secs: u32) -> Self {
        self.query_timeout = (secs > 0).then_some(secs);
        self
    }

    fn base_args(&self, target: &ConnectionDescriptor) -> Vec<String> {
        let mut args = vec!["-S".to_string(), target.server.clone()];
        if self.trusted {
            args.push("-E".into());
        }
        if let Some(secs) = self.query_timeout {
            args.push("-t".into());
            args.push(secs.to_string());
        }
        args
    }

    pub(crate) fn script_args(
        &self,
        target: &ConnectionDescriptor,
        script: &Path,
        output: Option<&Path>,
    ) -> Vec<String> {
        let mut args = self.base_args(target);
        args.push("-i".into());
        args.push(script.display().to_string());
        if let Some(out) = output {
            args.push("-o".into());
            args.push(out.display().to_string());
        }
        args.push("-W".into());
        args
    }

    pub(crate) fn query_args(&self, target: &ConnectionDescriptor, query: &str) -> Vec<String> {
        let mut args = self.base_args(target);
        args.extend(["-h".into(), "-1".into(), "-Q".into(), query.to_string(), "-W".into()]);
        args
    }

    async fn exec(&self, args: Vec<String>) -> Result<ExecutionOutcome> {
        process::invoke(self.path.as_os_str(), &args).await
    }
}

#[async_trait]
impl DatabaseClient for SqlCmdClient {
    fn name(&self) -> &'static str { "sqlcmd" }

    async fn backup(&self, target: &ConnectionDescriptor, destination: &Path) -> Result<ExecutionOutcome> {
        let sql = backup_statement(&target.database, destination);
        self.exec(self.query_args(target, &sql)).await
    }

    async fn restore(&self, target: &ConnectionDescriptor, source: &Path) -> Result<ExecutionOutcome> {
        let sql = restore_statement(&target.database, source);
        self.exec(self.query_args(target, &sql)).await
    }

    async fn run_script(
        &self,
        target: &ConnectionDescriptor,
        script: &Path,
        output: Option<&Path>,
    ) -> Result<ExecutionOutcome> {
        self.exec(self.script_args(target, script, output)).await
    }

    async fn run_query(&self, target: &ConnectionDescriptor, query: &str) -> Result<ExecutionOutcome> {
        self.exec(self.query_args(target, query)).await
    }
}

pub fn backup_statement(database: &str, destination: &Path) -> String {
    format!(
        "BACKUP DATABASE {} TO DISK = N'{}'",
        quote_ident(database),
        quote_literal(&destination.display().to_string())
    )
}

pub fn restore_statement(database: &str, source: &Path) -> String {
    format!(
        "RESTORE DATABASE {} FROM DISK = N'{}' WITH REPLACE",
        quote_ident(database),
        quote_literal(&source.display().to_string())
    )
}

/// `[name]` with embedded `]` doubled.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

pub fn quote_literal(value: &str) -> String {
    value.replace('\'', "''")
}
