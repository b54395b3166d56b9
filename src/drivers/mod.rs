use async_trait::async_trait;
use std::path::Path;

use crate::connection::ConnectionDescriptor;
use crate::error::Result;

pub mod process;
pub mod sqlcmd;

#[cfg(test)]
pub mod stub;

/// What came back from one external client invocation.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutcome {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Best text to attach to a failure: stderr, else stdout, else the code.
    pub fn diagnostics(&self) -> String {
        let err = self.stderr.trim();
        if !err.is_empty() {
            return err.to_string();
        }
        let out = self.stdout.trim();
        if !out.is_empty() {
            return out.to_string();
        }
        match self.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

#[async_trait]
pub trait DatabaseClient: Send + Sync {
    fn name(&self) -> &'static str;

    /// Full binary backup of `target` written to `destination` on the server host.
    async fn backup(&self, target: &ConnectionDescriptor, destination: &Path) -> Result<ExecutionOutcome>;

    /// Restore `target` from a backup file, replacing the existing database.
    async fn restore(&self, target: &ConnectionDescriptor, source: &Path) -> Result<ExecutionOutcome>;

    /// Execute a script file, optionally redirecting the result set to `output`.
    async fn run_script(
        &self,
        target: &ConnectionDescriptor,
        script: &Path,
        output: Option<&Path>,
    ) -> Result<ExecutionOutcome>;

    /// Execute an inline query with headers suppressed.
    async fn run_query(&self, target: &ConnectionDescriptor, query: &str) -> Result<ExecutionOutcome>;
}
