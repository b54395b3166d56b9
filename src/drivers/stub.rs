use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::{DatabaseClient, ExecutionOutcome};
use crate::connection::ConnectionDescriptor;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Backup { server: String, destination: PathBuf },
    Restore { server: String, source: PathBuf },
    Script { server: String, script: PathBuf, output: Option<PathBuf> },
    Query { server: String, query: String },
}

/// Scripted client for deterministic flow tests. Script runs with an output
/// path write the server's configured text there, the way a schema export does.
#[derive(Default)]
pub struct RecordingClient {
    pub calls: Mutex<Vec<Call>>,
    exports: HashMap<String, String>,
    backup_code: i32,
    restore_code: i32,
    script_codes: HashMap<String, i32>,
    query_code: i32,
    cancel_after_script: Option<(String, CancellationToken)>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn export(mut self, server: &str, content: &str) -> Self {
        self.exports.insert(server.to_string(), content.to_string());
        self
    }

    pub fn backup_exit(mut self, code: i32) -> Self {
        self.backup_code = code;
        self
    }

    pub fn restore_exit(mut self, code: i32) -> Self {
        self.restore_code = code;
        self
    }

    /// Exit code for script runs against `server`; other servers succeed.
    pub fn script_exit(mut self, server: &str, code: i32) -> Self {
        self.script_codes.insert(server.to_string(), code);
        self
    }

    /// Cancel `token` once a script run against `server` has finished, as a
    /// ctrl-c arriving mid-stage would.
    pub fn cancel_after_script(mut self, server: &str, token: CancellationToken) -> Self {
        self.cancel_after_script = Some((server.to_string(), token));
        self
    }

    pub fn query_exit(mut self, code: i32) -> Self {
        self.query_code = code;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn outcome(code: i32) -> ExecutionOutcome {
        ExecutionOutcome {
            exit_code: Some(code),
            stdout: String::new(),
            stderr: if code == 0 { String::new() } else { format!("stub failure {}", code) },
        }
    }
}

#[async_trait]
impl DatabaseClient for RecordingClient {
    fn name(&self) -> &'static str { "stub" }

    async fn backup(&self, target: &ConnectionDescriptor, destination: &Path) -> Result<ExecutionOutcome> {
        self.record(Call::Backup { server: target.server.clone(), destination: destination.to_path_buf() });
        if self.backup_code == 0 {
            std::fs::write(destination, b"backup")?;
        }
        Ok(Self::outcome(self.backup_code))
    }

    async fn restore(&self, target: &ConnectionDescriptor, source: &Path) -> Result<ExecutionOutcome> {
        self.record(Call::Restore { server: target.server.clone(), source: source.to_path_buf() });
        Ok(Self::outcome(self.restore_code))
    }

    async fn run_script(
        &self,
        target: &ConnectionDescriptor,
        script: &Path,
        output: Option<&Path>,
    ) -> Result<ExecutionOutcome> {
        self.record(Call::Script {
            server: target.server.clone(),
            script: script.to_path_buf(),
            output: output.map(Path::to_path_buf),
        });
        let code = self.script_codes.get(&target.server).copied().unwrap_or(0);
        if let (Some(out), Some(text), 0) = (output, self.exports.get(&target.server), code) {
            std::fs::write(out, text)?;
        }
        if let Some((server, token)) = &self.cancel_after_script {
            if *server == target.server {
                token.cancel();
            }
        }
        Ok(Self::outcome(code))
    }

    async fn run_query(&self, target: &ConnectionDescriptor, query: &str) -> Result<ExecutionOutcome> {
        self.record(Call::Query { server: target.server.clone(), query: query.to_string() });
        Ok(Self::outcome(self.query_code))
    }
}
