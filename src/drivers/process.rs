use std::ffi::OsStr;
use std::process::Stdio;

use log::debug;
use tokio::process::Command;

use super::ExecutionOutcome;
use crate::error::{PipelineError, Result};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Run `program` with `args` (no shell), wait for it to exit and capture both
/// streams. There is no deadline: a hung client hangs the caller.
pub async fn invoke<S: AsRef<OsStr>>(program: &OsStr, args: &[S]) -> Result<ExecutionOutcome> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(windows)]
    cmd.creation_flags(CREATE_NO_WINDOW);

    debug!("spawning {}", program.to_string_lossy());

    // `output()` drains stdout and stderr concurrently, so a chatty client
    // cannot block on a full pipe.
    let output = cmd.output().await.map_err(|source| PipelineError::Spawn {
        program: program.to_string_lossy().into_owned(),
        source,
    })?;

    Ok(ExecutionOutcome {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let outcome = invoke(OsStr::new("sh"), &["-c", "echo hello; echo oops >&2; exit 3"])
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, Some(3));
        assert!(!outcome.success());
        assert_eq!(outcome.stdout.trim(), "hello");
        assert_eq!(outcome.stderr.trim(), "oops");
        assert_eq!(outcome.diagnostics(), "oops");
    }

    #[tokio::test]
    async fn zero_exit_is_success() {
        let outcome = invoke(OsStr::new("true"), &[] as &[&str]).await.unwrap();
        assert!(outcome.success());
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let err = invoke(OsStr::new("/nonexistent/sqlcmd-binary"), &["-?"]).await.unwrap_err();
        assert!(matches!(err, PipelineError::Spawn { .. }));
    }
}
