//! Child process execution with a hard timeout

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

/// Captured result of a finished child process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Run `program` with `args`, feeding `stdin` when given. The child is killed
/// if it outlives `limit`.
pub async fn run(
    program: &Path,
    args: &[String],
    stdin: Option<&str>,
    limit: Duration,
) -> Result<CommandOutput, ProcessError> {
    let program_name = program.display().to_string();
    debug!(program = %program_name, ?args, "Running command");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .kill_on_drop(true);

    let spawn_error = |source: std::io::Error| ProcessError::Spawn {
        program: program_name.clone(),
        source,
    };

    let execution = async {
        let mut child = cmd.spawn().map_err(spawn_error)?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await.map_err(spawn_error)?;
            // closing the pipe signals end of input
            drop(pipe);
        }

        child.wait_with_output().await.map_err(spawn_error)
    };

    let output = timeout(limit, execution)
        .await
        .map_err(|_| ProcessError::Timeout {
            program: program_name.clone(),
            timeout: limit,
        })??;

    Ok(CommandOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
