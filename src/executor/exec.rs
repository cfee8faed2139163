//! Exec runner: runs a command inside a running container and captures
//! stdout and stderr separately.
//!
//! The daemon multiplexes both streams over one hijacked connection with an
//! 8-byte frame header; bollard decodes the framing into `LogOutput` values.
//! The attach rides on the same hijacked connection that starts the exec, so
//! output emitted immediately at process start is not lost.

use std::time::{Duration, Instant};

use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::Docker;
use futures_util::StreamExt;
use tracing::{debug, warn};

use super::error::ExecutorError;
use super::{DEFAULT_EXEC_TIMEOUT_SECS, WORKSPACE_PATH};

/// Captured output of a completed exec.
#[derive(Debug)]
pub(crate) struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
    pub duration: Duration,
}

/// Normalizes a caller-supplied timeout: zero or negative becomes the
/// 30-second default.
pub(crate) fn normalize_timeout(timeout_sec: i64) -> u64 {
    if timeout_sec <= 0 {
        DEFAULT_EXEC_TIMEOUT_SECS as u64
    } else {
        timeout_sec as u64
    }
}

/// Runs `cmd` inside the container with working directory `/workspace` and
/// returns captured output, exit code, and wall duration.
///
/// The timeout bounds the whole exec phase (create, start, stream drain,
/// inspect); on expiry partial output is discarded and a timeout error is
/// returned.
pub(crate) async fn run_exec(
    docker: &Docker,
    container_id: &str,
    cmd: Vec<String>,
    timeout_sec: i64,
) -> Result<ExecOutput, ExecutorError> {
    let timeout = Duration::from_secs(normalize_timeout(timeout_sec));

    tokio::time::timeout(timeout, run_exec_inner(docker, container_id, cmd))
        .await
        .map_err(|_| ExecutorError::timeout(timeout))?
}

async fn run_exec_inner(
    docker: &Docker,
    container_id: &str,
    cmd: Vec<String>,
) -> Result<ExecOutput, ExecutorError> {
    let start = Instant::now();

    let exec = docker
        .create_exec(
            container_id,
            CreateExecOptions {
                cmd: Some(cmd),
                attach_stdout: Some(true),
                attach_stderr: Some(true),
                working_dir: Some(WORKSPACE_PATH.to_string()),
                ..Default::default()
            },
        )
        .await?;

    let mut stdout = String::new();
    let mut stderr = String::new();

    match docker.start_exec(&exec.id, None).await? {
        StartExecResults::Attached { mut output, .. } => loop {
            match output.next().await {
                Some(Ok(bollard::container::LogOutput::StdOut { message })) => {
                    stdout.push_str(&String::from_utf8_lossy(&message));
                }
                Some(Ok(bollard::container::LogOutput::StdErr { message })) => {
                    stderr.push_str(&String::from_utf8_lossy(&message));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("error reading exec output: {}", e);
                    return Err(e.into());
                }
                None => break,
            }
        },
        StartExecResults::Detached => {
            debug!("exec started detached; no output to collect");
        }
    }

    let duration = start.elapsed();

    let inspect = docker.inspect_exec(&exec.id).await?;
    let exit_code = inspect.exit_code.unwrap_or(-1);
    debug!(
        exit_code,
        stdout_len = stdout.len(),
        stderr_len = stderr.len(),
        "exec finished"
    );

    Ok(ExecOutput {
        stdout,
        stderr,
        exit_code,
        duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_timeout_default() {
        assert_eq!(normalize_timeout(0), 30);
        assert_eq!(normalize_timeout(-5), 30);
    }

    #[test]
    fn test_normalize_timeout_passthrough() {
        assert_eq!(normalize_timeout(1), 1);
        assert_eq!(normalize_timeout(120), 120);
    }

    #[tokio::test]
    async fn test_run_exec_without_daemon() {
        // Exercises the error path when the daemon is unreachable or the
        // container does not exist; either way the result is an error, never
        // a panic.
        let Ok(docker) = Docker::connect_with_local_defaults() else {
            return;
        };
        let result = run_exec(
            &docker,
            "nonexistent-container-xyz",
            vec!["true".to_string()],
            5,
        )
        .await;
        assert!(result.is_err());
    }
}
