//! `get_container_logs`: reads back the last execution's structured log
//! from the workspace.

use bollard::Docker;

use super::exec::run_exec;
use super::types::{GetContainerLogsParams, GetContainerLogsResult, LogEntry};
use super::LAST_RUN_FILE;

const READ_LOG_TIMEOUT_SECS: i64 = 10;

/// Returns the log written by the most recent `execute_code_block`,
/// optionally trimmed to the last `tail_lines` lines of stdout/stderr.
pub(crate) async fn get_container_logs(
    docker: &Docker,
    p: GetContainerLogsParams,
) -> GetContainerLogsResult {
    let cmd = vec!["cat".to_string(), LAST_RUN_FILE.to_string()];
    let output = match run_exec(docker, &p.container_id, cmd, READ_LOG_TIMEOUT_SECS).await {
        Ok(output) => output,
        Err(e) => return GetContainerLogsResult::err(e.to_string()),
    };

    let raw = output.stdout.trim();
    if raw.is_empty() {
        return GetContainerLogsResult::err(
            "no previous execution log found (run execute_code_block first)",
        );
    }

    let mut log: LogEntry = match serde_json::from_str(raw) {
        Ok(log) => log,
        Err(e) => return GetContainerLogsResult::err(format!("invalid last run data: {e}")),
    };

    if p.tail_lines > 0 {
        log.stdout = tail_lines(&log.stdout, p.tail_lines);
        log.stderr = tail_lines(&log.stderr, p.tail_lines);
    }

    GetContainerLogsResult::ok(log)
}

/// Keeps the last `n` newline-separated lines of `s`; returns `s` unchanged
/// when it has `n` lines or fewer.
pub(crate) fn tail_lines(s: &str, n: usize) -> String {
    let lines: Vec<&str> = s.split('\n').collect();
    if lines.len() <= n {
        return s.to_string();
    }
    lines[lines.len() - n..].join("\n")
}
