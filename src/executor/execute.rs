//! `execute_code_block`: injects a source file into the workspace via
//! put-archive and runs it with the interpreter chosen by its extension.

use std::path::Path;
use std::time::Duration;

use bollard::container::UploadToContainerOptions;
use bollard::Docker;
use tracing::{debug, info};

use super::archive::single_file_archive;
use super::exec::run_exec;
use super::types::{ExecuteCodeBlockParams, ExecuteCodeBlockResult, LogEntry};
use super::{LAST_RUN_FILE, WORKSPACE_PATH};

/// Writes the code into `/workspace` and executes it, returning the
/// structured log the refiner loop consumes.
///
/// The file travels as a tar upload; its content never appears inside a
/// shell command line.
pub(crate) async fn execute_code_block(
    docker: &Docker,
    p: ExecuteCodeBlockParams,
) -> ExecuteCodeBlockResult {
    let filename = base_name(&p.filename);
    if filename.is_empty() {
        return ExecuteCodeBlockResult::err("filename is required");
    }

    let tar = match single_file_archive(&filename, p.code_content.as_bytes()) {
        Ok(tar) => tar,
        Err(e) => return ExecuteCodeBlockResult::err(e.to_string()),
    };
    if let Err(e) = docker
        .upload_to_container(
            &p.container_id,
            Some(UploadToContainerOptions {
                path: WORKSPACE_PATH.to_string(),
                ..Default::default()
            }),
            tar,
        )
        .await
    {
        return ExecuteCodeBlockResult::err(e.to_string());
    }

    let container_path = format!("{WORKSPACE_PATH}/{filename}");
    let cmd = run_command_for_file(&container_path, &filename);
    info!(filename = %filename, "executing code block");

    let output = match run_exec(docker, &p.container_id, cmd, p.timeout_sec).await {
        Ok(output) => output,
        Err(e) => return ExecuteCodeBlockResult::err(e.to_string()),
    };

    let log = LogEntry {
        exit_code: output.exit_code,
        stdout: output.stdout,
        stderr: output.stderr,
        execution_time: format_duration(output.duration),
    };

    // Best effort: a failed write must not mask the execution result.
    if let Err(e) = persist_last_run(docker, &p.container_id, &log).await {
        debug!("failed to persist last-run log: {}", e);
    }

    ExecuteCodeBlockResult::ok(log)
}

fn base_name(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Selects the runner command from the file extension. Unrecognized
/// extensions are handed to `sh -c`; such files must be executable or
/// self-describing.
pub(crate) fn run_command_for_file(container_path: &str, filename: &str) -> Vec<String> {
    let ext = Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "py" => vec!["python".to_string(), container_path.to_string()],
        "js" | "mjs" => vec!["node".to_string(), container_path.to_string()],
        "ts" => vec![
            "npx".to_string(),
            "--yes".to_string(),
            "ts-node".to_string(),
            container_path.to_string(),
        ],
        "sh" => vec!["sh".to_string(), container_path.to_string()],
        _ => vec![
            "sh".to_string(),
            "-c".to_string(),
            container_path.to_string(),
        ],
    }
}

/// Formats a wall duration as seconds to two decimals, e.g. "0.42s".
pub(crate) fn format_duration(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f64())
}

async fn persist_last_run(
    docker: &Docker,
    container_id: &str,
    log: &LogEntry,
) -> anyhow::Result<()> {
    let raw = serde_json::to_vec(log)?;
    let tar = single_file_archive(LAST_RUN_FILE, &raw)?;
    docker
        .upload_to_container(
            container_id,
            Some(UploadToContainerOptions {
                path: WORKSPACE_PATH.to_string(),
                ..Default::default()
            }),
            tar,
        )
        .await?;
    Ok(())
}
