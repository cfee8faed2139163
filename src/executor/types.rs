//! Tool I/O types.
//!
//! Field names are part of the published contract between the agent and the
//! CLI; optional fields are omitted from the wire (not emitted as `null`) so
//! the JSON shape stays stable across versions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Parameters for `pull_image`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PullImageParams {
    /// Image reference, e.g. "busybox" or "python:3.11-slim".
    pub image: String,
}

/// Result of `pull_image`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct PullImageResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PullImageResult {
    pub(crate) fn ok() -> Self {
        Self { ok: true, error: None }
    }

    pub(crate) fn err(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
        }
    }
}

/// Parameters for `create_runtime_env`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CreateRuntimeEnvParams {
    pub image: String,
    /// Packages installed after container start (pip / npm, chosen by image).
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
    /// true = allow network access; default false (network mode "none").
    #[serde(default)]
    pub network: bool,
    /// container_port -> host_port, e.g. {"3000": "8080"}; bound to loopback.
    #[serde(default)]
    pub port_bindings: HashMap<String, String>,
    /// true = run the image's default CMD (e.g. a server); false = sleep so
    /// the agent drives the container via exec.
    #[serde(default)]
    pub use_image_cmd: bool,
}

/// Result of `create_runtime_env`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateRuntimeEnvResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CreateRuntimeEnvResult {
    pub(crate) fn ok(container_id: String, workspace: String) -> Self {
        Self {
            container_id: Some(container_id),
            workspace: Some(workspace),
            error: None,
        }
    }

    pub(crate) fn err(message: impl Into<String>) -> Self {
        Self {
            container_id: None,
            workspace: None,
            error: Some(message.into()),
        }
    }
}

/// Parameters for `execute_code_block`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ExecuteCodeBlockParams {
    pub container_id: String,
    pub filename: String,
    pub code_content: String,
    /// Execution timeout in seconds; zero or negative normalizes to 30.
    #[serde(default)]
    pub timeout_sec: i64,
}

/// Structured feedback for the refiner agent, persisted after every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct LogEntry {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock duration, seconds to two decimals with a trailing "s".
    pub execution_time: String,
}

/// Result of `execute_code_block`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ExecuteCodeBlockResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<LogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecuteCodeBlockResult {
    pub(crate) fn ok(log: LogEntry) -> Self {
        Self {
            log: Some(log),
            error: None,
        }
    }

    pub(crate) fn err(message: impl Into<String>) -> Self {
        Self {
            log: None,
            error: Some(message.into()),
        }
    }
}

/// Parameters for `get_container_logs`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GetContainerLogsParams {
    pub container_id: String,
    /// Trim stdout/stderr to their last N lines; 0 = no trimming.
    #[serde(default)]
    pub tail_lines: usize,
}

/// Result of `get_container_logs`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct GetContainerLogsResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<LogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GetContainerLogsResult {
    pub(crate) fn ok(log: LogEntry) -> Self {
        Self {
            log: Some(log),
            error: None,
        }
    }

    pub(crate) fn err(message: impl Into<String>) -> Self {
        Self {
            log: None,
            error: Some(message.into()),
        }
    }
}

/// Parameters for `cleanup_env`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CleanupEnvParams {
    pub container_id: String,
}

/// Result of `cleanup_env`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CleanupEnvResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CleanupEnvResult {
    pub(crate) fn ok() -> Self {
        Self { ok: true, error: None }
    }

    pub(crate) fn err(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
        }
    }
}

/// Parameters for `prepare_build_context`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PrepareBuildContextParams {
    /// Relative path -> file content.
    pub files: HashMap<String, String>,
    /// Accepted for contract compatibility; a fresh staging directory is
    /// always created.
    #[serde(default)]
    #[allow(dead_code)]
    pub context_id: String,
}

/// Result of `prepare_build_context`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct PrepareBuildContextResult {
    /// Absolute path to the staged build context directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PrepareBuildContextResult {
    pub(crate) fn ok(context_id: String) -> Self {
        Self {
            context_id: Some(context_id),
            error: None,
        }
    }

    pub(crate) fn err(message: impl Into<String>) -> Self {
        Self {
            context_id: None,
            error: Some(message.into()),
        }
    }
}

/// Parameters for `build_image_from_context`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BuildImageFromContextParams {
    /// Context directory path, as returned by `prepare_build_context`.
    pub context_id: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub build_args: HashMap<String, String>,
}

/// Parameters for `build_image_from_path`. Use when the project already
/// exists on disk (e.g. a cloned repo) with a Dockerfile.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BuildImageFromPathParams {
    pub path: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub build_args: HashMap<String, String>,
}

/// Result of the image build tools (handshake format).
#[derive(Debug, Clone, Serialize)]
pub(crate) struct BuildImageResult {
    /// "success" or "error".
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_log_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_layer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BuildImageResult {
    pub(crate) fn err(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            image_id: None,
            tag: None,
            size_mb: None,
            build_log_summary: None,
            failed_layer: None,
            error: Some(message.into()),
        }
    }

    pub(crate) fn is_err(&self) -> bool {
        self.status == "error" || self.error.is_some()
    }
}

/// Parameters for `list_agent_images`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListAgentImagesParams {
    /// Optional tag prefix filter, e.g. "agent-env:task" or just "task".
    #[serde(default)]
    pub filter_tag: String,
}

/// A single entry returned by `list_agent_images`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AgentImageEntry {
    pub id: String,
    pub tags: Vec<String>,
    pub size_mb: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub created: String,
}

/// Result of `list_agent_images`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ListAgentImagesResult {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<AgentImageEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ListAgentImagesResult {
    pub(crate) fn ok(images: Vec<AgentImageEntry>) -> Self {
        Self { images, error: None }
    }

    pub(crate) fn err(message: impl Into<String>) -> Self {
        Self {
            images: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Parameters for `delete_image`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DeleteImageParams {
    /// Image tag (e.g. "agent-env:task-1") or image id.
    pub image: String,
    /// Force removal even if the image is in use.
    #[serde(default)]
    pub force: bool,
    /// When true, only tags starting with "agent-env:" may be deleted.
    #[serde(default)]
    pub agent_env_only: bool,
}

/// Result of `delete_image`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct DeleteImageResult {
    pub ok: bool,
    /// Removed references, annotated as "Deleted: ..." or "Untagged: ...".
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deleted: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeleteImageResult {
    pub(crate) fn ok(deleted: Vec<String>) -> Self {
        Self {
            ok: true,
            deleted,
            error: None,
        }
    }

    pub(crate) fn err(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            deleted: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Parameters for `prune_build_cache`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PruneBuildCacheParams {
    /// Only prune cache entries older than this many hours; 0 = all unused.
    #[serde(default)]
    pub older_than_hrs: i64,
}

/// Result of `prune_build_cache`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct PruneBuildCacheResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_reclaimed_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PruneBuildCacheResult {
    pub(crate) fn ok(space_reclaimed_mb: f64) -> Self {
        Self {
            space_reclaimed_mb: Some(space_reclaimed_mb),
            error: None,
        }
    }

    pub(crate) fn err(message: impl Into<String>) -> Self {
        Self {
            space_reclaimed_mb: None,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_params_defaults() {
        let p: CreateRuntimeEnvParams = serde_json::from_str(r#"{"image":"busybox"}"#).unwrap();
        assert_eq!(p.image, "busybox");
        assert!(p.dependencies.is_empty());
        assert!(p.env_vars.is_empty());
        assert!(!p.network);
        assert!(p.port_bindings.is_empty());
        assert!(!p.use_image_cmd);
    }

    #[test]
    fn test_execute_params_field_names() {
        let p: ExecuteCodeBlockParams = serde_json::from_str(
            r#"{"container_id":"c1","filename":"t.py","code_content":"print(42)","timeout_sec":15}"#,
        )
        .unwrap();
        assert_eq!(p.container_id, "c1");
        assert_eq!(p.filename, "t.py");
        assert_eq!(p.code_content, "print(42)");
        assert_eq!(p.timeout_sec, 15);
    }

    #[test]
    fn test_success_envelope_omits_error() {
        let json = serde_json::to_string(&PullImageResult::ok()).unwrap();
        assert_eq!(json, r#"{"ok":true}"#);
    }

    #[test]
    fn test_error_envelope_includes_error() {
        let json = serde_json::to_string(&PullImageResult::err("boom")).unwrap();
        assert_eq!(json, r#"{"ok":false,"error":"boom"}"#);
    }

    #[test]
    fn test_log_entry_roundtrip() {
        let entry = LogEntry {
            exit_code: 0,
            stdout: "42\n".to_string(),
            stderr: String::new(),
            execution_time: "0.12s".to_string(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        let back: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.exit_code, 0);
        assert_eq!(back.stdout, "42\n");
        assert_eq!(back.execution_time, "0.12s");
    }

    #[test]
    fn test_build_result_error_detection() {
        let ok = BuildImageResult {
            status: "success".to_string(),
            image_id: Some("sha256:abc".to_string()),
            tag: Some("agent-env:t".to_string()),
            size_mb: Some(12.5),
            build_log_summary: Some("done".to_string()),
            failed_layer: None,
            error: None,
        };
        assert!(!ok.is_err());
        assert!(BuildImageResult::err("build failed").is_err());
    }

    #[test]
    fn test_list_result_omits_empty_images() {
        let json = serde_json::to_string(&ListAgentImagesResult::ok(Vec::new())).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_delete_result_shapes() {
        let r = DeleteImageResult::ok(vec!["Untagged: agent-env:t".to_string()]);
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains(r#""ok":true"#));
        assert!(json.contains("Untagged: agent-env:t"));

        let json = serde_json::to_string(&DeleteImageResult::err("nope")).unwrap();
        assert!(!json.contains("deleted"));
    }
}
