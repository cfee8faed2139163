//! Tool operations for sandboxed code execution over a local Docker daemon.
//!
//! Each submodule implements one or more stateless tool operations. Operations
//! never return `Err`: every failure is folded into the result envelope so the
//! CLI can map it to an exit code and the calling agent can read it as JSON.

pub(crate) mod archive;
pub(crate) mod build;
pub(crate) mod cleanup;
pub(crate) mod context;
pub(crate) mod create;
pub(crate) mod error;
pub(crate) mod exec;
pub(crate) mod execute;
pub(crate) mod images;
pub(crate) mod logs;
pub(crate) mod pull;
pub(crate) mod registry_auth;
pub(crate) mod types;

use bollard::Docker;

use error::ExecutorError;

/// Path mounted as the workspace inside every runtime container.
pub(crate) const WORKSPACE_PATH: &str = "/workspace";

/// Default hard timeout for code execution, in seconds.
pub(crate) const DEFAULT_EXEC_TIMEOUT_SECS: i64 = 30;

/// Default memory cap for runtime containers (512 MiB).
pub(crate) const DEFAULT_MEMORY_LIMIT_BYTES: i64 = 512 * 1024 * 1024;

/// Default CPU cap for runtime containers (0.5 vCPU; 1 vCPU = 1e9 nano-CPUs).
pub(crate) const DEFAULT_NANO_CPUS: i64 = 500_000_000;

/// Well-known file in the workspace holding the last execution log.
pub(crate) const LAST_RUN_FILE: &str = ".adde_last_run.json";

/// Required tag prefix for agent-built images.
pub(crate) const AGENT_IMAGE_TAG_PREFIX: &str = "agent-env:";

/// Connects to the local Docker daemon.
///
/// The handle does not dial the socket until the first API call, so tools
/// that validate their input before touching the daemon can still fail with
/// their own error rather than a connection error.
pub(crate) fn connect() -> Result<Docker, ExecutorError> {
    Docker::connect_with_local_defaults()
        .map_err(|e| ExecutorError::daemon_unavailable(e.to_string()))
}
