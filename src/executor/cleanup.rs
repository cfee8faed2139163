//! `cleanup_env`: stops and removes a runtime container.

use std::time::Duration;

use bollard::container::{RemoveContainerOptions, StopContainerOptions};
use bollard::Docker;
use tracing::{debug, info};

use super::types::{CleanupEnvParams, CleanupEnvResult};

const CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);
const STOP_GRACE_SECS: i64 = 5;

/// Stops (5-second grace, errors tolerated) and force-removes the container.
/// The whole call is bounded at 30 seconds regardless of the caller context.
pub(crate) async fn cleanup_env(docker: &Docker, p: CleanupEnvParams) -> CleanupEnvResult {
    match tokio::time::timeout(CLEANUP_TIMEOUT, cleanup_inner(docker, &p.container_id)).await {
        Ok(result) => result,
        Err(_) => CleanupEnvResult::err(format!(
            "cleanup timed out after {} seconds",
            CLEANUP_TIMEOUT.as_secs()
        )),
    }
}

async fn cleanup_inner(docker: &Docker, container_id: &str) -> CleanupEnvResult {
    if let Err(e) = docker
        .stop_container(container_id, Some(StopContainerOptions { t: STOP_GRACE_SECS }))
        .await
    {
        // May already be stopped or gone; removal decides the outcome.
        debug!(container_id = %container_id, "stop failed: {}", e);
    }

    if let Err(e) = docker
        .remove_container(
            container_id,
            Some(RemoveContainerOptions {
                force: true,
                ..Default::default()
            }),
        )
        .await
    {
        return CleanupEnvResult::err(e.to_string());
    }

    info!(container_id = %container_id, "runtime environment removed");
    CleanupEnvResult::ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cleanup_missing_container_reports_error() {
        // Removing a container that does not exist must surface the daemon
        // error in the envelope, not panic. Skips when no daemon is running.
        let Ok(docker) = Docker::connect_with_local_defaults() else {
            return;
        };
        if docker.ping().await.is_err() {
            return;
        }
        let result = cleanup_env(
            &docker,
            CleanupEnvParams {
                container_id: "adde-test-nonexistent".to_string(),
            },
        )
        .await;
        assert!(!result.ok);
        assert!(result.error.is_some());
    }
}
