//! `create_runtime_env`: provisions a container with a workspace mount,
//! resource caps, and optional network and port bindings.

use std::collections::HashMap;

use bollard::container::{Config as ContainerConfig, CreateContainerOptions, RemoveContainerOptions};
use bollard::models::{PortBinding, PortMap};
use bollard::service::HostConfig;
use bollard::Docker;
use tracing::{debug, info, warn};

use super::exec::run_exec;
use super::types::{CreateRuntimeEnvParams, CreateRuntimeEnvResult};
use super::{DEFAULT_MEMORY_LIMIT_BYTES, DEFAULT_NANO_CPUS, WORKSPACE_PATH};

const DEPENDENCY_INSTALL_TIMEOUT_SECS: i64 = 120;

/// Creates and starts a runtime container bound to a fresh host workspace.
///
/// On any failure after the container exists, the container is force-removed
/// before the error is returned.
pub(crate) async fn create_runtime_env(
    docker: &Docker,
    p: CreateRuntimeEnvParams,
) -> CreateRuntimeEnvResult {
    let workspace = match tempfile::Builder::new()
        .prefix("adde-workspace-")
        .tempdir()
    {
        // The workspace outlives this invocation: later tool calls read and
        // write it through the container mount.
        Ok(dir) => dir.keep(),
        Err(e) => {
            return CreateRuntimeEnvResult::err(format!("failed to create workspace dir: {e}"))
        }
    };
    let workspace = workspace.to_string_lossy().into_owned();

    let env: Vec<String> = p
        .env_vars
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();

    let network_mode = if p.network { "default" } else { "none" };

    let mut config = ContainerConfig {
        image: Some(p.image.clone()),
        env: Some(env),
        ..Default::default()
    };
    if !p.use_image_cmd {
        // Keep the container alive so the agent runs code via exec.
        config.cmd = Some(vec!["sleep".to_string(), "86400".to_string()]);
        config.working_dir = Some(WORKSPACE_PATH.to_string());
    }

    let mut host_config = HostConfig {
        binds: Some(vec![format!("{workspace}:{WORKSPACE_PATH}")]),
        network_mode: Some(network_mode.to_string()),
        memory: Some(DEFAULT_MEMORY_LIMIT_BYTES),
        nano_cpus: Some(DEFAULT_NANO_CPUS),
        auto_remove: Some(false),
        ..Default::default()
    };

    if !p.port_bindings.is_empty() {
        let (exposed, bindings) = loopback_port_bindings(&p.port_bindings);
        config.exposed_ports = Some(exposed);
        host_config.port_bindings = Some(bindings);
    }
    config.host_config = Some(host_config);

    let container = match docker
        .create_container(None::<CreateContainerOptions<String>>, config)
        .await
    {
        Ok(resp) => resp,
        Err(e) => return CreateRuntimeEnvResult::err(e.to_string()),
    };
    let container_id = container.id;
    debug!(container_id = %container_id, "container created");

    if let Err(e) = docker.start_container::<String>(&container_id, None).await {
        force_remove(docker, &container_id).await;
        return CreateRuntimeEnvResult::err(e.to_string());
    }
    info!(container_id = %container_id, image = %p.image, "runtime environment started");

    if !p.dependencies.is_empty() {
        if let Err(message) = install_dependencies(docker, &container_id, &p.image, &p.dependencies).await
        {
            force_remove(docker, &container_id).await;
            return CreateRuntimeEnvResult::err(message);
        }
    }

    CreateRuntimeEnvResult::ok(container_id, workspace)
}

/// Builds loopback port bindings from a container_port -> host_port map.
///
/// Entries with an empty or non-numeric host port are dropped; container
/// ports without a protocol suffix default to TCP. Host ports bind to
/// 127.0.0.1 only.
fn loopback_port_bindings(
    requested: &HashMap<String, String>,
) -> (HashMap<String, HashMap<(), ()>>, PortMap) {
    let mut exposed = HashMap::new();
    let mut bindings: PortMap = HashMap::new();

    for (container_port, host_port) in requested {
        let container_port = container_port.trim();
        let host_port = host_port.trim();
        if container_port.is_empty() || host_port.is_empty() {
            continue;
        }
        if host_port.parse::<u32>().is_err() {
            warn!(host_port = %host_port, "skipping port binding with non-numeric host port");
            continue;
        }
        let port_key = if container_port.contains('/') {
            container_port.to_string()
        } else {
            format!("{container_port}/tcp")
        };
        exposed.insert(port_key.clone(), HashMap::new());
        bindings.insert(
            port_key,
            Some(vec![PortBinding {
                host_ip: Some("127.0.0.1".to_string()),
                host_port: Some(host_port.to_string()),
            }]),
        );
    }

    (exposed, bindings)
}

/// Selects the dependency install command from the image reference.
pub(crate) fn install_command_for_image(image: &str, deps: &[String]) -> Vec<String> {
    let lowered = image.to_lowercase();
    if lowered.contains("python") {
        let mut cmd = vec![
            "pip".to_string(),
            "install".to_string(),
            "--no-cache-dir".to_string(),
            "-q".to_string(),
        ];
        cmd.extend(deps.iter().cloned());
        cmd
    } else if lowered.contains("node") {
        let mut cmd = vec!["npm".to_string(), "install".to_string(), "-g".to_string()];
        cmd.extend(deps.iter().cloned());
        cmd
    } else {
        // Best effort for unknown images: install with pip when present,
        // succeed otherwise.
        vec![
            "sh".to_string(),
            "-c".to_string(),
            format!(
                "command -v pip >/dev/null 2>&1 && pip install --no-cache-dir -q {} || true",
                deps.join(" ")
            ),
        ]
    }
}

async fn install_dependencies(
    docker: &Docker,
    container_id: &str,
    image: &str,
    deps: &[String],
) -> Result<(), String> {
    info!(count = deps.len(), "installing dependencies");
    let cmd = install_command_for_image(image, deps);
    // Only transport-level failures (daemon error, timeout) abort creation;
    // the installer's own exit code is not inspected.
    let output = run_exec(docker, container_id, cmd, DEPENDENCY_INSTALL_TIMEOUT_SECS)
        .await
        .map_err(|e| e.to_string())?;
    debug!(exit_code = output.exit_code, "dependency install finished");
    Ok(())
}

async fn force_remove(docker: &Docker, container_id: &str) {
    let _ = docker
        .remove_container(
            container_id,
            Some(RemoveContainerOptions {
                force: true,
                ..Default::default()
            }),
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_command_python_image() {
        let deps = vec!["requests".to_string(), "numpy".to_string()];
        let cmd = install_command_for_image("python:3.11-slim", &deps);
        assert_eq!(
            cmd,
            vec!["pip", "install", "--no-cache-dir", "-q", "requests", "numpy"]
        );
    }

    #[test]
    fn test_install_command_node_image() {
        let deps = vec!["typescript".to_string()];
        let cmd = install_command_for_image("node:20-alpine", &deps);
        assert_eq!(cmd, vec!["npm", "install", "-g", "typescript"]);
    }

    #[test]
    fn test_install_command_is_case_insensitive() {
        let deps = vec!["requests".to_string()];
        let cmd = install_command_for_image("PYTHON:3", &deps);
        assert_eq!(cmd[0], "pip");
    }

    #[test]
    fn test_install_command_unknown_image_is_best_effort() {
        let deps = vec!["requests".to_string()];
        let cmd = install_command_for_image("busybox", &deps);
        assert_eq!(cmd[0], "sh");
        assert_eq!(cmd[1], "-c");
        assert!(cmd[2].contains("command -v pip"));
        assert!(cmd[2].ends_with("|| true"));
    }

    #[test]
    fn test_loopback_port_bindings_defaults_to_tcp() {
        let mut requested = HashMap::new();
        requested.insert("3000".to_string(), "8080".to_string());
        let (exposed, bindings) = loopback_port_bindings(&requested);
        assert!(exposed.contains_key("3000/tcp"));
        let binding = bindings.get("3000/tcp").unwrap().as_ref().unwrap();
        assert_eq!(binding[0].host_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(binding[0].host_port.as_deref(), Some("8080"));
    }

    #[test]
    fn test_loopback_port_bindings_keeps_protocol() {
        let mut requested = HashMap::new();
        requested.insert("53/udp".to_string(), "5353".to_string());
        let (exposed, bindings) = loopback_port_bindings(&requested);
        assert!(exposed.contains_key("53/udp"));
        assert!(bindings.contains_key("53/udp"));
    }

    #[test]
    fn test_loopback_port_bindings_drops_invalid_host_ports() {
        let mut requested = HashMap::new();
        requested.insert("3000".to_string(), "".to_string());
        requested.insert("4000".to_string(), "not-a-port".to_string());
        requested.insert(" 5000 ".to_string(), " 9000 ".to_string());
        let (exposed, bindings) = loopback_port_bindings(&requested);
        assert_eq!(exposed.len(), 1);
        assert!(bindings.contains_key("5000/tcp"));
    }
}
