//! Registry auth resolver.
//!
//! Derives pull credentials from `ADDE_*` / `AWS_*` environment variables
//! keyed by the registry host of the image reference. The daemon gateway
//! serializes the resulting credentials as base64-encoded JSON
//! `{username, password, serveraddress}` in the `X-Registry-Auth` header.
//! Absence of credentials for a host yields no auth, never an error.

use anyhow::{Context, Result};
use bollard::auth::DockerCredentials;
use tracing::debug;

/// Docker Hub (index.docker.io). Use for public/private Docker Hub images.
pub(crate) const ENV_DOCKERHUB_USERNAME: &str = "ADDE_DOCKERHUB_USERNAME";
pub(crate) const ENV_DOCKERHUB_PASSWORD: &str = "ADDE_DOCKERHUB_PASSWORD";

/// ECR. Either set `ADDE_ECR_TOKEN` (pre-fetched token) or AWS credentials
/// plus a region.
pub(crate) const ENV_ECR_TOKEN: &str = "ADDE_ECR_TOKEN";
pub(crate) const ENV_ECR_REGISTRY: &str = "ADDE_ECR_REGISTRY";
pub(crate) const ENV_AWS_REGION: &str = "AWS_REGION";

/// Generic registry. The URL must match the registry host in the image ref.
pub(crate) const ENV_REGISTRY_URL: &str = "ADDE_REGISTRY_URL";
pub(crate) const ENV_REGISTRY_USERNAME: &str = "ADDE_REGISTRY_USERNAME";
pub(crate) const ENV_REGISTRY_PASSWORD: &str = "ADDE_REGISTRY_PASSWORD";

const DOCKER_HUB_SERVER_ADDRESS: &str = "https://index.docker.io/v1/";

fn env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Returns the registry host for an image reference.
///
/// The first slash segment is a registry host when it contains a dot or a
/// colon (port); otherwise the reference names a Docker Hub image.
pub(crate) fn registry_host_from_image(image: &str) -> String {
    let image = image.trim();
    if image.is_empty() {
        return String::new();
    }
    let first = image.split('/').next().unwrap_or(image);
    if first.contains('.') || first.contains(':') {
        first.to_string()
    } else {
        "index.docker.io".to_string()
    }
}

/// Returns true if the image reference points at an ECR registry.
pub(crate) fn is_ecr_image(image: &str) -> bool {
    image.contains(".dkr.ecr.") || image.contains("amazonaws.com")
}

/// Extracts the ECR registry host from the image reference, preferring the
/// `ADDE_ECR_REGISTRY` override.
fn ecr_registry_from_image(image: &str) -> String {
    if let Some(reg) = env(ENV_ECR_REGISTRY) {
        return reg;
    }
    match image.find('/') {
        Some(idx) => image[..idx].trim().to_string(),
        None => String::new(),
    }
}

/// Parses the region out of an ECR host, e.g.
/// `123456789.dkr.ecr.us-east-1.amazonaws.com` -> `us-east-1`.
pub(crate) fn region_from_ecr_host(host: &str) -> Option<String> {
    let parts: Vec<&str> = host.split('.').collect();
    parts
        .iter()
        .position(|p| *p == "ecr")
        .and_then(|i| parts.get(i + 1))
        .filter(|_| host.contains(".dkr.ecr."))
        .map(|r| r.to_string())
}

/// Returns the ECR login password: from `ADDE_ECR_TOKEN`, or by invoking the
/// AWS CLI for the given region. No region means no token (not an error).
async fn ecr_token(region: &str) -> Result<Option<String>> {
    if let Some(token) = env(ENV_ECR_TOKEN) {
        return Ok(Some(token));
    }
    if region.is_empty() {
        return Ok(None);
    }
    let output = tokio::process::Command::new("aws")
        .args(["ecr", "get-login-password", "--region", region])
        .output()
        .await
        .context("failed to run aws ecr get-login-password. Is the AWS CLI installed?")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("aws ecr get-login-password failed: {}", stderr.trim());
    }
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Ok(None);
    }
    Ok(Some(token))
}

fn credentials(username: String, password: String, serveraddress: String) -> DockerCredentials {
    DockerCredentials {
        username: Some(username),
        password: Some(password),
        serveraddress: Some(serveraddress),
        ..Default::default()
    }
}

/// Resolves pull credentials for the image reference from the environment.
///
/// Returns `None` when no credentials are configured for the image's
/// registry host; errors only when an external credential source (the AWS
/// CLI) fails.
pub(crate) async fn credentials_for_image(image: &str) -> Result<Option<DockerCredentials>> {
    let image = image.trim();
    if image.is_empty() {
        return Ok(None);
    }
    let host = registry_host_from_image(image);

    if is_ecr_image(image) {
        let registry = ecr_registry_from_image(image);
        if registry.is_empty() {
            return Ok(None);
        }
        let region = env(ENV_AWS_REGION)
            .or_else(|| region_from_ecr_host(&registry))
            .unwrap_or_default();
        let Some(token) = ecr_token(&region).await? else {
            return Ok(None);
        };
        debug!(registry = %registry, "resolved ECR credentials");
        return Ok(Some(credentials("AWS".to_string(), token, registry)));
    }

    if host == "index.docker.io" || host == "docker.io" {
        let (Some(user), Some(pass)) = (env(ENV_DOCKERHUB_USERNAME), env(ENV_DOCKERHUB_PASSWORD))
        else {
            return Ok(None);
        };
        debug!("resolved Docker Hub credentials");
        return Ok(Some(credentials(
            user,
            pass,
            DOCKER_HUB_SERVER_ADDRESS.to_string(),
        )));
    }

    // Generic registry: only applies when the configured URL matches the
    // image's registry host.
    let Some(registry_url) = env(ENV_REGISTRY_URL) else {
        return Ok(None);
    };
    let registry_url = strip_scheme(&registry_url);
    if strip_scheme(&host) != registry_url {
        return Ok(None);
    }
    let (Some(user), Some(pass)) = (env(ENV_REGISTRY_USERNAME), env(ENV_REGISTRY_PASSWORD)) else {
        return Ok(None);
    };
    debug!(host = %host, "resolved generic registry credentials");
    Ok(Some(credentials(user, pass, host)))
}

fn strip_scheme(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_host_docker_hub() {
        assert_eq!(registry_host_from_image("busybox"), "index.docker.io");
        assert_eq!(
            registry_host_from_image("python:3.11-slim"),
            "index.docker.io"
        );
        assert_eq!(registry_host_from_image("library/alpine"), "index.docker.io");
    }

    #[test]
    fn test_registry_host_custom() {
        assert_eq!(
            registry_host_from_image("registry.example.com/app:v1"),
            "registry.example.com"
        );
        assert_eq!(
            registry_host_from_image("localhost:5000/app"),
            "localhost:5000"
        );
        assert_eq!(
            registry_host_from_image("123456789.dkr.ecr.us-east-1.amazonaws.com/myimg:tag"),
            "123456789.dkr.ecr.us-east-1.amazonaws.com"
        );
    }

    #[test]
    fn test_registry_host_empty() {
        assert_eq!(registry_host_from_image(""), "");
        assert_eq!(registry_host_from_image("   "), "");
    }

    #[test]
    fn test_is_ecr_image() {
        assert!(is_ecr_image(
            "123456789.dkr.ecr.us-east-1.amazonaws.com/myimg:tag"
        ));
        assert!(is_ecr_image("something.amazonaws.com/x"));
        assert!(!is_ecr_image("python:3.11-slim"));
        assert!(!is_ecr_image("registry.example.com/app"));
    }

    #[test]
    fn test_region_from_ecr_host() {
        assert_eq!(
            region_from_ecr_host("123456789.dkr.ecr.us-east-1.amazonaws.com"),
            Some("us-east-1".to_string())
        );
        assert_eq!(
            region_from_ecr_host("123456789.dkr.ecr.eu-central-1.amazonaws.com"),
            Some("eu-central-1".to_string())
        );
        assert_eq!(region_from_ecr_host("registry.example.com"), None);
    }

    #[test]
    fn test_strip_scheme() {
        assert_eq!(strip_scheme("https://registry.example.com"), "registry.example.com");
        assert_eq!(strip_scheme("http://registry.example.com"), "registry.example.com");
        assert_eq!(strip_scheme("registry.example.com"), "registry.example.com");
    }

    // Environment-dependent selection lives in a single test so the env
    // mutations cannot race sibling tests on other threads.
    #[tokio::test]
    async fn test_credentials_selection_from_env() {
        // No credentials configured for Docker Hub -> no auth.
        std::env::remove_var(ENV_DOCKERHUB_USERNAME);
        std::env::remove_var(ENV_DOCKERHUB_PASSWORD);
        let auth = credentials_for_image("busybox").await.unwrap();
        assert!(auth.is_none());

        // Docker Hub credentials present.
        std::env::set_var(ENV_DOCKERHUB_USERNAME, "user");
        std::env::set_var(ENV_DOCKERHUB_PASSWORD, "pass");
        let auth = credentials_for_image("busybox").await.unwrap().unwrap();
        assert_eq!(auth.username.as_deref(), Some("user"));
        assert_eq!(auth.password.as_deref(), Some("pass"));
        assert_eq!(
            auth.serveraddress.as_deref(),
            Some("https://index.docker.io/v1/")
        );
        std::env::remove_var(ENV_DOCKERHUB_USERNAME);
        std::env::remove_var(ENV_DOCKERHUB_PASSWORD);

        // Generic registry only matches its configured host.
        std::env::set_var(ENV_REGISTRY_URL, "https://registry.example.com");
        std::env::set_var(ENV_REGISTRY_USERNAME, "bot");
        std::env::set_var(ENV_REGISTRY_PASSWORD, "secret");
        let auth = credentials_for_image("registry.example.com/app:v1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(auth.username.as_deref(), Some("bot"));
        assert_eq!(auth.serveraddress.as_deref(), Some("registry.example.com"));
        let other = credentials_for_image("other.example.com/app:v1")
            .await
            .unwrap();
        assert!(other.is_none());
        std::env::remove_var(ENV_REGISTRY_URL);
        std::env::remove_var(ENV_REGISTRY_USERNAME);
        std::env::remove_var(ENV_REGISTRY_PASSWORD);

        // ECR with a pre-fetched token.
        std::env::set_var(ENV_ECR_TOKEN, "tok123");
        let auth = credentials_for_image("123456789.dkr.ecr.us-east-1.amazonaws.com/myimg:tag")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(auth.username.as_deref(), Some("AWS"));
        assert_eq!(auth.password.as_deref(), Some("tok123"));
        assert_eq!(
            auth.serveraddress.as_deref(),
            Some("123456789.dkr.ecr.us-east-1.amazonaws.com")
        );
        std::env::remove_var(ENV_ECR_TOKEN);
    }
}
