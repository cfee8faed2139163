//! `build_image_from_context` / `build_image_from_path`: build an image from
//! a context directory under the agent tag convention.
//!
//! The Dockerfile is screened for patterns that would reach the host daemon
//! socket or request privileged execution before any bytes are sent to the
//! daemon.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use bollard::image::BuildImageOptions;
use bollard::models::BuildInfo;
use bollard::Docker;
use futures_util::StreamExt;
use regex::Regex;
use tracing::{debug, info};

use super::archive::directory_archive;
use super::types::{BuildImageFromContextParams, BuildImageFromPathParams, BuildImageResult};
use super::AGENT_IMAGE_TAG_PREFIX;

const BUILD_TIMEOUT: Duration = Duration::from_secs(15 * 60);

static FORBIDDEN_DOCKERFILE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)/var/run/docker\.sock",
        r"(?i)-v\s+\S*docker\.sock",
        r"(?i)--mount[^\n]*docker\.sock",
        r"(?i)privileged\s*true",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("constant pattern is valid"))
    .collect()
});

/// Rejects Dockerfiles referencing the daemon socket or privileged mode.
///
/// The error is deliberately generic: the tool reports the class of
/// violation, not which pattern matched.
pub(crate) fn validate_dockerfile(content: &str) -> Result<(), String> {
    for pattern in FORBIDDEN_DOCKERFILE_PATTERNS.iter() {
        if pattern.is_match(content) {
            return Err(
                "Dockerfile contains forbidden pattern (e.g. docker.sock mount or privileged): \
                 security check failed"
                    .to_string(),
            );
        }
    }
    Ok(())
}

/// Resolves the image tag: trims, synthesizes `agent-env:build-<unix>` when
/// empty, and prepends the agent prefix when missing.
pub(crate) fn resolve_tag(tag: &str) -> String {
    let tag = tag.trim();
    if tag.is_empty() {
        return format!(
            "{AGENT_IMAGE_TAG_PREFIX}build-{}",
            chrono::Utc::now().timestamp()
        );
    }
    if tag.starts_with(AGENT_IMAGE_TAG_PREFIX) {
        tag.to_string()
    } else {
        format!("{AGENT_IMAGE_TAG_PREFIX}{tag}")
    }
}

/// Folds build progress events into the summary and error the handshake
/// result reports.
///
/// The summary contract is line-based: callers receive the raw JSON line
/// text of the relevant event, not an extracted message. The gateway hands
/// us decoded events, so each one is re-serialized into its line form
/// (optional fields are omitted, matching what the daemon emits).
#[derive(Debug, Default)]
pub(crate) struct BuildEvents {
    last_stream_line: Option<String>,
    error_line: Option<String>,
    lines: usize,
}

impl BuildEvents {
    pub(crate) fn observe(&mut self, info: &BuildInfo) {
        self.lines += 1;
        let Ok(line) = serde_json::to_string(info) else {
            return;
        };
        if info.stream.is_some() {
            self.last_stream_line = Some(line.clone());
        }
        if info.error.is_some() || info.error_detail.is_some() {
            self.error_line = Some(line);
        }
    }

    /// The raw line of the error event, if any error was seen.
    pub(crate) fn error_line(&self) -> Option<&str> {
        self.error_line.as_deref()
    }

    /// The raw line of the last stream event, or a line-count fallback.
    pub(crate) fn summary(&self) -> String {
        match &self.last_stream_line {
            Some(line) => line.clone(),
            None => format!("Build completed. {} lines of output.", self.lines),
        }
    }
}

/// Builds an image from a previously prepared context directory.
pub(crate) async fn build_image_from_context(
    docker: &Docker,
    p: BuildImageFromContextParams,
) -> BuildImageResult {
    if p.context_id.trim().is_empty() {
        return BuildImageResult::err("context_id is required");
    }
    build_from_dir(docker, Path::new(p.context_id.trim()), &p.tag, p.build_args).await
}

/// Builds an image from an existing directory on disk (e.g. a cloned repo)
/// containing a Dockerfile.
pub(crate) async fn build_image_from_path(
    docker: &Docker,
    p: BuildImageFromPathParams,
) -> BuildImageResult {
    if p.path.trim().is_empty() {
        return BuildImageResult::err("path is required");
    }
    build_from_dir(docker, Path::new(p.path.trim()), &p.tag, p.build_args).await
}

async fn build_from_dir(
    docker: &Docker,
    dir: &Path,
    tag: &str,
    build_args: HashMap<String, String>,
) -> BuildImageResult {
    if !dir.is_dir() {
        return BuildImageResult::err(format!(
            "context is not a valid directory: {}",
            dir.display()
        ));
    }

    let dockerfile = match std::fs::read_to_string(dir.join("Dockerfile")) {
        Ok(content) => content,
        Err(e) => return BuildImageResult::err(format!("Dockerfile not found or unreadable: {e}")),
    };
    if let Err(message) = validate_dockerfile(&dockerfile) {
        return BuildImageResult::err(message);
    }

    let tar = match directory_archive(dir) {
        Ok(tar) => tar,
        Err(e) => return BuildImageResult::err(format!("failed to create build context: {e}")),
    };

    let tag = resolve_tag(tag);
    info!(tag = %tag, context = %dir.display(), "building image");

    let options = BuildImageOptions {
        dockerfile: "Dockerfile".to_string(),
        t: tag.clone(),
        rm: true,
        buildargs: build_args,
        ..Default::default()
    };

    let mut events = BuildEvents::default();
    let drain = async {
        let mut stream = docker.build_image(options, None, Some(tar));
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(info) => {
                    if let Some(line) = &info.stream {
                        debug!(line = %line.trim_end(), "build output");
                    }
                    events.observe(&info);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    };
    match tokio::time::timeout(BUILD_TIMEOUT, drain).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return BuildImageResult::err(e.to_string()),
        Err(_) => {
            return BuildImageResult::err(format!(
                "build timed out after {} minutes",
                BUILD_TIMEOUT.as_secs() / 60
            ))
        }
    }

    if let Some(line) = events.error_line() {
        let line = line.trim().to_string();
        return BuildImageResult {
            status: "error".to_string(),
            image_id: None,
            tag: None,
            size_mb: None,
            build_log_summary: Some(line.clone()),
            failed_layer: Some(line.clone()),
            error: Some(format!("build failed: {line}")),
        };
    }

    let (image_id, size_mb) = inspect_built_image(docker, &tag).await;
    BuildImageResult {
        status: "success".to_string(),
        image_id: Some(image_id),
        tag: Some(tag),
        size_mb: Some(size_mb),
        build_log_summary: Some(events.summary()),
        failed_layer: None,
        error: None,
    }
}

/// Reads the built image's id and size in MiB; inspect failures degrade to
/// empty values rather than failing a build that already succeeded.
async fn inspect_built_image(docker: &Docker, tag: &str) -> (String, f64) {
    match docker.inspect_image(tag).await {
        Ok(inspect) => {
            let id = inspect.id.unwrap_or_default();
            let size_mb = inspect
                .size
                .filter(|s| *s > 0)
                .map(|s| s as f64 / (1024.0 * 1024.0))
                .unwrap_or(0.0);
            (id, size_mb)
        }
        Err(_) => (String::new(), 0.0),
    }
}
