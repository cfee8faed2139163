//! `prepare_build_context`: stages caller-supplied files into a temporary
//! directory suitable as a Docker build context.
//!
//! When no Dockerfile is supplied but a recognized dependency manifest is,
//! a standard template Dockerfile is injected; a default `.dockerignore`
//! is written unless the caller provided one.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use super::types::{PrepareBuildContextParams, PrepareBuildContextResult};

const DEFAULT_DOCKERIGNORE: &str = ".git
.gitignore
*.md
.env
.venv
__pycache__
node_modules
*.pyc
.DS_Store
*.log
";

const PYTHON_DOCKERFILE: &str = "FROM python:3-alpine
WORKDIR /app
COPY requirements.txt .
RUN pip install --no-cache-dir -r requirements.txt
COPY . .
";

const NODE_DOCKERFILE: &str = "FROM node:20-alpine
WORKDIR /app
COPY package.json .
RUN npm install
COPY . .
";

const ALPINE_DOCKERFILE: &str = "FROM alpine:latest
WORKDIR /app
COPY . .
";

/// Stages the file map into a fresh `adde-build-*` directory and returns its
/// absolute path as the context id. The staging directory is removed again
/// on any filesystem failure.
pub(crate) fn prepare_build_context(p: PrepareBuildContextParams) -> PrepareBuildContextResult {
    if p.files.is_empty() {
        return PrepareBuildContextResult::err("files map is required and must not be empty");
    }

    let staging = match tempfile::Builder::new().prefix("adde-build-").tempdir() {
        Ok(dir) => dir,
        Err(e) => return PrepareBuildContextResult::err(format!("failed to create temp dir: {e}")),
    };

    match stage_files(staging.path(), &p.files) {
        Ok(()) => {
            // Persist the context for the subsequent build call; the TempDir
            // guard would otherwise delete it on drop.
            let dir = staging.keep();
            let context_id = dir.to_string_lossy().into_owned();
            info!(context_id = %context_id, "build context prepared");
            PrepareBuildContextResult::ok(context_id)
        }
        Err(e) => PrepareBuildContextResult::err(e.to_string()),
    }
}

fn stage_files(dir: &Path, files: &HashMap<String, String>) -> anyhow::Result<()> {
    let mut has_dockerfile = false;
    let mut has_requirements_txt = false;
    let mut has_package_json = false;
    for name in files.keys() {
        match Path::new(name).file_name().map(|n| n.to_string_lossy()) {
            Some(base) if base == "Dockerfile" || base.starts_with("Dockerfile.") => {
                has_dockerfile = true;
            }
            Some(base) if base == "requirements.txt" => has_requirements_txt = true,
            Some(base) if base == "package.json" => has_package_json = true,
            _ => {}
        }
    }

    for (path, content) in files {
        let Some(rel) = sanitize_rel_path(path) else {
            warn!(path = %path, "skipping path traversal entry");
            continue;
        };
        let full = dir.join(&rel);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| anyhow::anyhow!("failed to create dir for {path:?}: {e}"))?;
        }
        fs::write(&full, content).map_err(|e| anyhow::anyhow!("failed to write {path:?}: {e}"))?;
    }

    if !files.contains_key(".dockerignore") {
        fs::write(dir.join(".dockerignore"), DEFAULT_DOCKERIGNORE)
            .map_err(|e| anyhow::anyhow!("failed to write .dockerignore: {e}"))?;
    }

    if !has_dockerfile && (has_requirements_txt || has_package_json) {
        let dockerfile = standard_dockerfile(has_requirements_txt, has_package_json);
        debug!("injecting standard Dockerfile template");
        fs::write(dir.join("Dockerfile"), dockerfile)
            .map_err(|e| anyhow::anyhow!("failed to write generated Dockerfile: {e}"))?;
    }

    Ok(())
}

/// Normalizes a caller path to a safe relative path inside the staging
/// directory. Returns `None` for entries that would escape it.
fn sanitize_rel_path(path: &str) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::ParentDir => {
                if !clean.pop() {
                    return None;
                }
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    if clean.as_os_str().is_empty() {
        return None;
    }
    Some(clean)
}

/// Picks the template Dockerfile: Python preferred when both manifests are
/// present, then Node, then a minimal Alpine base.
fn standard_dockerfile(python: bool, node: bool) -> &'static str {
    if python {
        PYTHON_DOCKERFILE
    } else if node {
        NODE_DOCKERFILE
    } else {
        ALPINE_DOCKERFILE
    }
}
