//! Image management: `list_agent_images`, `delete_image`,
//! `prune_build_cache`.
//!
//! The `agent-env:` tag prefix separates agent-built images from user-pulled
//! ones; listing only ever reports agent images and deletion can be gated to
//! them.

use std::collections::HashMap;

use bollard::image::{ListImagesOptions, PruneBuildCacheOptions, RemoveImageOptions};
use bollard::Docker;
use chrono::{TimeZone, Utc};
use tracing::info;

use super::types::{
    AgentImageEntry, DeleteImageParams, DeleteImageResult, ListAgentImagesParams,
    ListAgentImagesResult, PruneBuildCacheParams, PruneBuildCacheResult,
};
use super::AGENT_IMAGE_TAG_PREFIX;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Normalizes a caller filter into a full tag prefix: a bare suffix (no
/// colon) gains the `agent-env:` prefix.
pub(crate) fn normalize_filter_tag(filter_tag: &str) -> String {
    let filter = filter_tag.trim();
    if filter.is_empty() {
        return AGENT_IMAGE_TAG_PREFIX.to_string();
    }
    if filter.contains(':') {
        filter.to_string()
    } else {
        format!("{AGENT_IMAGE_TAG_PREFIX}{filter}")
    }
}

/// Lists images carrying the agent tag convention, optionally narrowed by a
/// tag prefix.
pub(crate) async fn list_agent_images(
    docker: &Docker,
    p: ListAgentImagesParams,
) -> ListAgentImagesResult {
    let list = match docker
        .list_images(None::<ListImagesOptions<String>>)
        .await
    {
        Ok(list) => list,
        Err(e) => return ListAgentImagesResult::err(e.to_string()),
    };

    let filter_prefix = normalize_filter_tag(&p.filter_tag);

    let mut images = Vec::new();
    for image in list {
        let matching_tags: Vec<String> = image
            .repo_tags
            .iter()
            .filter(|tag| {
                tag.starts_with(AGENT_IMAGE_TAG_PREFIX) && tag.starts_with(&filter_prefix)
            })
            .cloned()
            .collect();
        if matching_tags.is_empty() {
            continue;
        }
        let created = if image.created > 0 {
            Utc.timestamp_opt(image.created, 0)
                .single()
                .map(|t| t.to_rfc3339())
                .unwrap_or_default()
        } else {
            String::new()
        };
        images.push(AgentImageEntry {
            id: image.id,
            tags: matching_tags,
            size_mb: image.size as f64 / BYTES_PER_MIB,
            created,
        });
    }

    ListAgentImagesResult::ok(images)
}

/// Removes an image by tag or id. With `agent_env_only`, refuses tags that
/// do not carry the agent prefix.
pub(crate) async fn delete_image(docker: &Docker, p: DeleteImageParams) -> DeleteImageResult {
    let image = p.image.trim();
    if image.is_empty() {
        return DeleteImageResult::err("image is required");
    }
    if p.agent_env_only && !image.starts_with(AGENT_IMAGE_TAG_PREFIX) {
        return DeleteImageResult::err(format!(
            "refusing to delete {image:?}: not an {AGENT_IMAGE_TAG_PREFIX} image (agent_env_only is set)"
        ));
    }

    let removed = match docker
        .remove_image(
            image,
            Some(RemoveImageOptions {
                force: p.force,
                noprune: true,
            }),
            None,
        )
        .await
    {
        Ok(removed) => removed,
        Err(e) => return DeleteImageResult::err(e.to_string()),
    };

    let mut deleted = Vec::new();
    for item in removed {
        if let Some(ref id) = item.deleted {
            deleted.push(format!("Deleted: {id}"));
        }
        if let Some(ref tag) = item.untagged {
            deleted.push(format!("Untagged: {tag}"));
        }
    }
    info!(image = %image, refs = deleted.len(), "image removed");
    DeleteImageResult::ok(deleted)
}

/// Prunes unused build cache, optionally limited to entries older than the
/// given number of hours. Returns the reclaimed space in MiB.
pub(crate) async fn prune_build_cache(
    docker: &Docker,
    p: PruneBuildCacheParams,
) -> PruneBuildCacheResult {
    let mut filters = HashMap::new();
    if p.older_than_hrs > 0 {
        filters.insert("until".to_string(), vec![format!("{}h", p.older_than_hrs)]);
    }

    let report = match docker
        .prune_build_cache(Some(PruneBuildCacheOptions {
            filters,
            ..Default::default()
        }))
        .await
    {
        Ok(report) => report,
        Err(e) => return PruneBuildCacheResult::err(e.to_string()),
    };

    let reclaimed = report.space_reclaimed.unwrap_or(0) as f64 / BYTES_PER_MIB;
    info!(reclaimed_mb = reclaimed, "build cache pruned");
    PruneBuildCacheResult::ok(reclaimed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_filter_tag_empty_is_agent_prefix() {
        assert_eq!(normalize_filter_tag(""), "agent-env:");
        assert_eq!(normalize_filter_tag("   "), "agent-env:");
    }

    #[test]
    fn test_normalize_filter_tag_bare_suffix_gains_prefix() {
        assert_eq!(normalize_filter_tag("task"), "agent-env:task");
    }

    #[test]
    fn test_normalize_filter_tag_with_colon_kept_verbatim() {
        assert_eq!(normalize_filter_tag("agent-env:task"), "agent-env:task");
        assert_eq!(normalize_filter_tag("other:tag"), "other:tag");
    }

    #[tokio::test]
    async fn test_delete_image_requires_reference() {
        let Ok(docker) = Docker::connect_with_local_defaults() else {
            return;
        };
        let result = delete_image(
            &docker,
            DeleteImageParams {
                image: "  ".to_string(),
                force: false,
                agent_env_only: false,
            },
        )
        .await;
        assert!(!result.ok);
        assert_eq!(result.error.as_deref(), Some("image is required"));
    }

    #[tokio::test]
    async fn test_delete_image_gating_rejects_non_agent_tags() {
        // The gate fires before any daemon call, so no daemon is needed.
        let Ok(docker) = Docker::connect_with_local_defaults() else {
            return;
        };
        let result = delete_image(
            &docker,
            DeleteImageParams {
                image: "python:3.11-slim".to_string(),
                force: false,
                agent_env_only: true,
            },
        )
        .await;
        assert!(!result.ok);
        let error = result.error.unwrap();
        assert!(error.contains("agent_env_only"));
        assert!(error.contains("python:3.11-slim"));
    }
}
