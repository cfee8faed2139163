//! `pull_image`: pulls an image from its registry, resolving credentials
//! from the environment.

use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures_util::StreamExt;
use tracing::{debug, info};

use super::registry_auth;
use super::types::{PullImageParams, PullImageResult};

/// Pulls the given image. The progress stream is fully drained so the pull
/// is complete (not merely started) when this returns.
pub(crate) async fn pull_image(docker: &Docker, p: PullImageParams) -> PullImageResult {
    let image = p.image.trim().to_string();
    if image.is_empty() {
        return PullImageResult::err("image name is required");
    }

    let credentials = match registry_auth::credentials_for_image(&image).await {
        Ok(c) => c,
        Err(e) => return PullImageResult::err(e.to_string()),
    };

    info!(image = %image, "pulling image");
    let mut stream = docker.create_image(
        Some(CreateImageOptions {
            from_image: image.clone(),
            ..Default::default()
        }),
        None,
        credentials,
    );

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(progress) => {
                if let Some(error) = progress.error {
                    return PullImageResult::err(error);
                }
                if let Some(status) = progress.status {
                    debug!(image = %image, status = %status, "pull progress");
                }
            }
            Err(e) => return PullImageResult::err(e.to_string()),
        }
    }

    PullImageResult::ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pull_image_rejects_empty_reference() {
        let Ok(docker) = Docker::connect_with_local_defaults() else {
            return;
        };
        let result = pull_image(
            &docker,
            PullImageParams {
                image: "   ".to_string(),
            },
        )
        .await;
        assert!(!result.ok);
        assert_eq!(result.error.as_deref(), Some("image name is required"));
    }
}
