//! # Devyard Docker Image Operations
//!
//! File: cli/src/common/docker/images.rs
//!
//! ## Overview
//!
//! Image presence checks and pulls. `pull_image` is the only image operation
//! the providers need: it skips the registry when the image is already present
//! (unless forced) and otherwise streams the `create_image` progress until the
//! daemon reports completion or an error.
//!
//! Pull failures carry `DevyardError::ImagePull` as context so callers can tell
//! them apart from container creation failures.
//!
use crate::core::error::{DevyardError, Result};
use anyhow::{anyhow, Context};
use bollard::{image::CreateImageOptions, models::CreateImageInfo, Docker};
use futures_util::stream::StreamExt;
use tracing::{debug, error, info, instrument};

/// Checks if a Docker image exists locally by name or ID.
///
/// # Errors
///
/// * `DevyardError::DockerApi` - For errors other than 404 Not Found.
#[instrument(skip(docker))]
pub async fn image_exists(docker: &Docker, image: &str) -> Result<bool> {
    match docker.inspect_image(image).await {
        Ok(_) => {
            debug!("Image '{}' found locally.", image);
            Ok(true)
        }
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        }) => {
            debug!("Image '{}' not found locally.", image);
            Ok(false)
        }
        Err(e) => {
            error!("Error during existence check for image '{}': {:?}", image, e);
            Err(anyhow!(DevyardError::DockerApi { source: e }))
                .with_context(|| format!("Failed to check existence for image '{}'", image))
        }
    }
}

/// Pulls `image` from its registry.
///
/// When `force_pull` is false and the image is already present, no registry
/// call is made.
///
/// # Errors
///
/// Any failure, including the existence check, carries `DevyardError::ImagePull`.
#[instrument(skip(docker))]
pub async fn pull_image(docker: &Docker, image: &str, force_pull: bool) -> Result<()> {
    let pull_context = || DevyardError::ImagePull {
        image: image.to_string(),
    };

    if !force_pull && image_exists(docker, image).await.with_context(pull_context)? {
        debug!("Skipping pull, '{}' is already present.", image);
        return Ok(());
    }

    info!("Pulling image '{}'...", image);
    let options = Some(CreateImageOptions {
        from_image: image,
        ..Default::default()
    });
    let mut stream = docker.create_image(options, None, None);

    while let Some(progress) = stream.next().await {
        match progress {
            Ok(CreateImageInfo {
                error: Some(message),
                ..
            }) => {
                error!("Pull of '{}' reported an error: {}", image, message);
                return Err(anyhow!(DevyardError::Docker(message))).with_context(pull_context);
            }
            Ok(CreateImageInfo {
                status: Some(status),
                progress,
                ..
            }) => {
                debug!("{}: {} {}", image, status, progress.unwrap_or_default());
            }
            Ok(_) => {}
            Err(e) => {
                return Err(anyhow!(DevyardError::DockerApi { source: e }))
                    .with_context(pull_context);
            }
        }
    }

    info!("Image '{}' pulled successfully.", image);
    Ok(())
}
