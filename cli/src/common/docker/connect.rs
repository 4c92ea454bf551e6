//! # Devyard Docker Connection Helper
//!
//! File: cli/src/common/docker/connect.rs
//!
//! ## Overview
//!
//! A single function, `connect_docker`, that connects to the local Docker
//! daemon using the defaults of the `bollard` crate (`DOCKER_HOST`, or the
//! platform socket). `DockerClient::connect` calls it once and shares the
//! handle between all provider calls.
//!
use crate::core::error::{DevyardError, Result};
use anyhow::{anyhow, Context};
use bollard::Docker;
use tracing::instrument;

/// Establishes a connection to the local Docker daemon using default settings.
///
/// # Errors
///
/// Returns an `Err` wrapping `DevyardError::DockerApi` if the connection fails.
#[instrument]
pub fn connect_docker() -> Result<Docker> {
    Docker::connect_with_local_defaults()
        .map_err(|e| anyhow!(DevyardError::DockerApi { source: e }))
        .context("Failed to connect to Docker daemon. Is it running and accessible?")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Requires a running Docker daemon. Run locally with `cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn test_connect_docker_success() {
        let docker = connect_docker().expect("Should connect if Docker is running");
        assert!(docker.ping().await.is_ok());
    }
}
