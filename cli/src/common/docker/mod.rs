//! # Devyard Docker Client Facade
//!
//! File: cli/src/common/docker/mod.rs
//!
//! ## Overview
//!
//! This module is the only place the engine touches the container runtime.
//! Providers depend on the narrow `Client` trait defined here; `DockerClient`
//! implements it on top of the `bollard` crate.
//!
//! ## Architecture
//!
//! - **`connect`**: Establishes the connection to the Docker daemon.
//! - **`images`**: Image existence checks and pulls.
//! - **`containers`**: Container lookup by logical identity, creation (mounts,
//!   ports, environment, network attachment) and removal.
//! - **`networks`**: Network lookup, creation, removal and container detachment.
//!
//! Containers are identified by `(name, type)`. The Docker container is named
//! `<name>.<type>.devyard` and labelled `devyard.resource=<type>.<name>`, and
//! lookups filter on that label. On every network it joins, a container gets
//! the alias `<name>.<network>` so other members can reach it by FQDN.
//!
//! `DockerClient` holds one `bollard::Docker` handle, which is cheap to clone
//! and safe to share between concurrent provider calls.
//!
//! ## Usage
//!
//! ```rust
//! use crate::common::docker::{Client, DockerClient};
//! use std::sync::Arc;
//!
//! let client: Arc<dyn Client> = Arc::new(DockerClient::connect()?);
//! let ids = client.find_container_ids("web", ResourceType::Container).await?;
//! ```
//!

/// Handles establishing a connection to the local Docker daemon.
pub mod connect;
/// Container lookup, creation and removal.
pub mod containers;
/// Image existence checks and pulls.
pub mod images;
/// Network lookup, creation, removal and detachment.
pub mod networks;

#[cfg(test)]
pub mod fake;

use crate::core::error::Result;
use crate::resources::{ContainerConfig, NetworkConfig, ResourceType};
use async_trait::async_trait;
use bollard::Docker;

/// Label key carrying the `<type>.<name>` identity of a managed container or network.
pub const RESOURCE_LABEL: &str = "devyard.resource";

/// Runtime operations consumed by the providers.
///
/// Implementations must be safe to call concurrently; the engine issues
/// independent calls from every resource of a dependency level at once.
#[async_trait]
pub trait Client: Send + Sync {
    /// Ids of the containers carrying the identity `(name, kind)`. Empty when none exist.
    async fn find_container_ids(&self, name: &str, kind: ResourceType) -> Result<Vec<String>>;

    /// Pulls `image` unless it is present locally and `force_pull` is false.
    async fn pull_image(&self, image: &str, force_pull: bool) -> Result<()>;

    /// Creates and starts a container with identity `(spec.name, kind)`. Returns its id.
    async fn create_container(&self, kind: ResourceType, spec: &ContainerConfig)
        -> Result<String>;

    async fn remove_container(&self, id: &str) -> Result<()>;

    async fn detach_network(&self, network: &str, id: &str) -> Result<()>;

    /// Id of the network named `name`, if it exists.
    async fn find_network_id(&self, name: &str) -> Result<Option<String>>;

    async fn create_network(&self, spec: &NetworkConfig) -> Result<String>;

    async fn remove_network(&self, id: &str) -> Result<()>;
}

/// `Client` backed by the local Docker daemon.
#[derive(Clone, Debug)]
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    pub fn connect() -> Result<Self> {
        Ok(Self {
            docker: connect::connect_docker()?,
        })
    }
}

#[async_trait]
impl Client for DockerClient {
    async fn find_container_ids(&self, name: &str, kind: ResourceType) -> Result<Vec<String>> {
        containers::find_container_ids(&self.docker, name, kind).await
    }

    async fn pull_image(&self, image: &str, force_pull: bool) -> Result<()> {
        images::pull_image(&self.docker, image, force_pull).await
    }

    async fn create_container(
        &self,
        kind: ResourceType,
        spec: &ContainerConfig,
    ) -> Result<String> {
        containers::create_container(&self.docker, kind, spec).await
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        containers::remove_container(&self.docker, id).await
    }

    async fn detach_network(&self, network: &str, id: &str) -> Result<()> {
        networks::detach_network(&self.docker, network, id).await
    }

    async fn find_network_id(&self, name: &str) -> Result<Option<String>> {
        networks::find_network_id(&self.docker, name).await
    }

    async fn create_network(&self, spec: &NetworkConfig) -> Result<String> {
        networks::create_network(&self.docker, spec).await
    }

    async fn remove_network(&self, id: &str) -> Result<()> {
        networks::remove_network(&self.docker, id).await
    }
}

/// Docker container name for the identity `(name, kind)`.
pub fn container_name(name: &str, kind: ResourceType) -> String {
    format!("{}.{}.devyard", name, kind)
}

/// Value of `RESOURCE_LABEL` for the identity `(name, kind)`.
pub fn resource_label(name: &str, kind: ResourceType) -> String {
    format!("{}.{}", kind, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_naming() {
        assert_eq!(
            container_name("web", ResourceType::Ingress),
            "web.ingress.devyard"
        );
        assert_eq!(
            resource_label("testing", ResourceType::K8sCluster),
            "k8s_cluster.testing"
        );
    }
}
