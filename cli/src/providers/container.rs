//! # Devyard Container Provider
//!
//! File: cli/src/providers/container.rs
//!
//! Creates and destroys a single container from a fully-resolved
//! `ContainerConfig`. The runtime identity is `(name, identity)`, where
//! `identity` is `Container` for declared containers and the owning kind when
//! another provider delegates (an ingress proxy is looked up as an `Ingress`).
//!
use crate::common::docker::Client;
use crate::core::error::{DevyardError, Result};
use crate::providers::Provider;
use crate::resources::{ContainerConfig, NetworkAttachment, Resource, ResourceType};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use tracing::{debug, info, warn};

pub struct ContainerProvider<'a> {
    resource: &'a Resource,
    config: &'a ContainerConfig,
    identity: ResourceType,
    client: &'a dyn Client,
    force_pull: bool,
}

impl<'a> ContainerProvider<'a> {
    pub fn new(
        resource: &'a Resource,
        config: &'a ContainerConfig,
        identity: ResourceType,
        client: &'a dyn Client,
        force_pull: bool,
    ) -> Self {
        Self {
            resource,
            config,
            identity,
            client,
            force_pull,
        }
    }

    /// Creates and starts the container with no existence guard and no pull.
    /// For callers that already ran both.
    pub(crate) async fn run_container(&self) -> Result<String> {
        let name = &self.config.name;
        let id = self
            .client
            .create_container(self.identity, self.config)
            .await
            .with_context(|| runtime_operation(name, "create container"))?;
        debug!("Container '{}' created with id {}", name, id);
        Ok(id)
    }
}

#[async_trait]
impl<'a> Provider for ContainerProvider<'a> {
    async fn create(&self) -> Result<Vec<Resource>> {
        let name = &self.config.name;
        info!("Creating {} container '{}'", self.identity, name);

        if !self.lookup().await?.is_empty() {
            return Err(anyhow!(DevyardError::AlreadyExists {
                kind: self.identity,
                name: name.clone(),
            }));
        }

        self.client
            .pull_image(&self.config.image, self.force_pull)
            .await?;

        self.run_container().await?;
        Ok(Vec::new())
    }

    async fn destroy(&self) -> Result<()> {
        let ids = self.lookup().await?;
        remove_containers(self.client, &self.config.name, &ids, &self.config.networks).await
    }

    async fn lookup(&self) -> Result<Vec<String>> {
        self.client
            .find_container_ids(&self.config.name, self.identity)
            .await
            .with_context(|| runtime_operation(&self.config.name, "look up containers"))
    }

    fn config(&self) -> (ResourceType, &Resource) {
        (self.resource.kind(), self.resource)
    }
}

/// Tears down `ids` in two phases per container: detach from every declared
/// network (best-effort, failures are logged), then remove (fail-fast, the
/// first failure is returned and later ids are left alone).
pub(crate) async fn remove_containers(
    client: &dyn Client,
    resource: &str,
    ids: &[String],
    networks: &[NetworkAttachment],
) -> Result<()> {
    if ids.is_empty() {
        debug!("No containers found for '{}', nothing to destroy.", resource);
        return Ok(());
    }

    for id in ids {
        for attachment in networks {
            let network = match attachment.network_name() {
                Ok(network) => network,
                Err(e) => {
                    warn!("Skipping detach of '{}' from '{}': {}", id, attachment.name, e);
                    continue;
                }
            };
            if let Err(e) = client.detach_network(&network, id).await {
                warn!(
                    "Unable to detach '{}' from network '{}', continuing: {:#}",
                    resource, network, e
                );
            }
        }

        info!("Removing container '{}' ({})", resource, id);
        client
            .remove_container(id)
            .await
            .with_context(|| runtime_operation(resource, "remove container"))?;
    }
    Ok(())
}

pub(crate) fn runtime_operation(resource: &str, operation: &str) -> DevyardError {
    DevyardError::RuntimeOperation {
        resource: resource.to_string(),
        operation: operation.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::docker::fake::{Call, FakeClient};
    use crate::core::error::classify;
    use crate::resources::{KeyValue, Spec};

    fn web() -> Resource {
        Resource::new(Spec::Container(ContainerConfig {
            name: "web".into(),
            image: "nginx:latest".into(),
            command: vec!["nginx".into(), "-g".into(), "daemon off;".into()],
            env: vec![KeyValue::new("A", "1"), KeyValue::new("B", "2")],
            networks: vec![
                NetworkAttachment::new("network.local"),
                NetworkAttachment::new("network.backend"),
            ],
            ..Default::default()
        }))
    }

    fn provider<'a>(resource: &'a Resource, client: &'a FakeClient) -> ContainerProvider<'a> {
        let Spec::Container(config) = &resource.spec else {
            panic!("not a container");
        };
        ContainerProvider::new(resource, config, ResourceType::Container, client, false)
    }

    #[tokio::test]
    async fn test_create_checks_pulls_then_creates() {
        let client = FakeClient::new();
        let resource = web();
        let children = provider(&resource, &client).create().await.unwrap();
        assert!(children.is_empty());

        let calls = client.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(&calls[0], Call::FindContainers { name, .. } if name == "web"));
        assert_eq!(
            calls[1],
            Call::PullImage {
                image: "nginx:latest".into(),
                force_pull: false
            }
        );
        match &calls[2] {
            Call::CreateContainer { kind, spec } => {
                assert_eq!(*kind, ResourceType::Container);
                assert_eq!(spec.env[0], KeyValue::new("A", "1"));
                assert_eq!(spec.command.len(), 3);
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_second_create_is_already_exists_without_runtime_calls() {
        let client = FakeClient::new();
        let resource = web();
        let provider = provider(&resource, &client);
        provider.create().await.unwrap();
        let before = client.calls().len();

        let err = provider.create().await.unwrap_err();
        assert!(matches!(
            classify(&err),
            Some(DevyardError::AlreadyExists {
                kind: ResourceType::Container,
                ..
            })
        ));
        // only the existence lookup
        let after = client.calls();
        assert_eq!(after.len(), before + 1);
        assert!(matches!(after.last(), Some(Call::FindContainers { .. })));
    }

    #[tokio::test]
    async fn test_pull_failure_skips_create() {
        let client = FakeClient::new().failing_pull();
        let resource = web();
        let err = provider(&resource, &client).create().await.unwrap_err();
        assert!(matches!(classify(&err), Some(DevyardError::ImagePull { .. })));
        assert!(client.created_containers().is_empty());
    }

    #[tokio::test]
    async fn test_create_failure_is_runtime_operation() {
        let client = FakeClient::new().failing_create("web");
        let resource = web();
        let err = provider(&resource, &client).create().await.unwrap_err();
        assert!(matches!(
            classify(&err),
            Some(DevyardError::RuntimeOperation { .. })
        ));
        assert_eq!(err.to_string(), "Failed to create container for 'web'");
    }

    #[tokio::test]
    async fn test_destroy_nothing_only_looks_up() {
        let client = FakeClient::new();
        let resource = web();
        provider(&resource, &client).destroy().await.unwrap();
        assert_eq!(
            client.calls(),
            [Call::FindContainers {
                name: "web".into(),
                kind: ResourceType::Container
            }]
        );
    }

    #[tokio::test]
    async fn test_destroy_detaches_every_network_despite_failures() {
        let client = FakeClient::new()
            .with_container("web", ResourceType::Container, "abc")
            .failing_detach();
        let resource = web();
        provider(&resource, &client).destroy().await.unwrap();

        let calls = client.calls();
        assert_eq!(
            &calls[1..],
            [
                Call::DetachNetwork {
                    network: "local".into(),
                    id: "abc".into()
                },
                Call::DetachNetwork {
                    network: "backend".into(),
                    id: "abc".into()
                },
                Call::RemoveContainer { id: "abc".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_destroy_stops_at_first_removal_failure() {
        let client = FakeClient::new()
            .with_container("web", ResourceType::Container, "first")
            .with_container("web", ResourceType::Container, "second")
            .failing_remove();
        let resource = web();
        let err = provider(&resource, &client).destroy().await.unwrap_err();
        assert!(matches!(
            classify(&err),
            Some(DevyardError::RuntimeOperation { .. })
        ));

        let calls = client.calls();
        let removals: Vec<&Call> = calls
            .iter()
            .filter(|c| matches!(c, Call::RemoveContainer { .. }))
            .collect();
        assert_eq!(removals, [&Call::RemoveContainer { id: "first".into() }]);
        assert!(!calls
            .iter()
            .any(|c| matches!(c, Call::DetachNetwork { id, .. } if id == "second")));
    }

    #[tokio::test]
    async fn test_lookup_returns_ids() {
        let client = FakeClient::new().with_container("web", ResourceType::Container, "abc");
        let resource = web();
        let provider = provider(&resource, &client);
        assert_eq!(provider.lookup().await.unwrap(), ["abc"]);
        provider.destroy().await.unwrap();
        assert!(provider.lookup().await.unwrap().is_empty());
    }
}
