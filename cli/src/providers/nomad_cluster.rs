//! # Devyard Nomad Cluster Provider
//!
//! File: cli/src/providers/nomad_cluster.rs
//!
//! Runs a dev-mode Nomad agent in a privileged container and writes the client
//! config file ingress proxies use to reach it:
//!
//! ```json
//! { "location": "http://<name>.<network>:4646", "node_count": 1 }
//! ```
//!
//! The address uses the cluster's FQDN on its first network, so at least one
//! network is required.
//!
use super::container::{remove_containers, runtime_operation, ContainerProvider};
use super::{with_tag, Context, Provider};
use crate::common::docker::Client;
use crate::common::fs::io::{remove_dir_best_effort, write_string_to_file};
use crate::core::config::Settings;
use crate::core::error::{DevyardError, Result};
use crate::resources::{fqdn, ContainerConfig, NomadClusterConfig, Resource, ResourceType, Spec};
use anyhow::{anyhow, Context as _};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

const API_PORT: u16 = 4646;

/// Contents of the Nomad client config file.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct NomadConfigFile {
    pub location: String,
    pub node_count: u32,
}

pub struct NomadClusterProvider<'a> {
    resource: &'a Resource,
    config: &'a NomadClusterConfig,
    client: &'a dyn Client,
    settings: &'a Settings,
}

impl<'a> NomadClusterProvider<'a> {
    pub fn new(resource: &'a Resource, config: &'a NomadClusterConfig, ctx: Context<'a>) -> Self {
        Self {
            resource,
            config,
            client: ctx.client,
            settings: ctx.settings,
        }
    }

    fn api_location(&self) -> Result<String> {
        let network = self.config.networks.first().ok_or_else(|| {
            anyhow!(DevyardError::Config(format!(
                "nomad_cluster '{}' must join at least one network.",
                self.config.name
            )))
        })?;
        Ok(format!(
            "http://{}:{}",
            fqdn(&self.config.name, &network.network_name()?),
            API_PORT
        ))
    }

    fn agent_container(&self) -> ContainerConfig {
        ContainerConfig {
            name: self.config.name.clone(),
            image: with_tag(&self.settings.images.nomad, self.config.version.as_deref()),
            command: vec![
                "agent".to_string(),
                "-dev".to_string(),
                "-bind=0.0.0.0".to_string(),
            ],
            networks: self.config.networks.clone(),
            privileged: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl<'a> Provider for NomadClusterProvider<'a> {
    async fn create(&self) -> Result<Vec<Resource>> {
        let location = self.api_location()?;
        info!("Creating Nomad cluster '{}'", self.config.name);

        let agent_config = self.agent_container();
        let agent = Resource::new(Spec::Container(agent_config.clone()));
        ContainerProvider::new(
            &agent,
            &agent_config,
            ResourceType::NomadCluster,
            self.client,
            self.settings.force_pull,
        )
        .create()
        .await?;

        let config_file = NomadConfigFile {
            location,
            node_count: 1,
        };
        let content =
            serde_json::to_string_pretty(&config_file).context("Failed to serialize Nomad config")?;
        write_string_to_file(&self.settings.nomad_config_path(&self.config.name), &content)?;
        Ok(vec![agent])
    }

    async fn destroy(&self) -> Result<()> {
        let ids = self.lookup().await?;
        remove_containers(self.client, &self.config.name, &ids, &self.config.networks).await?;
        remove_dir_best_effort(&self.settings.cluster_dir(&self.config.name));
        Ok(())
    }

    async fn lookup(&self) -> Result<Vec<String>> {
        self.client
            .find_container_ids(&self.config.name, ResourceType::NomadCluster)
            .await
            .with_context(|| runtime_operation(&self.config.name, "look up containers"))
    }

    fn config(&self) -> (ResourceType, &Resource) {
        (self.resource.kind(), self.resource)
    }
}
