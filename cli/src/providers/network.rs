//! # Devyard Network Provider
//!
//! File: cli/src/providers/network.rs
//!
//! Bridge networks that containers, clusters and ingresses join. Member
//! resources answer to `<name>.<network>` on them.
//!
use super::container::runtime_operation;
use super::{Context, Provider};
use crate::common::docker::Client;
use crate::core::error::{DevyardError, Result};
use crate::resources::{NetworkConfig, Resource, ResourceType};
use anyhow::{anyhow, Context as _};
use async_trait::async_trait;
use tracing::{debug, info};

pub struct NetworkProvider<'a> {
    resource: &'a Resource,
    config: &'a NetworkConfig,
    client: &'a dyn Client,
}

impl<'a> NetworkProvider<'a> {
    pub fn new(resource: &'a Resource, config: &'a NetworkConfig, ctx: Context<'a>) -> Self {
        Self {
            resource,
            config,
            client: ctx.client,
        }
    }

    async fn find(&self) -> Result<Option<String>> {
        self.client
            .find_network_id(&self.config.name)
            .await
            .with_context(|| runtime_operation(&self.config.name, "look up network"))
    }
}

#[async_trait]
impl<'a> Provider for NetworkProvider<'a> {
    async fn create(&self) -> Result<Vec<Resource>> {
        info!("Creating network '{}'", self.config.name);
        if self.find().await?.is_some() {
            return Err(anyhow!(DevyardError::AlreadyExists {
                kind: ResourceType::Network,
                name: self.config.name.clone(),
            }));
        }
        let id = self
            .client
            .create_network(self.config)
            .await
            .with_context(|| runtime_operation(&self.config.name, "create network"))?;
        debug!("Network '{}' created with id {}", self.config.name, id);
        Ok(Vec::new())
    }

    async fn destroy(&self) -> Result<()> {
        let Some(id) = self.find().await? else {
            debug!("Network '{}' not found, nothing to destroy.", self.config.name);
            return Ok(());
        };
        info!("Removing network '{}' ({})", self.config.name, id);
        self.client
            .remove_network(&id)
            .await
            .with_context(|| runtime_operation(&self.config.name, "remove network"))
    }

    async fn lookup(&self) -> Result<Vec<String>> {
        Ok(self.find().await?.into_iter().collect())
    }

    fn config(&self) -> (ResourceType, &Resource) {
        (self.resource.kind(), self.resource)
    }
}
