//! # Devyard Kubernetes Cluster Provider
//!
//! File: cli/src/providers/k8s_cluster.rs
//!
//! ## Overview
//!
//! Runs a single-node k3s server in a privileged container. k3s writes its
//! kubeconfig to `/output/kubeconfig.yaml`, and `/output` is a bind mount of
//! `<state_dir>/clusters/<name>`, so the credentials file lands at
//! `Settings::kubeconfig_path(name)` on the host. Ingress proxies mount that
//! file to reach the cluster API.
//!
//! `create` returns only once the file exists. Its server address is then
//! pointed at `https://<name>.<first network>:6443`, the name other containers
//! on that network resolve and one of the certificate's `--tls-san` entries.
//!
//! The server container is returned as the cluster's child resource; its
//! runtime identity is `(name, k8s_cluster)`.
//!
use super::container::{remove_containers, runtime_operation, ContainerProvider};
use super::{with_tag, Context, Provider};
use crate::common::docker::Client;
use crate::common::fs::io::{
    ensure_dir_exists, read_file_to_string, remove_dir_best_effort, wait_for_file,
    write_string_to_file,
};
use crate::core::config::{Settings, KUBECONFIG_FILENAME};
use crate::core::error::{DevyardError, Result};
use crate::resources::{
    fqdn, ContainerConfig, K8sClusterConfig, KeyValue, Resource, ResourceType, Spec, Volume,
};
use anyhow::{anyhow, Context as _};
use async_trait::async_trait;
use tracing::{debug, info};

const SUPPORTED_DRIVER: &str = "k3s";
const OUTPUT_DIR: &str = "/output";
const API_PORT: u16 = 6443;

pub struct K8sClusterProvider<'a> {
    resource: &'a Resource,
    config: &'a K8sClusterConfig,
    client: &'a dyn Client,
    settings: &'a Settings,
}

impl<'a> K8sClusterProvider<'a> {
    pub fn new(resource: &'a Resource, config: &'a K8sClusterConfig, ctx: Context<'a>) -> Self {
        Self {
            resource,
            config,
            client: ctx.client,
            settings: ctx.settings,
        }
    }

    fn check_config(&self) -> Result<()> {
        if self.config.driver != SUPPORTED_DRIVER {
            return Err(anyhow!(DevyardError::Config(format!(
                "k8s_cluster '{}' uses driver '{}'; only '{}' is supported.",
                self.config.name, self.config.driver, SUPPORTED_DRIVER
            ))));
        }
        if self.config.nodes > 1 {
            return Err(anyhow!(DevyardError::Config(format!(
                "k8s_cluster '{}' requests {} nodes; only single-node clusters are supported.",
                self.config.name, self.config.nodes
            ))));
        }
        Ok(())
    }

    /// The k3s server container. The API certificate is valid for the
    /// cluster's FQDN on every network it joins.
    fn server_container(&self) -> Result<ContainerConfig> {
        let mut command = vec![
            "server".to_string(),
            "--disable".to_string(),
            "traefik".to_string(),
        ];
        for attachment in &self.config.networks {
            command.push("--tls-san".to_string());
            command.push(fqdn(&self.config.name, &attachment.network_name()?));
        }

        let output_dir = self.settings.cluster_dir(&self.config.name);
        Ok(ContainerConfig {
            name: self.config.name.clone(),
            image: with_tag(&self.settings.images.k3s, self.config.version.as_deref()),
            command,
            volumes: vec![Volume {
                source: output_dir.display().to_string(),
                destination: OUTPUT_DIR.to_string(),
                read_only: false,
            }],
            env: vec![
                KeyValue::new(
                    "K3S_KUBECONFIG_OUTPUT",
                    format!("{}/{}", OUTPUT_DIR, KUBECONFIG_FILENAME),
                ),
                KeyValue::new("K3S_KUBECONFIG_MODE", "666"),
            ],
            networks: self.config.networks.clone(),
            privileged: true,
            ..Default::default()
        })
    }

    /// API address reachable from containers sharing the cluster's first network.
    fn api_server(&self) -> Result<Option<String>> {
        let Some(attachment) = self.config.networks.first() else {
            return Ok(None);
        };
        Ok(Some(format!(
            "https://{}:{}",
            fqdn(&self.config.name, &attachment.network_name()?),
            API_PORT
        )))
    }

    async fn prepare_kubeconfig(&self) -> Result<()> {
        let path = self.settings.kubeconfig_path(&self.config.name);
        info!("Waiting for cluster '{}' to write {}", self.config.name, path.display());
        wait_for_file(&path, self.settings.cluster_timeout()).await?;

        let Some(server) = self.api_server()? else {
            debug!("Cluster '{}' has no network, keeping the kubeconfig server address", self.config.name);
            return Ok(());
        };
        let kubeconfig = read_file_to_string(&path)?;
        write_string_to_file(&path, &rewrite_server_address(&kubeconfig, &server))?;
        info!("Kubeconfig for '{}' now targets {}", self.config.name, server);
        Ok(())
    }
}

/// Replaces the value of every `server:` entry, keeping indentation.
fn rewrite_server_address(kubeconfig: &str, server: &str) -> String {
    let mut rewritten: String = kubeconfig
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            if trimmed.starts_with("server:") {
                let indent = &line[..line.len() - trimmed.len()];
                format!("{}server: {}", indent, server)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    rewritten.push('\n');
    rewritten
}

#[async_trait]
impl<'a> Provider for K8sClusterProvider<'a> {
    async fn create(&self) -> Result<Vec<Resource>> {
        self.check_config()?;
        info!("Creating k3s cluster '{}'", self.config.name);

        let server_config = self.server_container()?;
        let server = Resource::new(Spec::Container(server_config.clone()));

        ensure_dir_exists(&self.settings.cluster_dir(&self.config.name))?;
        ContainerProvider::new(
            &server,
            &server_config,
            ResourceType::K8sCluster,
            self.client,
            self.settings.force_pull,
        )
        .create()
        .await?;

        self.prepare_kubeconfig()
            .await
            .with_context(|| runtime_operation(&self.config.name, "prepare kubeconfig"))?;
        Ok(vec![server])
    }

    async fn destroy(&self) -> Result<()> {
        let ids = self.lookup().await?;
        remove_containers(self.client, &self.config.name, &ids, &self.config.networks).await?;
        remove_dir_best_effort(&self.settings.cluster_dir(&self.config.name));
        Ok(())
    }

    async fn lookup(&self) -> Result<Vec<String>> {
        self.client
            .find_container_ids(&self.config.name, ResourceType::K8sCluster)
            .await
            .with_context(|| runtime_operation(&self.config.name, "look up containers"))
    }

    fn config(&self) -> (ResourceType, &Resource) {
        (self.resource.kind(), self.resource)
    }
}
