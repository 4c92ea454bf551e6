//! # Devyard Stack File Loader
//!
//! File: cli/src/resources/loader.rs
//!
//! ## Overview
//!
//! Parses a TOML stack file into a validated `Graph`. Each resource kind is a
//! top-level array of tables named after its reference tag:
//!
//! ```toml
//! [[network]]
//! name = "test"
//! subnet = "10.5.0.0/16"
//!
//! [[k8s_cluster]]
//! name = "testing"
//! driver = "k3s"
//!
//! [[k8s_cluster.network]]
//! name = "network.test"
//!
//! [[ingress]]
//! name = "web"
//! target = "k8s_cluster.testing"
//! service = "web-svc"
//!
//! [[ingress.port]]
//! local = 8080
//! remote = 80
//! ```
//!
//! Loading rejects unknown fields, empty names, duplicate `(type, name)` pairs,
//! unresolved references and dependency cycles, all as `DevyardError::Config`.
//! Every resource starts in `PendingCreation`.
//!
use super::{
    ContainerConfig, IngressConfig, K8sClusterConfig, NetworkConfig, NomadClusterConfig, Resource,
    Spec,
};
use crate::common::fs::io::read_file_to_string;
use crate::core::error::{DevyardError, Result};
use crate::engine::graph::Graph;
use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StackFile {
    #[serde(default)]
    network: Vec<NetworkConfig>,
    #[serde(default)]
    container: Vec<ContainerConfig>,
    #[serde(default)]
    k8s_cluster: Vec<K8sClusterConfig>,
    #[serde(default)]
    nomad_cluster: Vec<NomadClusterConfig>,
    #[serde(default)]
    ingress: Vec<IngressConfig>,
}

impl StackFile {
    fn into_specs(self) -> impl Iterator<Item = Spec> {
        self.network
            .into_iter()
            .map(Spec::Network)
            .chain(self.container.into_iter().map(Spec::Container))
            .chain(self.k8s_cluster.into_iter().map(Spec::K8sCluster))
            .chain(self.nomad_cluster.into_iter().map(Spec::NomadCluster))
            .chain(self.ingress.into_iter().map(Spec::Ingress))
    }
}

/// Reads and parses the stack file at `path`.
pub fn load_stack(path: &Path) -> Result<Graph> {
    info!("Loading stack from: {}", path.display());
    let content = read_file_to_string(path)?;
    parse_stack(&content).with_context(|| format!("Invalid stack file: {}", path.display()))
}

/// Parses stack file content into a graph of `PendingCreation` resources.
pub fn parse_stack(content: &str) -> Result<Graph> {
    let stack: StackFile = toml::from_str(content)
        .map_err(|e| anyhow!(DevyardError::Config(format!("Failed to parse stack: {}", e))))?;

    let mut graph = Graph::new();
    for spec in stack.into_specs() {
        if spec.name().trim().is_empty() {
            return Err(anyhow!(DevyardError::Config(format!(
                "A {} block is missing its name.",
                spec.kind()
            ))));
        }
        let resource = Resource::new(spec);
        debug!(
            "Declared '{}' depending on {:?}",
            resource.reference(),
            resource.info.dependencies()
        );
        graph.insert(resource)?;
    }
    graph.validate()?;
    Ok(graph)
}
