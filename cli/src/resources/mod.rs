//! # Devyard Resource Model
//!
//! File: cli/src/resources/mod.rs
//!
//! ## Overview
//!
//! Typed definitions of every resource kind a stack can declare: networks,
//! containers, Kubernetes-style (k3s) clusters, orchestrator (Nomad) clusters
//! and ingress proxies. The stack file loader (`loader`) produces these, the
//! graph (`engine::graph`) stores them and the providers consume them.
//!
//! ## Architecture
//!
//! - `ResourceType`: closed set of kinds, with the `<type>` tags used in references.
//! - `Reference`: a parsed `<type>.<name>` pointer to another resource.
//! - `ResourceInfo`: identity and lifecycle metadata (name, kind, status, dependencies).
//! - `Spec`: the typed payload, one variant per kind.
//! - `Resource`: `ResourceInfo` + `Spec`.
//!
//! Dependencies are derived when a `Resource` is built: explicit `depends_on`
//! entries plus the references implied by the payload (networks, ingress targets).
//!
//! ## Examples
//!
//! ```rust
//! let web = Resource::new(Spec::Container(ContainerConfig {
//!     name: "web".into(),
//!     image: "nginx:latest".into(),
//!     networks: vec![NetworkAttachment::new("network.local")],
//!     ..Default::default()
//! }));
//! assert_eq!(web.info.dependencies(), ["network.local"]);
//! ```
//!
pub mod loader;
pub mod status;

pub use status::Status;

use crate::core::error::{DevyardError, Result};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The kinds of resource a stack can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Network,
    Container,
    K8sCluster,
    NomadCluster,
    Ingress,
}

impl ResourceType {
    pub const ALL: [ResourceType; 5] = [
        ResourceType::Network,
        ResourceType::Container,
        ResourceType::K8sCluster,
        ResourceType::NomadCluster,
        ResourceType::Ingress,
    ];

    /// Tag used in references and stack file sections.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Network => "network",
            ResourceType::Container => "container",
            ResourceType::K8sCluster => "k8s_cluster",
            ResourceType::NomadCluster => "nomad_cluster",
            ResourceType::Ingress => "ingress",
        }
    }

    pub fn from_tag(tag: &str) -> Option<ResourceType> {
        ResourceType::ALL.into_iter().find(|t| t.as_str() == tag)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `<type>.<name>` pointer to a declared resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    pub kind: ResourceType,
    pub name: String,
}

impl Reference {
    pub fn new(kind: ResourceType, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Parses `network.test` style references. The name may itself contain dots.
    pub fn parse(reference: &str) -> Result<Reference> {
        let (tag, name) = reference.split_once('.').ok_or_else(|| {
            anyhow!(DevyardError::Config(format!(
                "Invalid reference '{}'. Expected <type>.<name>.",
                reference
            )))
        })?;
        let kind = ResourceType::from_tag(tag).ok_or_else(|| {
            anyhow!(DevyardError::Config(format!(
                "Unknown resource type '{}' in reference '{}'.",
                tag, reference
            )))
        })?;
        if name.is_empty() {
            return Err(anyhow!(DevyardError::Config(format!(
                "Reference '{}' has an empty name.",
                reference
            ))));
        }
        Ok(Reference::new(kind, name))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.name)
    }
}

/// Identity and lifecycle metadata shared by every resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ResourceType,
    status: Status,
    dependencies: Vec<String>,
}

impl ResourceInfo {
    pub fn new(name: impl Into<String>, kind: ResourceType, dependencies: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            status: Status::PendingCreation,
            dependencies,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// References of the resources that must be applied before this one.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn reference(&self) -> Reference {
        Reference::new(self.kind, self.name.clone())
    }

    pub fn mark_applied(&mut self) -> Result<()> {
        self.status = self.status.transition(Status::Applied)?;
        Ok(())
    }

    pub fn mark_failed(&mut self) -> Result<()> {
        self.status = self.status.transition(Status::Failed)?;
        Ok(())
    }
}

/// A single key/value environment entry. Order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A bind mount from a host path into a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Volume {
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub read_only: bool,
}

/// A local (host) to remote (container or service) port pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Port {
    pub local: u16,
    pub remote: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

impl Port {
    pub fn new(local: u16, remote: u16) -> Self {
        Self {
            local,
            remote,
            protocol: default_protocol(),
        }
    }
}

fn default_protocol() -> String {
    "tcp".to_string()
}

/// Membership of a network, by reference (`network.<name>`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkAttachment {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl NetworkAttachment {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            name: reference.into(),
            ..Default::default()
        }
    }

    /// Name of the network resource this attachment points at.
    pub fn network_name(&self) -> Result<String> {
        let reference = Reference::parse(&self.name)?;
        if reference.kind != ResourceType::Network {
            return Err(anyhow!(DevyardError::Config(format!(
                "'{}' is not a network reference.",
                self.name
            ))));
        }
        Ok(reference.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// CIDR for the network, e.g. `10.5.0.0/16`. Docker picks one when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
}

/// A fully-resolved container definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, rename = "volume", skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<KeyValue>,
    #[serde(default, rename = "network", skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkAttachment>,
    #[serde(default, rename = "port", skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<Port>,
    #[serde(default)]
    pub privileged: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct K8sClusterConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Only `k3s` is supported.
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Overrides the tag of the configured k3s image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Server count. Only single-node clusters are provisioned.
    #[serde(default = "default_nodes")]
    pub nodes: u32,
    #[serde(default, rename = "network", skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkAttachment>,
    /// Images to preload into the cluster. Accepted but not acted on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

fn default_driver() -> String {
    "k3s".to_string()
}

fn default_nodes() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NomadClusterConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Overrides the tag of the configured Nomad image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, rename = "network", skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkAttachment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngressConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Reference to a container, k8s_cluster or nomad_cluster.
    pub target: String,
    /// Service to proxy to. Only meaningful for cluster targets.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service: String,
    /// Kubernetes namespace of `service`; `default` when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, rename = "network", skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkAttachment>,
    #[serde(default, rename = "port", skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<Port>,
    /// Free-form backend settings, carried for introspection.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,
}

/// The typed payload of a resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Spec {
    Network(NetworkConfig),
    Container(ContainerConfig),
    K8sCluster(K8sClusterConfig),
    NomadCluster(NomadClusterConfig),
    Ingress(IngressConfig),
}

impl Spec {
    pub fn kind(&self) -> ResourceType {
        match self {
            Spec::Network(_) => ResourceType::Network,
            Spec::Container(_) => ResourceType::Container,
            Spec::K8sCluster(_) => ResourceType::K8sCluster,
            Spec::NomadCluster(_) => ResourceType::NomadCluster,
            Spec::Ingress(_) => ResourceType::Ingress,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Spec::Network(c) => &c.name,
            Spec::Container(c) => &c.name,
            Spec::K8sCluster(c) => &c.name,
            Spec::NomadCluster(c) => &c.name,
            Spec::Ingress(c) => &c.name,
        }
    }

    /// Explicit `depends_on` entries followed by the references the payload implies.
    fn references(&self) -> Vec<String> {
        let (depends_on, networks, extra): (&[String], &[NetworkAttachment], Option<&String>) =
            match self {
                Spec::Network(c) => (c.depends_on.as_slice(), &[][..], None),
                Spec::Container(c) => (c.depends_on.as_slice(), c.networks.as_slice(), None),
                Spec::K8sCluster(c) => (c.depends_on.as_slice(), c.networks.as_slice(), None),
                Spec::NomadCluster(c) => (c.depends_on.as_slice(), c.networks.as_slice(), None),
                Spec::Ingress(c) => (
                    c.depends_on.as_slice(),
                    c.networks.as_slice(),
                    Some(&c.target),
                ),
            };

        let mut references: Vec<String> = Vec::new();
        let implied = networks.iter().map(|n| &n.name).chain(extra);
        for reference in depends_on.iter().chain(implied) {
            if !references.contains(reference) {
                references.push(reference.clone());
            }
        }
        references
    }
}

/// A declared resource: metadata plus typed payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    #[serde(flatten)]
    pub info: ResourceInfo,
    pub spec: Spec,
}

impl Resource {
    /// Builds a resource in `PendingCreation`, deriving its dependencies from the payload.
    pub fn new(spec: Spec) -> Self {
        let info = ResourceInfo::new(spec.name(), spec.kind(), spec.references());
        Self { info, spec }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn kind(&self) -> ResourceType {
        self.info.kind
    }

    pub fn reference(&self) -> Reference {
        self.info.reference()
    }

    pub fn networks(&self) -> &[NetworkAttachment] {
        match &self.spec {
            Spec::Network(_) => &[],
            Spec::Container(c) => &c.networks,
            Spec::K8sCluster(c) => &c.networks,
            Spec::NomadCluster(c) => &c.networks,
            Spec::Ingress(c) => &c.networks,
        }
    }
}

/// Joins a resource name and a network name into the DNS name the resource
/// answers to on that network.
pub fn fqdn(name: &str, network: &str) -> String {
    format!("{}.{}", name, network)
}
