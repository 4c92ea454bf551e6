//! # Devyard Resource Providers
//!
//! File: cli/src/providers/mod.rs
//!
//! ## Overview
//!
//! A provider turns one declared resource into runtime operations against the
//! `Client` facade. There is one provider per `ResourceType`, selected by
//! `provider_for`.
//!
//! ## Architecture
//!
//! - **`container`**: single containers; also the building block the cluster and
//!   ingress providers delegate to.
//! - **`network`**: bridge networks.
//! - **`k8s_cluster`**: single-node k3s servers that write a kubeconfig to disk.
//! - **`nomad_cluster`**: dev-mode Nomad agents plus their client config file.
//! - **`ingress`**: proxy containers bridging to a container, k3s or Nomad target.
//!
//! Providers borrow their resource from the graph for the duration of one call
//! and never change its status; the dispatcher records `Applied`/`Failed` from
//! the returned `Result`. `create` returns the child resources it produced so
//! the dispatcher can register their ownership.
//!
//! Failure policy on destroy: network detach is best-effort (logged, never
//! returned), container removal is fail-fast.
//!
pub mod container;
pub mod ingress;
pub mod k8s_cluster;
pub mod network;
pub mod nomad_cluster;

use crate::common::docker::Client;
use crate::core::config::Settings;
use crate::core::error::Result;
use crate::engine::graph::Resolver;
use crate::resources::{Resource, ResourceType, Spec};
use async_trait::async_trait;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Creates the runtime artifacts of the resource. Returns owned children.
    async fn create(&self) -> Result<Vec<Resource>>;

    async fn destroy(&self) -> Result<()>;

    /// Runtime ids of the resource. Empty when nothing exists.
    async fn lookup(&self) -> Result<Vec<String>>;

    fn config(&self) -> (ResourceType, &Resource);
}

/// Everything a provider needs besides its own resource.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub client: &'a dyn Client,
    pub settings: &'a Settings,
    pub resolver: &'a dyn Resolver,
}

/// Selects the provider registered for the resource's type.
pub fn provider_for<'a>(resource: &'a Resource, ctx: Context<'a>) -> Box<dyn Provider + 'a> {
    match &resource.spec {
        Spec::Network(config) => Box::new(network::NetworkProvider::new(resource, config, ctx)),
        Spec::Container(config) => Box::new(container::ContainerProvider::new(
            resource,
            config,
            ResourceType::Container,
            ctx.client,
            ctx.settings.force_pull,
        )),
        Spec::K8sCluster(config) => {
            Box::new(k8s_cluster::K8sClusterProvider::new(resource, config, ctx))
        }
        Spec::NomadCluster(config) => {
            Box::new(nomad_cluster::NomadClusterProvider::new(resource, config, ctx))
        }
        Spec::Ingress(config) => Box::new(ingress::IngressProvider::new(resource, config, ctx)),
    }
}

/// Replaces the tag of `image` with `version`, keeping registry ports intact.
pub(crate) fn with_tag(image: &str, version: Option<&str>) -> String {
    let Some(version) = version else {
        return image.to_string();
    };
    let name_end = image.rfind('/').map_or(0, |i| i + 1);
    let repository = match image[name_end..].find(':') {
        Some(i) => &image[..name_end + i],
        None => image,
    };
    format!("{}:{}", repository, version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::docker::fake::FakeClient;
    use crate::engine::graph::Graph;
    use crate::resources::{ContainerConfig, NetworkConfig};

    #[test]
    fn test_with_tag() {
        assert_eq!(
            with_tag("rancher/k3s:v1.27.4-k3s1", Some("v1.28.2-k3s1")),
            "rancher/k3s:v1.28.2-k3s1"
        );
        assert_eq!(
            with_tag("localhost:5000/nomad", Some("1.7.0")),
            "localhost:5000/nomad:1.7.0"
        );
        assert_eq!(with_tag("hashicorp/nomad:1.6.2", None), "hashicorp/nomad:1.6.2");
    }

    #[test]
    fn test_provider_for_reports_config() {
        let client = FakeClient::new();
        let settings = Settings::default();
        let graph = Graph::new();
        let ctx = Context {
            client: &client,
            settings: &settings,
            resolver: &graph,
        };

        let network = Resource::new(Spec::Network(NetworkConfig {
            name: "local".into(),
            ..Default::default()
        }));
        let web = Resource::new(Spec::Container(ContainerConfig {
            name: "web".into(),
            image: "nginx:latest".into(),
            ..Default::default()
        }));

        let provider = provider_for(&network, ctx);
        let (kind, resource) = provider.config();
        assert_eq!(kind, ResourceType::Network);
        assert_eq!(resource.name(), "local");

        assert_eq!(provider_for(&web, ctx).config().0, ResourceType::Container);
    }
}
