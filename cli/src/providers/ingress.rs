//! # Devyard Ingress Provider
//!
//! File: cli/src/providers/ingress.rs
//!
//! ## Overview
//!
//! An ingress is a proxy container that forwards traffic to a target: a plain
//! container, a k3s cluster or a Nomad cluster. Whatever the target, the
//! artifact is the same (one container running `INGRESS_IMAGE`); only the
//! command line, credential mounts and environment differ. The command line is
//! the whole interface with the proxy binary:
//!
//! ```text
//! [--proxy-type kubernetes --namespace <ns>]        k8s_cluster target
//! [--proxy-type nomad --nomad-config <path>]        nomad_cluster target
//! --service-name <service>
//! --ports <local>:<remote>                          once per port, in order
//! ```
//!
//! ## Create
//!
//! 1. Fail with `AlreadyExists` if a container with identity `(name, ingress)` exists.
//! 2. Pull `INGRESS_IMAGE`.
//! 3. Resolve the target reference (configuration error if it is not declared).
//! 4. Map the target onto a `Backend`. Any other resource kind is a configuration error.
//! 5. Build the proxy `ContainerConfig` and create it through `ContainerProvider`
//!    with identity `ingress`.
//!
//! The proxy container is returned as the ingress's only child.
//!
//! ## Destroy
//!
//! Every container with the ingress identity is detached from the declared
//! networks (best-effort), then removed (fail-fast).
//!
use super::container::{remove_containers, runtime_operation, ContainerProvider};
use super::{Context, Provider};
use crate::common::docker::Client;
use crate::core::config::Settings;
use crate::core::error::{DevyardError, Result};
use crate::engine::graph::Resolver;
use crate::resources::{
    fqdn, ContainerConfig, IngressConfig, KeyValue, Port, Resource, ResourceType, Spec, Volume,
};
use anyhow::{anyhow, Context as _};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info};

/// Proxy image. Not configurable.
pub const INGRESS_IMAGE: &str = "shipyardrun/ingress:latest";
/// In-container path of the mounted kubeconfig.
pub const KUBECONFIG_MOUNT: &str = "/.kube/kubeconfig.yml";
pub const KUBECONFIG_ENV: &str = "KUBECONFIG";
/// In-container path of the mounted Nomad client config.
pub const NOMAD_CONFIG_MOUNT: &str = "/.nomad/nomad_config.json";

const DEFAULT_NAMESPACE: &str = "default";

/// What the proxy forwards to, resolved from the target resource.
#[derive(Debug, Clone, PartialEq)]
enum Backend {
    Container { service: String },
    Kubernetes {
        service: String,
        namespace: String,
        credentials: PathBuf,
    },
    Nomad { service: String, credentials: PathBuf },
}

impl Backend {
    fn service(&self) -> &str {
        match self {
            Backend::Container { service }
            | Backend::Kubernetes { service, .. }
            | Backend::Nomad { service, .. } => service,
        }
    }
}

pub struct IngressProvider<'a> {
    resource: &'a Resource,
    config: &'a IngressConfig,
    client: &'a dyn Client,
    settings: &'a Settings,
    resolver: &'a dyn Resolver,
}

impl<'a> IngressProvider<'a> {
    pub fn new(resource: &'a Resource, config: &'a IngressConfig, ctx: Context<'a>) -> Self {
        Self {
            resource,
            config,
            client: ctx.client,
            settings: ctx.settings,
            resolver: ctx.resolver,
        }
    }

    fn resolve_backend(&self, target: &Resource) -> Result<Backend> {
        match &target.spec {
            Spec::Container(container) => {
                let network = container.networks.first().ok_or_else(|| {
                    anyhow!(DevyardError::Config(format!(
                        "ingress '{}' targets container '{}', which joins no network.",
                        self.config.name, container.name
                    )))
                })?;
                Ok(Backend::Container {
                    service: fqdn(&container.name, &network.network_name()?),
                })
            }
            Spec::K8sCluster(cluster) => Ok(Backend::Kubernetes {
                service: self.cluster_service()?,
                namespace: if self.config.namespace.is_empty() {
                    DEFAULT_NAMESPACE.to_string()
                } else {
                    self.config.namespace.clone()
                },
                credentials: self.settings.kubeconfig_path(&cluster.name),
            }),
            Spec::NomadCluster(cluster) => Ok(Backend::Nomad {
                service: self.cluster_service()?,
                credentials: self.settings.nomad_config_path(&cluster.name),
            }),
            Spec::Network(_) | Spec::Ingress(_) => Err(anyhow!(DevyardError::Config(format!(
                "ingress '{}' targets '{}', a {}; supported targets are {}, {} and {}.",
                self.config.name,
                self.config.target,
                target.kind(),
                ResourceType::Container,
                ResourceType::K8sCluster,
                ResourceType::NomadCluster
            )))),
        }
    }

    /// Cluster names are not routable service addresses, so cluster targets
    /// must name the service explicitly.
    fn cluster_service(&self) -> Result<String> {
        if self.config.service.is_empty() {
            return Err(anyhow!(DevyardError::Config(format!(
                "ingress '{}' targets cluster '{}' and must set 'service'.",
                self.config.name, self.config.target
            ))));
        }
        Ok(self.config.service.clone())
    }

    /// Builds the proxy container for `backend`.
    fn proxy_container(&self, backend: &Backend) -> ContainerConfig {
        let mut command = Vec::new();
        let mut volumes = Vec::new();
        let mut env = Vec::new();

        match backend {
            Backend::Container { .. } => {}
            Backend::Kubernetes {
                namespace,
                credentials,
                ..
            } => {
                volumes.push(Volume {
                    source: credentials.display().to_string(),
                    destination: KUBECONFIG_MOUNT.to_string(),
                    read_only: true,
                });
                env.push(KeyValue::new(KUBECONFIG_ENV, KUBECONFIG_MOUNT));
                command.extend([
                    "--proxy-type".to_string(),
                    "kubernetes".to_string(),
                    "--namespace".to_string(),
                    namespace.clone(),
                ]);
            }
            Backend::Nomad { credentials, .. } => {
                volumes.push(Volume {
                    source: credentials.display().to_string(),
                    destination: NOMAD_CONFIG_MOUNT.to_string(),
                    read_only: true,
                });
                command.extend([
                    "--proxy-type".to_string(),
                    "nomad".to_string(),
                    "--nomad-config".to_string(),
                    NOMAD_CONFIG_MOUNT.to_string(),
                ]);
            }
        }

        command.push("--service-name".to_string());
        command.push(backend.service().to_string());
        for port in &self.config.ports {
            command.push("--ports".to_string());
            command.push(format!("{}:{}", port.local, port.remote));
        }

        ContainerConfig {
            name: self.config.name.clone(),
            image: INGRESS_IMAGE.to_string(),
            command,
            volumes,
            env,
            networks: self.config.networks.clone(),
            // the proxy listens on `local`, so that is the port published on the host
            ports: self
                .config
                .ports
                .iter()
                .map(|p| Port {
                    local: p.local,
                    remote: p.local,
                    protocol: p.protocol.clone(),
                })
                .collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl<'a> Provider for IngressProvider<'a> {
    async fn create(&self) -> Result<Vec<Resource>> {
        let name = &self.config.name;
        info!("Creating ingress '{}' for '{}'", name, self.config.target);

        if !self.lookup().await?.is_empty() {
            return Err(anyhow!(DevyardError::AlreadyExists {
                kind: ResourceType::Ingress,
                name: name.clone(),
            }));
        }

        self.client
            .pull_image(INGRESS_IMAGE, self.settings.force_pull)
            .await?;

        let target = self.resolver.find_dependent_resource(&self.config.target)?;
        let backend = self.resolve_backend(&target)?;
        debug!("Ingress '{}' resolved backend {:?}", name, backend);

        let proxy_config = self.proxy_container(&backend);
        let proxy = Resource::new(Spec::Container(proxy_config.clone()));
        // existence guard and pull already ran above
        ContainerProvider::new(
            &proxy,
            &proxy_config,
            ResourceType::Ingress,
            self.client,
            self.settings.force_pull,
        )
        .run_container()
        .await?;

        Ok(vec![proxy])
    }

    async fn destroy(&self) -> Result<()> {
        let ids = self.lookup().await?;
        remove_containers(self.client, &self.config.name, &ids, &self.config.networks).await
    }

    async fn lookup(&self) -> Result<Vec<String>> {
        self.client
            .find_container_ids(&self.config.name, ResourceType::Ingress)
            .await
            .with_context(|| runtime_operation(&self.config.name, "look up containers"))
    }

    fn config(&self) -> (ResourceType, &Resource) {
        (self.resource.kind(), self.resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::docker::fake::{Call, FakeClient};
    use crate::core::error::classify;
    use crate::engine::graph::Graph;
    use crate::resources::{
        K8sClusterConfig, NetworkAttachment, NetworkConfig, NomadClusterConfig,
    };

    struct Fixture {
        client: FakeClient,
        settings: Settings,
        graph: Graph,
        resource: Resource,
    }

    impl Fixture {
        /// Graph with network `local`, container `api`, k8s cluster `k3s` and
        /// nomad cluster `dev`, plus `ingress` (not inserted into the graph).
        fn new(client: FakeClient, ingress: IngressConfig) -> Self {
            let mut graph = Graph::new();
            let on_local = || vec![NetworkAttachment::new("network.local")];
            graph
                .insert(Resource::new(Spec::Network(NetworkConfig {
                    name: "local".into(),
                    ..Default::default()
                })))
                .unwrap();
            graph
                .insert(Resource::new(Spec::Container(ContainerConfig {
                    name: "api".into(),
                    image: "nicholasjackson/fake-service:v0.7.8".into(),
                    networks: on_local(),
                    ..Default::default()
                })))
                .unwrap();
            graph
                .insert(Resource::new(Spec::K8sCluster(K8sClusterConfig {
                    name: "k3s".into(),
                    driver: "k3s".into(),
                    nodes: 1,
                    networks: on_local(),
                    ..Default::default()
                })))
                .unwrap();
            graph
                .insert(Resource::new(Spec::NomadCluster(NomadClusterConfig {
                    name: "dev".into(),
                    networks: on_local(),
                    ..Default::default()
                })))
                .unwrap();
            Self {
                client,
                settings: Settings {
                    state_dir: "/var/lib/devyard".into(),
                    ..Default::default()
                },
                graph,
                resource: Resource::new(Spec::Ingress(ingress)),
            }
        }

        fn provider(&self) -> IngressProvider<'_> {
            let Spec::Ingress(config) = &self.resource.spec else {
                panic!("not an ingress");
            };
            IngressProvider::new(
                &self.resource,
                config,
                Context {
                    client: &self.client,
                    settings: &self.settings,
                    resolver: &self.graph,
                },
            )
        }

        /// The proxy container passed to the client.
        fn proxy(&self) -> ContainerConfig {
            let created = self.client.created_containers();
            assert_eq!(created.len(), 1);
            assert_eq!(created[0].0, ResourceType::Ingress);
            created[0].1.clone()
        }
    }

    fn ingress(target: &str) -> IngressConfig {
        IngressConfig {
            name: "web".into(),
            target: target.into(),
            networks: vec![NetworkAttachment::new("network.local")],
            ports: vec![Port::new(8080, 80), Port::new(8443, 443), Port::new(9090, 80)],
            ..Default::default()
        }
    }

    fn flag_position(command: &[String], flag: &str) -> Option<usize> {
        command.iter().position(|arg| arg == flag)
    }

    #[tokio::test]
    async fn test_container_target() {
        let fixture = Fixture::new(FakeClient::new(), ingress("container.api"));
        let children = fixture.provider().create().await.unwrap();

        let proxy = fixture.proxy();
        assert_eq!(proxy.image, INGRESS_IMAGE);
        assert_eq!(flag_position(&proxy.command, "--proxy-type"), None);
        assert_eq!(
            proxy.command,
            [
                "--service-name",
                "api.local",
                "--ports",
                "8080:80",
                "--ports",
                "8443:443",
                "--ports",
                "9090:80"
            ]
        );
        assert!(proxy.volumes.is_empty());
        assert!(proxy.env.is_empty());
        assert_eq!(proxy.networks, fixture.provider().config.networks);

        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name(), "web");
        assert_eq!(children[0].kind(), ResourceType::Container);
    }

    #[tokio::test]
    async fn test_create_looks_up_and_pulls_once() {
        let fixture = Fixture::new(FakeClient::new(), ingress("container.api"));
        fixture.provider().create().await.unwrap();

        let calls = fixture.client.calls();
        let lookups = calls
            .iter()
            .filter(|c| matches!(c, Call::FindContainers { kind: ResourceType::Ingress, .. }))
            .count();
        let pulls: Vec<&Call> = calls
            .iter()
            .filter(|c| matches!(c, Call::PullImage { .. }))
            .collect();
        assert_eq!(lookups, 1);
        assert_eq!(
            pulls,
            [&Call::PullImage {
                image: INGRESS_IMAGE.to_string(),
                force_pull: false,
            }]
        );
        assert_eq!(fixture.client.created_containers().len(), 1);
    }

    #[tokio::test]
    async fn test_kubernetes_target_defaults_namespace() {
        let config = IngressConfig {
            service: "web-svc".into(),
            ..ingress("k8s_cluster.k3s")
        };
        let fixture = Fixture::new(FakeClient::new(), config);
        fixture.provider().create().await.unwrap();

        let proxy = fixture.proxy();
        let proxy_type = flag_position(&proxy.command, "--proxy-type").unwrap();
        assert_eq!(proxy.command[proxy_type + 1], "kubernetes");
        let namespace = flag_position(&proxy.command, "--namespace").unwrap();
        assert!(namespace > proxy_type);
        assert_eq!(proxy.command[namespace + 1], "default");
        let service = flag_position(&proxy.command, "--service-name").unwrap();
        assert_eq!(proxy.command[service + 1], "web-svc");

        assert_eq!(proxy.volumes.len(), 1);
        assert_eq!(proxy.volumes[0].destination, KUBECONFIG_MOUNT);
        assert_eq!(
            proxy.volumes[0].source,
            "/var/lib/devyard/clusters/k3s/kubeconfig.yaml"
        );
        assert!(proxy.volumes[0].read_only);
        assert_eq!(proxy.env, [KeyValue::new(KUBECONFIG_ENV, KUBECONFIG_MOUNT)]);
    }

    #[tokio::test]
    async fn test_kubernetes_target_declared_namespace() {
        let config = IngressConfig {
            service: "web-svc".into(),
            namespace: "apps".into(),
            ..ingress("k8s_cluster.k3s")
        };
        let fixture = Fixture::new(FakeClient::new(), config);
        fixture.provider().create().await.unwrap();

        let proxy = fixture.proxy();
        assert_eq!(
            &proxy.command[..4],
            ["--proxy-type", "kubernetes", "--namespace", "apps"]
        );
    }

    #[tokio::test]
    async fn test_nomad_target() {
        let config = IngressConfig {
            service: "web".into(),
            ..ingress("nomad_cluster.dev")
        };
        let fixture = Fixture::new(FakeClient::new(), config);
        fixture.provider().create().await.unwrap();

        let proxy = fixture.proxy();
        assert_eq!(
            &proxy.command[..4],
            ["--proxy-type", "nomad", "--nomad-config", NOMAD_CONFIG_MOUNT]
        );
        assert_eq!(flag_position(&proxy.command, "--namespace"), None);
        assert_eq!(proxy.volumes.len(), 1);
        assert_eq!(proxy.volumes[0].destination, NOMAD_CONFIG_MOUNT);
        assert_eq!(
            proxy.volumes[0].source,
            "/var/lib/devyard/clusters/dev/nomad_config.json"
        );
        assert!(proxy.env.is_empty());
    }

    #[tokio::test]
    async fn test_ports_keep_declaration_order() {
        let fixture = Fixture::new(FakeClient::new(), ingress("container.api"));
        fixture.provider().create().await.unwrap();

        let command = fixture.proxy().command;
        let pairs: Vec<&str> = command
            .windows(2)
            .filter(|w| w[0] == "--ports")
            .map(|w| w[1].as_str())
            .collect();
        assert_eq!(pairs, ["8080:80", "8443:443", "9090:80"]);
    }

    #[tokio::test]
    async fn test_unsupported_target_is_config_error() {
        let fixture = Fixture::new(FakeClient::new(), ingress("network.local"));
        let err = fixture.provider().create().await.unwrap_err();
        assert!(matches!(classify(&err), Some(DevyardError::Config(_))));
        let message = err.to_string();
        for kind in ["container", "k8s_cluster", "nomad_cluster"] {
            assert!(message.contains(kind), "'{message}' does not name {kind}");
        }
        assert!(fixture.client.created_containers().is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_target_is_config_error() {
        let fixture = Fixture::new(FakeClient::new(), ingress("container.missing"));
        let err = fixture.provider().create().await.unwrap_err();
        assert!(matches!(classify(&err), Some(DevyardError::Config(_))));
        assert!(fixture.client.created_containers().is_empty());
    }

    #[tokio::test]
    async fn test_cluster_target_requires_service() {
        let fixture = Fixture::new(FakeClient::new(), ingress("k8s_cluster.k3s"));
        let err = fixture.provider().create().await.unwrap_err();
        assert!(err.to_string().contains("must set 'service'"));
    }

    #[tokio::test]
    async fn test_existing_ingress_is_already_exists() {
        let client = FakeClient::new().with_container("web", ResourceType::Ingress, "proxy-1");
        let fixture = Fixture::new(client, ingress("container.api"));
        let err = fixture.provider().create().await.unwrap_err();
        assert!(matches!(
            classify(&err),
            Some(DevyardError::AlreadyExists {
                kind: ResourceType::Ingress,
                ..
            })
        ));
        assert_eq!(fixture.client.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_create_twice_is_already_exists() {
        let fixture = Fixture::new(FakeClient::new(), ingress("container.api"));
        let provider = fixture.provider();
        provider.create().await.unwrap();
        let before = fixture.client.calls().len();

        let err = provider.create().await.unwrap_err();
        assert!(matches!(
            classify(&err),
            Some(DevyardError::AlreadyExists { .. })
        ));
        assert_eq!(fixture.client.calls().len(), before + 1);
    }

    #[tokio::test]
    async fn test_pull_failure_stops_before_resolution() {
        let fixture = Fixture::new(FakeClient::new().failing_pull(), ingress("network.local"));
        let err = fixture.provider().create().await.unwrap_err();
        // the pull error wins over the unsupported target
        assert!(matches!(classify(&err), Some(DevyardError::ImagePull { .. })));
    }

    #[tokio::test]
    async fn test_proxy_creation_error_propagates() {
        let fixture = Fixture::new(
            FakeClient::new().failing_create("web"),
            ingress("container.api"),
        );
        let err = fixture.provider().create().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to create container for 'web'");
    }

    #[tokio::test]
    async fn test_destroy_without_containers_only_looks_up() {
        let fixture = Fixture::new(FakeClient::new(), ingress("container.api"));
        fixture.provider().destroy().await.unwrap();
        assert_eq!(
            fixture.client.calls(),
            [Call::FindContainers {
                name: "web".into(),
                kind: ResourceType::Ingress
            }]
        );
    }

    #[tokio::test]
    async fn test_destroy_detach_failures_do_not_stop_removal() {
        let config = IngressConfig {
            networks: vec![
                NetworkAttachment::new("network.local"),
                NetworkAttachment::new("network.edge"),
            ],
            ..ingress("container.api")
        };
        let client = FakeClient::new()
            .with_container("web", ResourceType::Ingress, "proxy-1")
            .failing_detach();
        let fixture = Fixture::new(client, config);
        fixture.provider().destroy().await.unwrap();

        let detaches = fixture
            .client
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::DetachNetwork { .. }))
            .count();
        assert_eq!(detaches, 2);
        assert!(fixture
            .client
            .container_ids("web", ResourceType::Ingress)
            .is_empty());
    }

    #[tokio::test]
    async fn test_destroy_returns_first_removal_failure() {
        let client = FakeClient::new()
            .with_container("web", ResourceType::Ingress, "proxy-1")
            .with_container("web", ResourceType::Ingress, "proxy-2")
            .failing_remove();
        let fixture = Fixture::new(client, ingress("container.api"));
        let err = fixture.provider().destroy().await.unwrap_err();
        assert!(matches!(
            classify(&err),
            Some(DevyardError::RuntimeOperation { .. })
        ));

        let calls = fixture.client.calls();
        assert_eq!(
            calls.last(),
            Some(&Call::RemoveContainer {
                id: "proxy-1".into()
            })
        );
        assert!(!calls.iter().any(|c| matches!(
            c,
            Call::DetachNetwork { id, .. } | Call::RemoveContainer { id } if id == "proxy-2"
        )));
    }

    #[test]
    fn test_proxy_publishes_listen_ports() {
        let fixture = Fixture::new(FakeClient::new(), ingress("container.api"));
        let backend = Backend::Container {
            service: "api.local".into(),
        };
        let proxy = fixture.provider().proxy_container(&backend);
        let published: Vec<(u16, u16)> = proxy.ports.iter().map(|p| (p.local, p.remote)).collect();
        assert_eq!(published, [(8080, 8080), (8443, 8443), (9090, 9090)]);
    }
}
