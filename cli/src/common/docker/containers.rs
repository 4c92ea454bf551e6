//! # Devyard Docker Container Operations
//!
//! File: cli/src/common/docker/containers.rs
//!
//! ## Overview
//!
//! Container lookup by logical identity, creation and removal.
//!
//! ## Architecture
//!
//! - **`find_container_ids`**: Lists all containers (running or not) carrying the
//!   identity label and returns their ids.
//! - **`create_container`**: Translates a `ContainerConfig` into the bollard
//!   request (bind mounts, port bindings, ordered environment, identity label),
//!   creates the container attached to its first network, connects the remaining
//!   networks, then starts it.
//! - **`remove_container`**: Force-removes a container by id. A container that is
//!   already gone counts as removed.
//!
//! Port pairs publish host port `local` to container port `remote`.
//!
use super::{container_name, resource_label, RESOURCE_LABEL};
use crate::core::error::{DevyardError, Result};
use crate::resources::{fqdn, ContainerConfig, NetworkAttachment, Port, ResourceType, Volume};
use anyhow::{anyhow, Context};
use bollard::{
    container::{
        Config as DockerContainerConfig, CreateContainerOptions, ListContainersOptions,
        NetworkingConfig, RemoveContainerOptions, StartContainerOptions,
    },
    models::{EndpointIpamConfig, EndpointSettings, HostConfig, Mount, MountTypeEnum, PortBinding},
    network::ConnectNetworkOptions,
    Docker,
};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error, info, instrument};

/// Returns the ids of all containers with identity `(name, kind)`.
#[instrument(skip(docker))]
pub async fn find_container_ids(
    docker: &Docker,
    name: &str,
    kind: ResourceType,
) -> Result<Vec<String>> {
    let filters = HashMap::from([(
        "label".to_string(),
        vec![format!("{}={}", RESOURCE_LABEL, resource_label(name, kind))],
    )]);
    let options = Some(ListContainersOptions {
        all: true,
        filters,
        ..Default::default()
    });

    let containers = docker.list_containers(options).await.map_err(|e| {
        error!("Failed to list containers for {} '{}': {:?}", kind, name, e);
        anyhow!(DevyardError::DockerApi { source: e })
    })?;
    let ids: Vec<String> = containers.into_iter().filter_map(|c| c.id).collect();
    debug!("Found {} container(s) for {} '{}'.", ids.len(), kind, name);
    Ok(ids)
}

/// Creates and starts a container for `spec` with identity `(spec.name, kind)`.
///
/// # Errors
///
/// * `DevyardError::Config` - Invalid mounts or network references.
/// * `DevyardError::DockerApi` - Create, network connect or start failed.
#[instrument(skip(docker, spec), fields(container = %spec.name))]
pub async fn create_container(
    docker: &Docker,
    kind: ResourceType,
    spec: &ContainerConfig,
) -> Result<String> {
    let name = container_name(&spec.name, kind);
    let attachments = endpoint_settings(&spec.name, &spec.networks)?;
    let mounts = convert_volumes_to_mounts(&spec.volumes)?;
    let (exposed_ports, port_bindings) = convert_ports(&spec.ports);

    let host_config = HostConfig {
        port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
        mounts: (!mounts.is_empty()).then_some(mounts),
        privileged: Some(spec.privileged),
        ..Default::default()
    };

    let env: Vec<String> = spec
        .env
        .iter()
        .map(|kv| format!("{}={}", kv.key, kv.value))
        .collect();

    // Docker only accepts one network at create time; the rest are connected below.
    let networking_config = attachments.first().map(|(network, endpoint)| NetworkingConfig {
        endpoints_config: HashMap::from([(network.clone(), endpoint.clone())]),
    });

    let config = DockerContainerConfig {
        image: Some(spec.image.clone()),
        cmd: (!spec.command.is_empty()).then(|| spec.command.clone()),
        env: (!env.is_empty()).then_some(env),
        labels: Some(HashMap::from([(
            RESOURCE_LABEL.to_string(),
            resource_label(&spec.name, kind),
        )])),
        exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
        host_config: Some(host_config),
        networking_config,
        ..Default::default()
    };

    info!("Creating container '{}' from image '{}'", name, spec.image);
    let response = docker
        .create_container(
            Some(CreateContainerOptions {
                name: name.clone(),
                platform: None,
            }),
            config,
        )
        .await
        .map_err(|e| anyhow!(DevyardError::DockerApi { source: e }))
        .with_context(|| format!("Failed to create container '{}'", name))?;
    let id = response.id;

    for (network, endpoint) in attachments.iter().skip(1) {
        debug!("Connecting container '{}' to network '{}'", name, network);
        docker
            .connect_network(
                network,
                ConnectNetworkOptions {
                    container: id.clone(),
                    endpoint_config: endpoint.clone(),
                },
            )
            .await
            .map_err(|e| anyhow!(DevyardError::DockerApi { source: e }))
            .with_context(|| format!("Failed to connect '{}' to network '{}'", name, network))?;
    }

    info!("Starting container '{}' (ID: {})", name, id);
    docker
        .start_container(&id, None::<StartContainerOptions<String>>)
        .await
        .map_err(|e| anyhow!(DevyardError::DockerApi { source: e }))
        .with_context(|| format!("Failed to start container '{}'", name))?;

    Ok(id)
}

/// Force-removes the container `id`. A 404 is treated as success.
#[instrument(skip(docker))]
pub async fn remove_container(docker: &Docker, id: &str) -> Result<()> {
    let options = Some(RemoveContainerOptions {
        force: true,
        v: false,
        link: false,
    });
    match docker.remove_container(id, options).await {
        Ok(_) => {
            info!("Container '{}' removed successfully.", id);
            Ok(())
        }
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        }) => {
            info!("Container '{}' not found during removal attempt.", id);
            Ok(())
        }
        Err(e) => {
            error!("Failed to remove container '{}': {:?}", id, e);
            Err(anyhow!(DevyardError::DockerApi { source: e }))
                .with_context(|| format!("Failed to remove container '{}'", id))
        }
    }
}

/// Resolves network attachments into `(docker network name, endpoint settings)`.
/// Each endpoint gets the `<name>.<network>` alias plus any declared aliases.
fn endpoint_settings(
    name: &str,
    networks: &[NetworkAttachment],
) -> Result<Vec<(String, EndpointSettings)>> {
    networks
        .iter()
        .map(|attachment| {
            let network = attachment.network_name()?;
            let mut aliases = vec![fqdn(name, &network)];
            aliases.extend(attachment.aliases.iter().cloned());
            let endpoint = EndpointSettings {
                aliases: Some(aliases),
                ipam_config: attachment.ip_address.as_ref().map(|ip| EndpointIpamConfig {
                    ipv4_address: Some(ip.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            };
            Ok((network, endpoint))
        })
        .collect()
}

type ExposedPorts = HashMap<String, HashMap<(), ()>>;
type PortBindings = HashMap<String, Option<Vec<PortBinding>>>;

/// Publishes each host port `local` to container port `remote/protocol`.
fn convert_ports(ports: &[Port]) -> (ExposedPorts, PortBindings) {
    let mut exposed: ExposedPorts = HashMap::new();
    let mut bindings: PortBindings = HashMap::new();
    for port in ports {
        let key = format!("{}/{}", port.remote, port.protocol.to_lowercase());
        exposed.insert(key.clone(), HashMap::new());
        bindings
            .entry(key)
            .or_default()
            .get_or_insert_with(Vec::new)
            .push(PortBinding {
                host_ip: None,
                host_port: Some(port.local.to_string()),
            });
    }
    (exposed, bindings)
}

/// Converts volumes into bind mounts. Both paths must be absolute.
fn convert_volumes_to_mounts(volumes: &[Volume]) -> Result<Vec<Mount>> {
    let mut mounts = Vec::new();
    for volume in volumes {
        if !Path::new(&volume.source).is_absolute() {
            return Err(anyhow!(DevyardError::Config(format!(
                "Host path '{}' for mount must be absolute.",
                volume.source
            ))));
        }
        if !volume.destination.starts_with('/') {
            return Err(anyhow!(DevyardError::Config(format!(
                "Container path '{}' for mount must be absolute and non-empty.",
                volume.destination
            ))));
        }
        mounts.push(Mount {
            target: Some(volume.destination.clone()),
            source: Some(volume.source.clone()),
            typ: Some(MountTypeEnum::BIND),
            read_only: Some(volume.read_only),
            ..Default::default()
        });
    }
    Ok(mounts)
}
