//! # Devyard Docker Network Operations
//!
//! File: cli/src/common/docker/networks.rs
//!
//! Bridge networks are looked up by exact name. Docker's `name` filter matches
//! substrings, so results are re-checked before an id is returned.
//!
use super::{resource_label, RESOURCE_LABEL};
use crate::core::error::{DevyardError, Result};
use crate::resources::{NetworkConfig, ResourceType};
use anyhow::{anyhow, Context};
use bollard::{
    models::{Ipam, IpamConfig},
    network::{CreateNetworkOptions, DisconnectNetworkOptions, ListNetworksOptions},
    Docker,
};
use std::collections::HashMap;
use tracing::{debug, error, info, instrument, warn};

/// Returns the id of the network named exactly `name`.
#[instrument(skip(docker))]
pub async fn find_network_id(docker: &Docker, name: &str) -> Result<Option<String>> {
    let options = Some(ListNetworksOptions {
        filters: HashMap::from([("name", vec![name])]),
    });
    let networks = docker
        .list_networks(options)
        .await
        .map_err(|e| anyhow!(DevyardError::DockerApi { source: e }))
        .with_context(|| format!("Failed to list networks matching '{}'", name))?;

    let id = networks
        .into_iter()
        .find(|n| n.name.as_deref() == Some(name))
        .and_then(|n| n.id);
    debug!("Network '{}' lookup: {:?}", name, id);
    Ok(id)
}

/// Creates a bridge network, optionally pinned to a subnet.
///
/// # Errors
///
/// * `DevyardError::DockerApi` - The daemon rejected the request.
/// * `DevyardError::Docker` - The network could not be found right after creation.
#[instrument(skip(docker, spec), fields(network = %spec.name))]
pub async fn create_network(docker: &Docker, spec: &NetworkConfig) -> Result<String> {
    let ipam = Ipam {
        driver: Some("default".to_string()),
        config: spec.subnet.as_ref().map(|subnet| {
            vec![IpamConfig {
                subnet: Some(subnet.clone()),
                ..Default::default()
            }]
        }),
        ..Default::default()
    };
    let options = CreateNetworkOptions {
        name: spec.name.clone(),
        driver: "bridge".to_string(),
        attachable: true,
        ipam,
        labels: HashMap::from([(
            RESOURCE_LABEL.to_string(),
            resource_label(&spec.name, ResourceType::Network),
        )]),
        ..Default::default()
    };

    info!("Creating network '{}'", spec.name);
    docker
        .create_network(options)
        .await
        .map_err(|e| anyhow!(DevyardError::DockerApi { source: e }))
        .with_context(|| format!("Failed to create network '{}'", spec.name))?;

    find_network_id(docker, &spec.name).await?.ok_or_else(|| {
        anyhow!(DevyardError::Docker(format!(
            "Network '{}' not found after creation",
            spec.name
        )))
    })
}

/// Removes the network `id`. A 404 is treated as success.
#[instrument(skip(docker))]
pub async fn remove_network(docker: &Docker, id: &str) -> Result<()> {
    match docker.remove_network(id).await {
        Ok(()) => {
            info!("Network '{}' removed.", id);
            Ok(())
        }
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        }) => {
            warn!("Network '{}' not found during removal attempt.", id);
            Ok(())
        }
        Err(e) => {
            error!("Failed to remove network '{}': {:?}", id, e);
            Err(anyhow!(DevyardError::DockerApi { source: e }))
                .with_context(|| format!("Failed to remove network '{}'", id))
        }
    }
}

/// Disconnects container `id` from `network`.
#[instrument(skip(docker))]
pub async fn detach_network(docker: &Docker, network: &str, id: &str) -> Result<()> {
    docker
        .disconnect_network(
            network,
            DisconnectNetworkOptions {
                container: id,
                force: true,
            },
        )
        .await
        .map_err(|e| anyhow!(DevyardError::DockerApi { source: e }))
        .with_context(|| format!("Failed to detach '{}' from network '{}'", id, network))
}
