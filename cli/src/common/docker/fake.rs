//! In-memory `Client` used by provider and engine tests. Records every call in
//! order and keeps just enough state (containers by identity, networks by name)
//! for create/lookup/remove sequences to behave like the daemon.
//!
use super::Client;
use crate::core::error::{DevyardError, Result};
use crate::resources::{ContainerConfig, NetworkConfig, ResourceType};
use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FindContainers { name: String, kind: ResourceType },
    PullImage { image: String, force_pull: bool },
    CreateContainer { kind: ResourceType, spec: ContainerConfig },
    RemoveContainer { id: String },
    DetachNetwork { network: String, id: String },
    FindNetwork { name: String },
    CreateNetwork { spec: NetworkConfig },
    RemoveNetwork { id: String },
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    containers: BTreeMap<(String, ResourceType), Vec<String>>,
    networks: BTreeMap<String, String>,
    next_id: usize,
    fail_pull: bool,
    fail_create: HashSet<String>,
    fail_remove: bool,
    fail_detach: bool,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

#[derive(Debug, Default)]
pub struct FakeClient {
    state: Mutex<State>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretends a container with identity `(name, kind)` already runs.
    pub fn with_container(self, name: &str, kind: ResourceType, id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .containers
            .entry((name.to_string(), kind))
            .or_default()
            .push(id.to_string());
        self
    }

    pub fn with_network(self, name: &str, id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .networks
            .insert(name.to_string(), id.to_string());
        self
    }

    pub fn failing_pull(self) -> Self {
        self.state.lock().unwrap().fail_pull = true;
        self
    }

    /// Container (or network) creation fails for resources named `name`.
    pub fn failing_create(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_create
            .insert(name.to_string());
        self
    }

    pub fn failing_remove(self) -> Self {
        self.state.lock().unwrap().fail_remove = true;
        self
    }

    pub fn failing_detach(self) -> Self {
        self.state.lock().unwrap().fail_detach = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Specs passed to `create_container`, in call order.
    pub fn created_containers(&self) -> Vec<(ResourceType, ContainerConfig)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CreateContainer { kind, spec } => Some((kind, spec)),
                _ => None,
            })
            .collect()
    }

    pub fn container_ids(&self, name: &str, kind: ResourceType) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .containers
            .get(&(name.to_string(), kind))
            .cloned()
            .unwrap_or_default()
    }

    pub fn network_id(&self, name: &str) -> Option<String> {
        self.state.lock().unwrap().networks.get(name).cloned()
    }
}

#[async_trait]
impl Client for FakeClient {
    async fn find_container_ids(&self, name: &str, kind: ResourceType) -> Result<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::FindContainers {
            name: name.to_string(),
            kind,
        });
        Ok(state
            .containers
            .get(&(name.to_string(), kind))
            .cloned()
            .unwrap_or_default())
    }

    async fn pull_image(&self, image: &str, force_pull: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::PullImage {
            image: image.to_string(),
            force_pull,
        });
        if state.fail_pull {
            return Err(anyhow!("registry unreachable").context(DevyardError::ImagePull {
                image: image.to_string(),
            }));
        }
        Ok(())
    }

    async fn create_container(
        &self,
        kind: ResourceType,
        spec: &ContainerConfig,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateContainer {
            kind,
            spec: spec.clone(),
        });
        if state.fail_create.contains(&spec.name) {
            return Err(anyhow!(DevyardError::Docker(format!(
                "create failed for '{}'",
                spec.name
            ))));
        }
        let id = state.next_id("ctr");
        state
            .containers
            .entry((spec.name.clone(), kind))
            .or_default()
            .push(id.clone());
        Ok(id)
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::RemoveContainer { id: id.to_string() });
        if state.fail_remove {
            return Err(anyhow!(DevyardError::Docker(format!(
                "remove failed for '{}'",
                id
            ))));
        }
        for ids in state.containers.values_mut() {
            ids.retain(|existing| existing != id);
        }
        state.containers.retain(|_, ids| !ids.is_empty());
        Ok(())
    }

    async fn detach_network(&self, network: &str, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::DetachNetwork {
            network: network.to_string(),
            id: id.to_string(),
        });
        if state.fail_detach {
            return Err(anyhow!(DevyardError::Docker(format!(
                "detach failed for '{}'",
                id
            ))));
        }
        Ok(())
    }

    async fn find_network_id(&self, name: &str) -> Result<Option<String>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::FindNetwork {
            name: name.to_string(),
        });
        Ok(state.networks.get(name).cloned())
    }

    async fn create_network(&self, spec: &NetworkConfig) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateNetwork { spec: spec.clone() });
        if state.fail_create.contains(&spec.name) {
            return Err(anyhow!(DevyardError::Docker(format!(
                "create failed for '{}'",
                spec.name
            ))));
        }
        let id = state.next_id("net");
        state.networks.insert(spec.name.clone(), id.clone());
        Ok(id)
    }

    async fn remove_network(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::RemoveNetwork { id: id.to_string() });
        if state.fail_remove {
            return Err(anyhow!(DevyardError::Docker(format!(
                "remove failed for '{}'",
                id
            ))));
        }
        state.networks.retain(|_, existing| existing != id);
        Ok(())
    }
}
