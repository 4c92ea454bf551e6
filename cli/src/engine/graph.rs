//! # Devyard Resource Graph
//!
//! File: cli/src/engine/graph.rs
//!
//! ## Overview
//!
//! The graph owns every resource of one environment. Declared resources are
//! indexed by `(type, name)` so references can be resolved; child resources
//! (created as a side effect of a parent, e.g. the proxy container of an
//! ingress) live in the same arena but are reachable only through the
//! ownership table, never by reference.
//!
//! ## Architecture
//!
//! - `nodes`: arena slots addressed by `ResourceId`. A removed resource leaves
//!   an empty slot, so ids stay stable.
//! - `index`: `Reference -> ResourceId` for declared resources.
//! - `owners`: `child -> parent`. Removing a parent removes its children.
//! - `levels()`: Kahn layering over declared resources. Everything in a level
//!   depends only on earlier levels, so a level can be applied concurrently.
//!
use crate::core::error::{DevyardError, Result};
use crate::resources::{Reference, Resource};
use anyhow::anyhow;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Stable handle of a resource inside a `Graph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(usize);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Resolves dependency references for providers.
pub trait Resolver: Send + Sync {
    /// Returns a copy of the declared resource `reference` points at.
    ///
    /// # Errors
    ///
    /// `DevyardError::Config` when the reference is malformed or names no
    /// declared resource.
    fn find_dependent_resource(&self, reference: &str) -> Result<Resource>;
}

#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Option<Resource>>,
    index: HashMap<Reference, ResourceId>,
    owners: BTreeMap<ResourceId, ResourceId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a declared resource.
    ///
    /// # Errors
    ///
    /// `DevyardError::Config` if a resource with the same type and name exists.
    pub fn insert(&mut self, resource: Resource) -> Result<ResourceId> {
        let reference = resource.reference();
        if self.index.contains_key(&reference) {
            return Err(anyhow!(DevyardError::Config(format!(
                "Duplicate resource '{}'.",
                reference
            ))));
        }
        let id = self.push(resource);
        self.index.insert(reference, id);
        Ok(id)
    }

    /// Registers `child` as exclusively owned by `parent`.
    pub fn add_child(&mut self, parent: ResourceId, child: Resource) -> Result<ResourceId> {
        if self.get(parent).is_none() {
            return Err(anyhow!(DevyardError::Config(format!(
                "Cannot attach '{}' to missing parent {}.",
                child.reference(),
                parent
            ))));
        }
        let id = self.push(child);
        self.owners.insert(id, parent);
        Ok(id)
    }

    fn push(&mut self, resource: Resource) -> ResourceId {
        self.nodes.push(Some(resource));
        ResourceId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: ResourceId) -> Option<&mut Resource> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn id_of(&self, reference: &Reference) -> Option<ResourceId> {
        self.index.get(reference).copied()
    }

    /// Looks up a declared resource by its `<type>.<name>` reference.
    pub fn find_resource(&self, reference: &str) -> Result<&Resource> {
        let parsed = Reference::parse(reference)?;
        self.id_of(&parsed)
            .and_then(|id| self.get(id))
            .ok_or_else(|| {
                anyhow!(DevyardError::Config(format!(
                    "Resource '{}' is not declared.",
                    reference
                )))
            })
    }

    pub fn owner(&self, child: ResourceId) -> Option<ResourceId> {
        self.owners.get(&child).copied()
    }

    pub fn children(&self, parent: ResourceId) -> Vec<ResourceId> {
        self.owners
            .iter()
            .filter(|(_, owner)| **owner == parent)
            .map(|(child, _)| *child)
            .collect()
    }

    /// Removes a resource and, recursively, everything it owns.
    /// Returns the removed resources, parent first.
    pub fn remove(&mut self, id: ResourceId) -> Vec<Resource> {
        let mut removed = Vec::new();
        let Some(resource) = self.nodes.get_mut(id.0).and_then(Option::take) else {
            return removed;
        };
        if self.index.get(&resource.reference()) == Some(&id) {
            self.index.remove(&resource.reference());
        }
        self.owners.remove(&id);
        removed.push(resource);
        for child in self.children(id) {
            removed.extend(self.remove(child));
        }
        removed
    }

    /// All live resources, declared and owned, in insertion order.
    pub fn resources(&self) -> impl Iterator<Item = (ResourceId, &Resource)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|r| (ResourceId(i), r)))
    }

    /// Declared resources only, in insertion order.
    pub fn declared(&self) -> impl Iterator<Item = (ResourceId, &Resource)> {
        self.resources()
            .filter(move |(id, _)| self.owner(*id).is_none())
    }

    pub fn len(&self) -> usize {
        self.resources().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks every dependency reference resolves and that there is no cycle.
    pub fn validate(&self) -> Result<()> {
        self.levels().map(|_| ())
    }

    /// Orders declared resources into dependency levels: every resource in
    /// level `n` depends only on resources in levels `< n`. Within a level,
    /// resources keep insertion order.
    ///
    /// # Errors
    ///
    /// `DevyardError::Config` for an unresolved dependency reference or a cycle.
    pub fn levels(&self) -> Result<Vec<Vec<ResourceId>>> {
        let mut remaining: BTreeMap<ResourceId, BTreeSet<ResourceId>> = BTreeMap::new();
        for (id, resource) in self.declared() {
            let mut deps = BTreeSet::new();
            for dependency in resource.info.dependencies() {
                let parsed = Reference::parse(dependency)?;
                let dep_id = self.id_of(&parsed).ok_or_else(|| {
                    anyhow!(DevyardError::Config(format!(
                        "'{}' depends on '{}', which is not declared.",
                        resource.reference(),
                        dependency
                    )))
                })?;
                if dep_id == id {
                    return Err(anyhow!(DevyardError::Config(format!(
                        "'{}' depends on itself.",
                        dependency
                    ))));
                }
                deps.insert(dep_id);
            }
            remaining.insert(id, deps);
        }

        let mut levels = Vec::new();
        while !remaining.is_empty() {
            let ready: Vec<ResourceId> = remaining
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(id, _)| *id)
                .collect();
            if ready.is_empty() {
                let stuck: Vec<String> = remaining
                    .keys()
                    .filter_map(|id| self.get(*id))
                    .map(|r| r.reference().to_string())
                    .collect();
                return Err(anyhow!(DevyardError::Config(format!(
                    "Dependency cycle between: {}",
                    stuck.join(", ")
                ))));
            }
            for id in &ready {
                remaining.remove(id);
            }
            for deps in remaining.values_mut() {
                for id in &ready {
                    deps.remove(id);
                }
            }
            levels.push(ready);
        }
        Ok(levels)
    }
}

impl Resolver for Graph {
    fn find_dependent_resource(&self, reference: &str) -> Result<Resource> {
        self.find_resource(reference).cloned()
    }
}
