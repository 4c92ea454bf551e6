//! # Devyard Dispatcher
//!
//! File: cli/src/engine/dispatcher.rs
//!
//! ## Overview
//!
//! `Engine` applies, destroys and inspects a `Graph` one dependency level at a
//! time. Resources within a level share no dependencies, so their provider
//! calls run concurrently; the next level starts only when the current one has
//! finished.
//!
//! ## Failure policy
//!
//! - **apply**: every resource of a failing level still completes (in-flight
//!   calls are not interrupted), then the first error is returned and later
//!   levels are not started. Applied resources are not rolled back.
//! - **destroy**: levels run in reverse. Destroyed resources, and the children
//!   they own, leave the graph. The first failing level stops the run.
//! - **cancellation**: checked before each level. Remaining levels are skipped
//!   and `DevyardError::Cancelled` is returned.
//!
//! The dispatcher is the only writer of resource status: `Applied` when
//! `create` returns `Ok`, `Failed` otherwise. Resources that are not
//! `PendingCreation` are skipped on apply. A pending resource whose
//! dependencies are not all `Applied` (a dependency that failed on an earlier
//! run) is never handed to its provider; it stays pending and the run stops
//! after its level with `DevyardError::DependencyNotApplied`.
//!
use crate::common::docker::Client;
use crate::core::config::Settings;
use crate::core::error::{DevyardError, Result};
use crate::engine::graph::{Graph, ResourceId};
use crate::providers::{provider_for, Context};
use crate::resources::{Resource, ResourceType, Spec, Status};
use anyhow::anyhow;
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Runtime view of one declared resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceState {
    pub reference: String,
    pub kind: ResourceType,
    pub status: Status,
    pub ids: Vec<String>,
    /// The declared configuration, as the provider reports it.
    pub spec: Spec,
}

pub struct Engine {
    client: Arc<dyn Client>,
    settings: Settings,
}

impl Engine {
    pub fn new(client: Arc<dyn Client>, settings: Settings) -> Self {
        Self { client, settings }
    }

    fn context<'a>(&'a self, graph: &'a Graph) -> Context<'a> {
        Context {
            client: self.client.as_ref(),
            settings: &self.settings,
            resolver: graph,
        }
    }

    /// Creates every pending resource, dependencies first.
    pub async fn apply(&self, graph: &mut Graph, cancel: &CancellationToken) -> Result<()> {
        let levels = graph.levels()?;
        info!("Applying {} resource(s) in {} level(s)", graph.declared().count(), levels.len());

        for (depth, level) in levels.iter().enumerate() {
            check_cancelled(cancel, depth)?;

            let (results, blocked) = {
                let ctx = self.context(graph);
                let mut blocked = None;
                let mut ready: Vec<(ResourceId, &Resource)> = Vec::new();
                for id in level {
                    let Some(resource) = graph.get(*id) else {
                        continue;
                    };
                    if resource.info.status().is_terminal() {
                        debug!("Skipping '{}' ({})", resource.reference(), resource.info.status());
                        continue;
                    }
                    match unmet_dependency(graph, resource)? {
                        Some(unmet) => {
                            warn!("{}", unmet);
                            blocked.get_or_insert(anyhow!(unmet));
                        }
                        None => ready.push((*id, resource)),
                    }
                }
                debug!("Level {}: creating {} resource(s)", depth, ready.len());

                let results = join_all(ready.into_iter().map(|(id, resource)| {
                    let provider = provider_for(resource, ctx);
                    async move { (id, provider.create().await) }
                }))
                .await;
                (results, blocked)
            };

            let mut first_error = blocked;
            for (id, result) in results {
                let Some(resource) = graph.get_mut(id) else {
                    continue;
                };
                let reference = resource.reference();
                match result {
                    Ok(children) => {
                        resource.info.mark_applied()?;
                        info!("'{}' applied", reference);
                        for child in children {
                            graph.add_child(id, child)?;
                        }
                    }
                    Err(e) => {
                        resource.info.mark_failed()?;
                        error!("'{}' failed: {:#}", reference, e);
                        first_error.get_or_insert(e);
                    }
                }
            }
            if let Some(e) = first_error {
                warn!("Stopping apply after level {}", depth);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Destroys every declared resource, dependents first, removing each from
    /// the graph once its provider succeeds.
    pub async fn destroy(&self, graph: &mut Graph, cancel: &CancellationToken) -> Result<()> {
        let levels = graph.levels()?;
        info!("Destroying {} resource(s)", graph.declared().count());

        for (depth, level) in levels.iter().enumerate().rev() {
            check_cancelled(cancel, depth)?;

            let results = {
                let ctx = self.context(graph);
                join_all(
                    level
                        .iter()
                        .filter_map(|id| graph.get(*id).map(|r| (*id, r)))
                        .map(|(id, resource)| {
                            let provider = provider_for(resource, ctx);
                            async move { (id, provider.destroy().await) }
                        }),
                )
                .await
            };

            let mut first_error = None;
            for (id, result) in results {
                match result {
                    Ok(()) => {
                        let removed = graph.remove(id);
                        if let Some(resource) = removed.first() {
                            info!(
                                "'{}' destroyed ({} owned resource(s) released)",
                                resource.reference(),
                                removed.len() - 1
                            );
                        }
                    }
                    Err(e) => {
                        if let Some(resource) = graph.get(id) {
                            error!("Failed to destroy '{}': {:#}", resource.reference(), e);
                        }
                        first_error.get_or_insert(e);
                    }
                }
            }
            if let Some(e) = first_error {
                return Err(e);
            }
        }
        Ok(())
    }

    /// Runtime ids and status of every declared resource, in declaration order.
    pub async fn lookup(&self, graph: &Graph) -> Result<Vec<ResourceState>> {
        let ctx = self.context(graph);
        let results = join_all(graph.declared().map(|(_, resource)| {
            let provider = provider_for(resource, ctx);
            async move {
                let (kind, declared) = provider.config();
                let mut state = ResourceState {
                    reference: declared.reference().to_string(),
                    kind,
                    status: declared.info.status(),
                    spec: declared.spec.clone(),
                    ids: Vec::new(),
                };
                state.ids = provider.lookup().await?;
                Ok::<_, anyhow::Error>(state)
            }
        }))
        .await;
        results.into_iter().collect()
    }
}

/// The first dependency of `resource` that is not `Applied`, as the error
/// that stops the run.
fn unmet_dependency(graph: &Graph, resource: &Resource) -> Result<Option<DevyardError>> {
    for dependency in resource.info.dependencies() {
        let status = graph.find_resource(dependency)?.info.status();
        if status != Status::Applied {
            return Ok(Some(DevyardError::DependencyNotApplied {
                resource: resource.reference().to_string(),
                dependency: dependency.clone(),
                status,
            }));
        }
    }
    Ok(None)
}

fn check_cancelled(cancel: &CancellationToken, depth: usize) -> Result<()> {
    if cancel.is_cancelled() {
        warn!("Cancelled before level {}", depth);
        return Err(anyhow!(DevyardError::Cancelled));
    }
    Ok(())
}
