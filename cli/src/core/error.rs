//! # Devyard Error Types
//!
//! File: cli/src/core/error.rs
//!
//! ## Overview
//!
//! This module defines the error taxonomy used by the resource engine, the
//! providers and the Docker client facade.
//!
//! ## Architecture
//!
//! The error system consists of two main components:
//! - `DevyardError`: A custom error enum using `thiserror` for specific error kinds
//! - `Result<T>`: A type alias for `anyhow::Result<T>` for flexible error handling
//!
//! The error kinds fall into four groups:
//! - Configuration errors (unresolved references, unsupported ingress targets,
//!   invalid settings). Never retried.
//! - Idempotency violations (`AlreadyExists`). The caller must destroy first.
//! - Ordering violations (`DependencyNotApplied`): a resource whose dependency
//!   did not reach `Applied` is never handed to its provider.
//! - Image pull failures (`ImagePull`), attached as context to the underlying error.
//! - Runtime operation failures (`RuntimeOperation`, `DockerApi`), carrying the
//!   resource and the operation that failed.
//!
//! ## Examples
//!
//! ```rust
//! // Attach a classifiable context to a runtime failure
//! client.remove_container(&id).await.with_context(|| DevyardError::RuntimeOperation {
//!     resource: name.to_string(),
//!     operation: "remove container".to_string(),
//! })?;
//!
//! // Classify an error further up the stack
//! if let Some(DevyardError::AlreadyExists { .. }) = err.downcast_ref::<DevyardError>() {
//!     println!("Destroy the existing resource first.");
//! }
//! ```
//!
use crate::resources::{ResourceType, Status};
use thiserror::Error;

/// Custom error type for devyard.
#[derive(Error, Debug)]
pub enum DevyardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{kind} '{name}' already exists. Destroy it first or pick a new name.")]
    AlreadyExists { kind: ResourceType, name: String },

    #[error("Failed to pull image '{image}'")]
    ImagePull { image: String },

    #[error("Failed to {operation} for '{resource}'")]
    RuntimeOperation { resource: String, operation: String },

    #[error("Docker error: {0}")]
    Docker(String),

    #[error("Docker API interaction failed: {source}")]
    DockerApi {
        #[from]
        source: bollard::errors::Error,
    },

    #[error("'{resource}' was not created: its dependency '{dependency}' is {status}, not Applied")]
    DependencyNotApplied {
        resource: String,
        dependency: String,
        status: Status,
    },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: Status, to: Status },

    #[error("Operation cancelled before all dependency levels were processed")]
    Cancelled,

    #[error("Filesystem error: {0}")]
    FileSystem(String),
}

impl DevyardError {
    /// A follow-up the operator can take, for errors that leave the runtime
    /// partially provisioned.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            DevyardError::DependencyNotApplied { .. } => Some(
                "A dependency failed on an earlier run. Run `devyard destroy`, fix it, then apply again.",
            ),
            DevyardError::Cancelled => {
                Some("Resources created before the interrupt remain. Inspect them with `devyard status`.")
            }
            _ => None,
        }
    }
}

/// Type alias for Result using anyhow::Error for broad compatibility.
pub type Result<T> = anyhow::Result<T>;

/// Returns the `DevyardError` carried by `err`, whether it is the root error
/// or a context layer added with `anyhow::Context`.
pub fn classify(err: &anyhow::Error) -> Option<&DevyardError> {
    err.downcast_ref::<DevyardError>()
        .or_else(|| err.chain().find_map(|cause| cause.downcast_ref::<DevyardError>()))
}
