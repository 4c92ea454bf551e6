//! # Devyard Common Utilities (`common`)
//!
//! File: cli/src/common/mod.rs
//!
//! ## Overview
//!
//! Shared infrastructure used by the providers and the command handlers:
//!
//! - **`docker`**: The container runtime client facade (`Client` trait,
//!   `DockerClient` over `bollard`).
//! - **`fs`**: Filesystem I/O with contextual errors.
//!

/// Container runtime client facade backed by the Docker daemon.
pub mod docker;
/// Filesystem I/O utilities.
pub mod fs;
