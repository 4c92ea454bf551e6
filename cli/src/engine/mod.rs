//! # Devyard Resource Engine
//!
//! File: cli/src/engine/mod.rs
//!
//! - **`graph`**: the resource arena, dependency levels and ownership table.
//! - **`dispatcher`**: `Engine`, which walks the levels and invokes providers.
//!
pub mod dispatcher;
pub mod graph;

pub use dispatcher::{Engine, ResourceState};
pub use graph::Graph;
