//! # Devyard Core Infrastructure
//!
//! File: cli/src/core/mod.rs
//!
//! ## Overview
//!
//! Foundational pieces shared by the engine, the providers and the commands:
//! - `config`: Settings loading, merging and validation
//! - `error`: The error taxonomy and the crate-wide `Result` alias
//!
//! ```rust
//! use crate::core::config; // For loading settings
//! use crate::core::error::{DevyardError, Result}; // For error handling
//! ```
//!
pub mod config;
pub mod error;
