//! # Devyard CLI Integration Test Common Helpers
//!
//! File: cli/tests/common.rs
//!
//! Shared helpers for the integration test crates in `cli/tests/`.
//!

#![allow(dead_code)]

pub use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Command pointing at the compiled `devyard` binary, with logging filters
/// from the outer environment cleared.
pub fn devyard_cmd() -> Command {
    let mut cmd = Command::cargo_bin("devyard").expect("Failed to find devyard binary for testing");
    cmd.env_remove("RUST_LOG").env_remove("DEVYARD_STACK");
    cmd
}

/// Writes `contents` to `stack.toml` inside a fresh temp dir. The dir must
/// outlive the command run, so it is returned alongside the path.
pub fn write_stack(contents: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("stack.toml");
    fs::write(&path, contents).expect("Failed to write stack file");
    (dir, path)
}
