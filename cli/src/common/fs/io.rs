//! # Devyard Filesystem I/O Operations
//!
//! File: cli/src/common/fs/io.rs
//!
//! ## Overview
//!
//! Thin wrappers around `std::fs` with contextual errors, used for the stack
//! file, the settings files and the per-cluster state directories
//! (`<state_dir>/clusters/<name>`) that hold kubeconfig and Nomad config files.
//!
//! ## Architecture
//!
//! - **`ensure_dir_exists`**: `mkdir -p`, failing if the path exists but is not a directory.
//! - **`read_file_to_string`**: `fs::read_to_string` with the path in the error.
//! - **`write_string_to_file`**: Creates the parent directory, then overwrites the file.
//! - **`remove_dir_best_effort`**: Recursive removal that only logs failures.
//!   Used on destroy, where a missing or locked state directory must not block
//!   container teardown.
//! - **`wait_for_file`**: Polls until a file written by a container (through a
//!   bind mount) exists and is non-empty.
//!
use crate::core::error::{DevyardError, Result};
use anyhow::Context;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Ensures that a directory exists at `path`, creating parents as needed.
///
/// # Errors
///
/// Returns an `Err` if the path exists but is not a directory, or if creation fails.
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {:?}", path))?;
        info!("Created directory: {:?}", path);
    } else if !path.is_dir() {
        anyhow::bail!(DevyardError::FileSystem(format!(
            "Path exists but is not a directory: {:?}",
            path
        )));
    } else {
        debug!("Directory already exists: {:?}", path);
    }
    Ok(())
}

pub fn read_file_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read file {:?}", path))
}

/// Writes `content` to `path`, overwriting it and creating the parent directory.
pub fn write_string_to_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir_exists(parent)?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write to file {:?}", path))?;
    info!("Wrote content to file: {:?}", path);
    Ok(())
}

/// Recursively removes `path`. Failures are logged, never returned.
pub fn remove_dir_best_effort(path: &Path) {
    if !path.exists() {
        debug!("Nothing to remove at {:?}", path);
        return;
    }
    match fs::remove_dir_all(path) {
        Ok(()) => info!("Removed directory: {:?}", path),
        Err(e) => warn!("Failed to remove directory {:?}: {}", path, e),
    }
}

/// Waits until `path` is a non-empty file, checking every half second.
///
/// # Errors
///
/// `DevyardError::FileSystem` if the file has not appeared after `timeout`.
pub async fn wait_for_file(path: &Path, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false) {
            debug!("File is ready: {:?}", path);
            return Ok(());
        }
        if Instant::now() >= deadline {
            anyhow::bail!(DevyardError::FileSystem(format!(
                "Timed out after {}s waiting for {:?}",
                timeout.as_secs(),
                path
            )));
        }
        sleep(WAIT_POLL_INTERVAL).await;
    }
}
