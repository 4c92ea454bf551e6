//! # Devyard Settings
//!
//! File: cli/src/core/config.rs
//!
//! ## Overview
//!
//! This module loads the application settings: where per-cluster credentials
//! files are written, whether images are always re-pulled, and which server
//! images the cluster providers run. Settings are separate from the stack file
//! (see `resources::loader`), which declares the resources themselves.
//!
//! ## Architecture
//!
//! Settings sources, in order of precedence:
//! 1. Project-specific `.devyard.toml` in the current directory or its ancestors
//!    (the search stops at a directory containing `.git`)
//! 2. User-specific `<config dir>/devyard/config.toml`
//! 3. Default values defined in the code
//!
//! Paths are tilde-expanded and the merged result is validated before use.
//!
//! ## Examples
//!
//! ```rust
//! let settings = config::load_settings()?;
//! let kubeconfig = settings.kubeconfig_path("testing");
//! ```
//!
use crate::common::fs::io::read_file_to_string;
use crate::core::error::{DevyardError, Result};
use anyhow::{anyhow, Context};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Application settings, loaded from TOML files.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Directory holding generated state such as cluster credentials files (can use ~).
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    /// Always pull images, even when present locally.
    #[serde(default)]
    pub force_pull: bool,
    /// Server images run by the cluster providers.
    #[serde(default)]
    pub images: ImageSettings,
    /// How long a cluster provider waits for the server to write its
    /// credentials file.
    #[serde(default = "default_cluster_timeout_secs")]
    pub cluster_timeout_secs: u64,
}

/// Images used by the cluster providers. A cluster's `version` replaces the tag.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ImageSettings {
    #[serde(default = "default_k3s_image")]
    pub k3s: String,
    #[serde(default = "default_nomad_image")]
    pub nomad: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            force_pull: false,
            images: ImageSettings::default(),
            cluster_timeout_secs: default_cluster_timeout_secs(),
        }
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            k3s: default_k3s_image(),
            nomad: default_nomad_image(),
        }
    }
}

impl Settings {
    /// Directory holding the generated files of one cluster.
    pub fn cluster_dir(&self, name: &str) -> PathBuf {
        Path::new(&self.state_dir).join("clusters").join(name)
    }

    /// Host path of the kube credentials file written for cluster `name`.
    pub fn kubeconfig_path(&self, name: &str) -> PathBuf {
        self.cluster_dir(name).join(KUBECONFIG_FILENAME)
    }

    pub fn cluster_timeout(&self) -> Duration {
        Duration::from_secs(self.cluster_timeout_secs)
    }

    /// Host path of the orchestrator credentials file written for cluster `name`.
    pub fn nomad_config_path(&self, name: &str) -> PathBuf {
        self.cluster_dir(name).join(NOMAD_CONFIG_FILENAME)
    }
}

fn default_state_dir() -> String {
    "~/.devyard".to_string()
}
fn default_cluster_timeout_secs() -> u64 {
    120
}
fn default_k3s_image() -> String {
    "rancher/k3s:v1.27.4-k3s1".to_string()
}
fn default_nomad_image() -> String {
    "hashicorp/nomad:1.6.2".to_string()
}

const PROJECT_SETTINGS_FILENAME: &str = ".devyard.toml";
pub const KUBECONFIG_FILENAME: &str = "kubeconfig.yaml";
pub const NOMAD_CONFIG_FILENAME: &str = "nomad_config.json";

pub fn load_settings() -> Result<Settings> {
    let user_settings = load_user_settings()?;
    let project_settings = load_project_settings()?;
    let mut merged = merge_settings(user_settings.unwrap_or_default(), project_settings);
    expand_settings_paths(&mut merged);
    validate_settings(&merged).context("Settings validation failed")?;
    debug!("Final loaded settings: {:?}", merged);
    Ok(merged)
}

fn load_user_settings() -> Result<Option<Settings>> {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "Devyard", "devyard") {
        let settings_path = proj_dirs.config_dir().join("config.toml");
        if settings_path.exists() {
            info!("Loading user settings from: {}", settings_path.display());
            load_settings_from_path(&settings_path).map(Some)
        } else {
            debug!("User settings file not found at {}", settings_path.display());
            Ok(None)
        }
    } else {
        warn!("Could not determine user config directory.");
        Ok(None)
    }
}

fn load_project_settings() -> Result<Option<Settings>> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    match find_project_settings_path(&current_dir) {
        Some(path) => {
            info!("Loading project settings from: {}", path.display());
            load_settings_from_path(&path).map(Some)
        }
        None => {
            debug!("No project settings file (.devyard.toml) found in current directory or ancestors.");
            Ok(None)
        }
    }
}

fn find_project_settings_path(start: &Path) -> Option<PathBuf> {
    let mut path = start;
    loop {
        let candidate = path.join(PROJECT_SETTINGS_FILENAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if path.join(".git").is_dir() {
            debug!(
                "Found .git directory at {}, stopping project settings search.",
                path.display()
            );
            return None;
        }
        path = path.parent()?;
    }
}

fn load_settings_from_path(path: &Path) -> Result<Settings> {
    let content = read_file_to_string(path)
        .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML from file: {}", path.display()))
}

fn merge_settings(user: Settings, project: Option<Settings>) -> Settings {
    let project = match project {
        Some(p) => p,
        None => return user,
    };
    let defaults = Settings::default();
    Settings {
        state_dir: if project.state_dir != defaults.state_dir {
            project.state_dir
        } else {
            user.state_dir
        },
        force_pull: project.force_pull || user.force_pull,
        images: ImageSettings {
            k3s: if project.images.k3s != defaults.images.k3s {
                project.images.k3s
            } else {
                user.images.k3s
            },
            nomad: if project.images.nomad != defaults.images.nomad {
                project.images.nomad
            } else {
                user.images.nomad
            },
        },
        cluster_timeout_secs: if project.cluster_timeout_secs != defaults.cluster_timeout_secs {
            project.cluster_timeout_secs
        } else {
            user.cluster_timeout_secs
        },
    }
}

fn expand_settings_paths(settings: &mut Settings) {
    settings.state_dir = shellexpand::tilde(&settings.state_dir).into_owned();
    debug!("Expanded state directory: {}", settings.state_dir);
}

fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.state_dir.trim().is_empty() {
        return Err(anyhow!(DevyardError::Config(
            "state_dir cannot be empty.".to_string()
        )));
    }
    let state_dir = Path::new(&settings.state_dir);
    if state_dir.exists() && !state_dir.is_dir() {
        return Err(anyhow!(DevyardError::Config(format!(
            "Configured state_dir '{}' exists but is not a directory.",
            state_dir.display()
        ))));
    }
    for (key, image) in [("k3s", &settings.images.k3s), ("nomad", &settings.images.nomad)] {
        if image.trim().is_empty() {
            return Err(anyhow!(DevyardError::Config(format!(
                "images.{} cannot be empty.",
                key
            ))));
        }
    }
    Ok(())
}
