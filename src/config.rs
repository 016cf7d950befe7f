// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Orchestrator configuration
//!
//! Image coordinates, shared volume layout, build staging and polling
//! settings, loaded from `pipewright.toml`. The loaded value is passed
//! explicitly to the compiler, the run driver and the collaborators.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::driver::PollPolicy;
use crate::errors::PipewrightError;
use crate::storage::{ExclusionList, SharedVolume};

/// Default configuration file name
pub const CONFIG_FILE: &str = "pipewright.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub image: ImageConfig,

    #[serde(default)]
    pub volume: VolumeConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub driver: DriverConfig,
}

/// Default execution image coordinates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Registry host, e.g. `registry.example.com/team`
    #[serde(default)]
    pub registry: Option<String>,

    /// Image name
    #[serde(default)]
    pub name: Option<String>,

    /// Image tag
    #[serde(default = "default_tag")]
    pub tag: String,
}

fn default_tag() -> String {
    "latest".to_string()
}

impl ImageConfig {
    /// Full image reference (`registry/name:tag`), if a name is configured
    pub fn reference(&self) -> Option<String> {
        let name = self.name.as_ref()?;
        let tag = if self.tag.is_empty() { "latest" } else { &self.tag };
        Some(match self.registry.as_deref() {
            Some(registry) if !registry.is_empty() => {
                format!("{}/{}:{}", registry.trim_end_matches('/'), name, tag)
            }
            _ => format!("{}:{}", name, tag),
        })
    }
}

/// Shared durable volume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// Volume name recorded in the artifact
    #[serde(default = "default_volume_name")]
    pub name: String,

    /// Local path of the volume for this process
    #[serde(default = "default_volume_root")]
    pub root: PathBuf,

    /// Path at which remote steps see the volume
    #[serde(default = "default_mount_path")]
    pub mount_path: PathBuf,
}

fn default_volume_name() -> String {
    "pipeline-data".to_string()
}

fn default_volume_root() -> PathBuf {
    PathBuf::from(".pipewright/volume")
}

fn default_mount_path() -> PathBuf {
    PathBuf::from("/mnt/data")
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            name: default_volume_name(),
            root: default_volume_root(),
            mount_path: default_mount_path(),
        }
    }
}

impl VolumeConfig {
    pub fn shared_volume(&self) -> SharedVolume {
        SharedVolume::new(self.root.clone(), self.mount_path.clone())
    }
}

/// Build context staging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Local build context directory
    #[serde(default = "default_build_context")]
    pub context: PathBuf,

    /// Upload destination (`file://` URI or directory)
    #[serde(default)]
    pub destination: Option<String>,

    /// Newline-delimited globs to leave out of the upload
    #[serde(default = "default_exclude")]
    pub exclude: String,
}

fn default_build_context() -> PathBuf {
    PathBuf::from(".")
}

fn default_exclude() -> String {
    ".git\n.pipewright\ntarget\n*.ipynb_checkpoints".to_string()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            context: default_build_context(),
            destination: None,
            exclude: default_exclude(),
        }
    }
}

impl BuildConfig {
    pub fn exclusions(&self) -> Result<ExclusionList, PipewrightError> {
        ExclusionList::parse(&self.exclude)
    }
}

/// Run driver polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_poll_interval_ms")]
    pub max_poll_interval_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Default wait before a run is reported as timed out
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_max_poll_interval_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_timeout_secs() -> u64 {
    3_600
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_interval_ms: default_max_poll_interval_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl DriverConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            initial_interval: Duration::from_millis(self.poll_interval_ms),
            max_interval: Duration::from_millis(self.max_poll_interval_ms),
            multiplier: self.backoff_multiplier,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl OrchestratorConfig {
    /// Parse configuration from TOML
    pub fn from_toml(content: &str) -> Result<Self, PipewrightError> {
        toml::from_str(content).map_err(Into::into)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, PipewrightError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| PipewrightError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        toml::from_str(&content).map_err(|e| PipewrightError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Resolve and load configuration
    ///
    /// Order: explicit path, `./pipewright.toml`, the user config directory,
    /// then built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, PipewrightError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Self::from_file(&local);
        }

        if let Some(path) = Self::user_config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        tracing::debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Per-user configuration file location
    pub fn user_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "pipewright")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }
}
