// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Compiled artifact format
//!
//! A self-contained JSON execution plan. Parameter references inside task
//! arguments are encoded as `{{params.<name>}}` placeholders and resolved by
//! the engine at run time. Each task lists only its direct dependencies, so
//! the engine sees every parallelism opportunity of the original graph.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::digest::hash_bytes;
use crate::errors::PipewrightError;
use crate::pipeline::ParamType;

/// Format tag embedded in every artifact
pub const ARTIFACT_FORMAT: &str = "pipewright/v1";

const PLACEHOLDER_PREFIX: &str = "{{params.";
const PLACEHOLDER_SUFFIX: &str = "}}";

/// Placeholder text for a parameter reference
pub fn placeholder(name: &str) -> String {
    format!("{}{}{}", PLACEHOLDER_PREFIX, name, PLACEHOLDER_SUFFIX)
}

/// Parameter name referenced by a placeholder argument
pub fn placeholder_name(arg: &str) -> Option<&str> {
    arg.strip_prefix(PLACEHOLDER_PREFIX)?
        .strip_suffix(PLACEHOLDER_SUFFIX)
}

/// A compiled, portable pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    /// Artifact format tag
    pub format: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Parameters in declaration order
    #[serde(default)]
    pub parameters: Vec<ArtifactParameter>,

    /// Shared volume mounted into every task
    pub volume: ArtifactVolume,

    /// Tasks in topological order
    pub tasks: Vec<ArtifactTask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactParameter {
    pub name: String,

    #[serde(rename = "type")]
    pub param_type: ParamType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactVolume {
    pub name: String,
    pub mount_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactTask {
    pub id: String,
    pub image: String,
    pub executable: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Direct dependencies only
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ArtifactResources>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactResources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

impl ArtifactTask {
    /// Substitute parameter placeholders with bound values
    pub fn resolve_args(
        &self,
        bindings: &BTreeMap<String, String>,
    ) -> Result<Vec<String>, PipewrightError> {
        self.args
            .iter()
            .map(|arg| match placeholder_name(arg) {
                Some(name) => bindings.get(name).cloned().ok_or_else(|| {
                    PipewrightError::MissingParameter {
                        name: name.to_string(),
                    }
                }),
                None => Ok(arg.clone()),
            })
            .collect()
    }
}

impl CompiledArtifact {
    /// Canonical serialized form
    pub fn to_bytes(&self) -> Result<Vec<u8>, PipewrightError> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// BLAKE3 digest of the canonical form
    pub fn digest(&self) -> Result<String, PipewrightError> {
        Ok(hash_bytes(&self.to_bytes()?))
    }

    /// Parse an artifact, rejecting unknown formats
    pub fn from_json(json: &str) -> Result<Self, PipewrightError> {
        let artifact: Self = serde_json::from_str(json)?;
        artifact.ensure_supported()?;
        Ok(artifact)
    }

    pub fn from_file(path: &Path) -> Result<Self, PipewrightError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| PipewrightError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        Self::from_json(&content)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), PipewrightError> {
        std::fs::write(path, self.to_bytes()?).map_err(|e| PipewrightError::FileWriteError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Check the format tag
    pub fn ensure_supported(&self) -> Result<(), PipewrightError> {
        if self.format != ARTIFACT_FORMAT {
            return Err(PipewrightError::UnsupportedArtifactVersion {
                found: self.format.clone(),
                expected: ARTIFACT_FORMAT.to_string(),
            });
        }
        Ok(())
    }

    pub fn task(&self, id: &str) -> Option<&ArtifactTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn parameter(&self, name: &str) -> Option<&ArtifactParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Parameters that have no default
    pub fn required_parameters(&self) -> impl Iterator<Item = &ArtifactParameter> {
        self.parameters.iter().filter(|p| p.default.is_none())
    }

    /// Tasks not yet completed whose dependencies are all completed
    pub fn ready_tasks(&self, completed: &HashSet<String>) -> Vec<&ArtifactTask> {
        self.tasks
            .iter()
            .filter(|t| !completed.contains(&t.id))
            .filter(|t| t.dependencies.iter().all(|d| completed.contains(d)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> CompiledArtifact {
        CompiledArtifact {
            format: ARTIFACT_FORMAT.into(),
            name: "p".into(),
            description: None,
            parameters: vec![ArtifactParameter {
                name: "dataset-file".into(),
                param_type: ParamType::String,
                default: None,
            }],
            volume: ArtifactVolume {
                name: "data".into(),
                mount_path: "/mnt/data".into(),
            },
            tasks: vec![ArtifactTask {
                id: "process".into(),
                image: "img:1".into(),
                executable: "process.py".into(),
                args: vec!["--in".into(), placeholder("dataset-file")],
                dependencies: vec![],
                resources: None,
            }],
        }
    }

    #[test]
    fn test_placeholder_round_trip() {
        assert_eq!(placeholder("out-file"), "{{params.out-file}}");
        assert_eq!(placeholder_name("{{params.out-file}}"), Some("out-file"));
        assert_eq!(placeholder_name("--out"), None);
    }

    #[test]
    fn test_resolve_args() {
        let artifact = artifact();
        let task = artifact.task("process").unwrap();

        let mut bindings = BTreeMap::new();
        bindings.insert("dataset-file".to_string(), "data/x.csv".to_string());
        assert_eq!(task.resolve_args(&bindings).unwrap(), vec!["--in", "data/x.csv"]);

        assert!(matches!(
            task.resolve_args(&BTreeMap::new()),
            Err(PipewrightError::MissingParameter { .. })
        ));
    }

    #[test]
    fn test_unknown_format_rejected() {
        let mut artifact = artifact();
        artifact.format = "pipewright/v9".into();
        let json = String::from_utf8(artifact.to_bytes().unwrap()).unwrap();

        assert!(matches!(
            CompiledArtifact::from_json(&json),
            Err(PipewrightError::UnsupportedArtifactVersion { ref found, .. }) if found == "pipewright/v9"
        ));
    }

    #[test]
    fn test_artifact_survives_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.json");
        let artifact = artifact();

        artifact.write_to(&path).unwrap();
        let loaded = CompiledArtifact::from_file(&path).unwrap();

        assert_eq!(loaded, artifact);
        assert_eq!(loaded.digest().unwrap(), artifact.digest().unwrap());
    }
}
