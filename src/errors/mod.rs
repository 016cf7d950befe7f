// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Error types
//!
//! Definition, compilation and submission problems are raised synchronously
//! and always name the offending entity. Remote step failures and local
//! timeouts are not errors: they surface as [`crate::driver::RunStatus`].

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipewright operations
pub type PipewrightResult<T> = Result<T, PipewrightError>;

/// Main error type for pipewright
#[derive(Error, Debug, Diagnostic)]
pub enum PipewrightError {
    // ─────────────────────────────────────────────────────────────────────────
    // Definition Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Parameter '{name}' is already declared")]
    #[diagnostic(
        code(pipewright::duplicate_parameter),
        help("Each pipeline parameter name may be declared only once")
    )]
    DuplicateParameter { name: String },

    #[error("Step '{id}' is already defined")]
    #[diagnostic(
        code(pipewright::duplicate_step),
        help("Step ids must be unique within a pipeline")
    )]
    DuplicateStep { id: String },

    #[error("Step '{step}' depends on unknown step '{predecessor}'")]
    #[diagnostic(
        code(pipewright::unknown_predecessor),
        help("Declare '{predecessor}' before any step that depends on it")
    )]
    UnknownPredecessor { step: String, predecessor: String },

    #[error("Step '{id}' not found in pipeline")]
    #[diagnostic(code(pipewright::unknown_step))]
    UnknownStep { id: String },

    #[error("Step '{step}' references undeclared parameter '{parameter}'")]
    #[diagnostic(
        code(pipewright::unknown_parameter_reference),
        help("Declare '{parameter}' under `parameters` before referencing it")
    )]
    UnknownParameterReference { step: String, parameter: String },

    #[error("Circular dependency detected: {}", cycle.join(" -> "))]
    #[diagnostic(
        code(pipewright::cycle_detected),
        help("Review your step dependencies to remove the cycle")
    )]
    CycleDetected { cycle: Vec<String> },

    #[error("Pipeline '{name}' is finalized and can no longer be modified")]
    #[diagnostic(code(pipewright::graph_finalized))]
    GraphFinalized { name: String },

    #[error("Invalid pipeline configuration: {reason}")]
    #[diagnostic(code(pipewright::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Compilation Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline '{name}' has not been finalized")]
    #[diagnostic(
        code(pipewright::not_finalized),
        help("Call finalize() on the pipeline graph before compiling it")
    )]
    NotFinalized { name: String },

    #[error("Step '{step}' uses {construct}, which the artifact format cannot express: {reason}")]
    #[diagnostic(code(pipewright::unsupported_construct))]
    UnsupportedConstruct {
        step: String,
        construct: String,
        reason: String,
    },

    #[error("Unsupported artifact format '{found}' (expected '{expected}')")]
    #[diagnostic(
        code(pipewright::unsupported_artifact_version),
        help("Recompile the pipeline with this version of pipewright")
    )]
    UnsupportedArtifactVersion { found: String, expected: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Submission / Run Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Required parameter '{name}' has no value")]
    #[diagnostic(
        code(pipewright::missing_parameter),
        help("Pass a value with --param {name}=<value> or declare a default")
    )]
    MissingParameter { name: String },

    #[error("Run '{run_id}' is unknown")]
    #[diagnostic(code(pipewright::unknown_run))]
    UnknownRun { run_id: String },

    #[error("Execution engine error: {message}")]
    #[diagnostic(code(pipewright::engine_error))]
    Engine { message: String },

    #[error("Prerequisite run '{run_id}' finished as {status}; dependent pipeline was not submitted")]
    #[diagnostic(code(pipewright::prerequisite_not_succeeded))]
    PrerequisiteNotSucceeded {
        run_id: String,
        status: String,
        #[help]
        detail: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Collaborator Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Unsupported upload destination: {uri}")]
    #[diagnostic(
        code(pipewright::unsupported_destination),
        help("Use a file:// URI or a plain directory path")
    )]
    UnsupportedDestination { uri: String },

    #[error("Failed to upload '{path}': {error}")]
    #[diagnostic(code(pipewright::upload_failed))]
    UploadFailed { path: PathBuf, error: String },

    #[error("Invalid configuration in '{path}': {message}")]
    #[diagnostic(code(pipewright::config_error))]
    Config { path: PathBuf, message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(pipewright::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(pipewright::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(pipewright::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(pipewright::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(pipewright::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(pipewright::toml_error))]
    Toml { message: String },

    #[error("Glob pattern error: {message}")]
    #[diagnostic(code(pipewright::glob_error))]
    GlobPattern { message: String },
}

impl From<std::io::Error> for PipewrightError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for PipewrightError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for PipewrightError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for PipewrightError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl From<glob::PatternError> for PipewrightError {
    fn from(e: glob::PatternError) -> Self {
        Self::GlobPattern { message: e.to_string() }
    }
}

impl PipewrightError {
    /// Create an unsupported-construct error for a step
    pub fn unsupported(step: &str, construct: &str, reason: impl Into<String>) -> Self {
        Self::UnsupportedConstruct {
            step: step.to_string(),
            construct: construct.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an engine error from anything displayable
    pub fn engine(message: impl std::fmt::Display) -> Self {
        Self::Engine {
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_names_path() {
        let err = PipewrightError::CycleDetected {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Circular dependency detected: a -> b -> a");
    }

    #[test]
    fn test_missing_parameter_names_parameter() {
        let err = PipewrightError::MissingParameter {
            name: "dataset-md5".into(),
        };
        assert!(err.to_string().contains("dataset-md5"));
    }
}
