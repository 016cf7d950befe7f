// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Execution engines
//!
//! An engine accepts a compiled artifact plus parameter bindings, schedules
//! its tasks, and reports run status. Any compatible engine must:
//!
//! - start a task only after all of its dependencies reached `Succeeded`;
//! - never start a task when one of its dependencies `Failed`;
//! - accept the same artifact many times with different bindings.

mod local;

pub use local::LocalEngine;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::compiler::CompiledArtifact;
use crate::errors::PipewrightError;

/// Engine-assigned run identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status as reported by an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl RemoteStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Engine status report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub status: RemoteStatus,
    pub error_detail: Option<String>,
}

impl EngineStatus {
    pub fn new(status: RemoteStatus) -> Self {
        Self {
            status,
            error_detail: None,
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            status: RemoteStatus::Failed,
            error_detail: Some(detail.into()),
        }
    }
}

/// Trait for execution engines
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Start a run of `artifact`; returns the engine's run id
    ///
    /// `bindings` holds a value for every artifact parameter.
    async fn submit(
        &self,
        artifact: &CompiledArtifact,
        bindings: &BTreeMap<String, String>,
    ) -> Result<RunId, PipewrightError>;

    /// Current status of a run
    async fn status(&self, run_id: &RunId) -> Result<EngineStatus, PipewrightError>;

    /// Whether submitted runs keep executing after this process exits
    fn runs_outlive_caller(&self) -> bool {
        true
    }
}
