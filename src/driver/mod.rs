// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Run driver
//!
//! Submits compiled artifacts to an [`ExecutionEngine`] and follows the
//! resulting runs. Run status only ever comes from the engine, with one
//! exception: [`RunDriver::await_completion`] hands back a `TimedOut` copy
//! when its local wait expires. That copy is never recorded, and the remote
//! run is left running.

mod policy;
mod sequence;

pub use policy::PollPolicy;
pub use sequence::{build_then_run, ensure_prerequisite, SequenceOutcome};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::compiler::CompiledArtifact;
use crate::engine::{ExecutionEngine, RemoteStatus, RunId};
use crate::errors::{PipewrightError, PipewrightResult};

/// Run status as seen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// The local wait gave up; the remote run may still be executing
    TimedOut,
}

impl RunStatus {
    /// `Succeeded` or `Failed`: the engine will not report anything else
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl From<RemoteStatus> for RunStatus {
    fn from(status: RemoteStatus) -> Self {
        match status {
            RemoteStatus::Pending => Self::Pending,
            RemoteStatus::Running => Self::Running,
            RemoteStatus::Succeeded => Self::Succeeded,
            RemoteStatus::Failed => Self::Failed,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

/// One execution of an artifact against a parameter binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    /// Digest of the submitted artifact
    pub artifact_ref: String,
    /// Bindings sent to the engine, defaults included
    pub parameter_bindings: BTreeMap<String, String>,
    pub status: RunStatus,
    pub error_detail: Option<String>,
    pub started_at: SystemTime,
    pub finished_at: Option<SystemTime>,
}

impl Run {
    fn timed_out(mut self) -> Self {
        self.status = RunStatus::TimedOut;
        self
    }
}

/// Check bindings against an artifact's parameters
///
/// Every parameter without a default must be bound. Defaults fill the
/// rest; bindings for names the artifact does not declare are dropped.
pub fn resolve_bindings(
    artifact: &CompiledArtifact,
    bindings: &BTreeMap<String, String>,
) -> PipewrightResult<BTreeMap<String, String>> {
    let mut resolved = BTreeMap::new();

    for param in &artifact.parameters {
        let value = match (bindings.get(&param.name), &param.default) {
            (Some(value), _) => value.clone(),
            (None, Some(default)) => default.clone(),
            (None, None) => {
                return Err(PipewrightError::MissingParameter {
                    name: param.name.clone(),
                })
            }
        };
        resolved.insert(param.name.clone(), value);
    }

    for name in bindings.keys() {
        if artifact.parameter(name).is_none() {
            tracing::warn!(
                parameter = %name,
                pipeline = %artifact.name,
                "ignoring binding for undeclared parameter"
            );
        }
    }

    Ok(resolved)
}

/// Submits runs and follows them to completion
pub struct RunDriver<E: ExecutionEngine + ?Sized> {
    engine: Arc<E>,
    policy: PollPolicy,
    runs: RwLock<HashMap<RunId, Run>>,
}

impl<E: ExecutionEngine + ?Sized> RunDriver<E> {
    pub fn new(engine: Arc<E>, policy: PollPolicy) -> Self {
        Self {
            engine,
            policy,
            runs: RwLock::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Submit an artifact; the returned run is `Pending`
    pub async fn submit(
        &self,
        artifact: &CompiledArtifact,
        bindings: &BTreeMap<String, String>,
    ) -> PipewrightResult<Run> {
        let resolved = resolve_bindings(artifact, bindings)?;
        let artifact_ref = artifact.digest()?;

        let id = self.engine.submit(artifact, &resolved).await?;

        let run = Run {
            id,
            artifact_ref,
            parameter_bindings: resolved,
            status: RunStatus::Pending,
            error_detail: None,
            started_at: SystemTime::now(),
            finished_at: None,
        };

        tracing::info!(run = %run.id, pipeline = %artifact.name, "run submitted");
        self.runs.write().await.insert(run.id.clone(), run.clone());

        Ok(run)
    }

    /// Query a run's status once
    ///
    /// After `Succeeded` or `Failed` has been observed the engine is not
    /// asked again and the recorded run is returned as is.
    pub async fn poll(&self, run_id: &RunId) -> PipewrightResult<Run> {
        {
            let runs = self.runs.read().await;
            let run = runs.get(run_id).ok_or_else(|| PipewrightError::UnknownRun {
                run_id: run_id.to_string(),
            })?;
            if run.status.is_terminal() {
                return Ok(run.clone());
            }
        }

        let report = self.engine.status(run_id).await?;

        let mut runs = self.runs.write().await;
        let run = runs
            .get_mut(run_id)
            .ok_or_else(|| PipewrightError::UnknownRun {
                run_id: run_id.to_string(),
            })?;

        // Another poll may have settled the run while the engine was queried
        if !run.status.is_terminal() {
            run.status = report.status.into();
            run.error_detail = report.error_detail;
            if run.status.is_terminal() {
                run.finished_at = Some(SystemTime::now());
                tracing::info!(run = %run.id, status = %run.status, "run settled");
            }
        }

        Ok(run.clone())
    }

    /// Poll with backoff until the run settles or `timeout` elapses
    ///
    /// On timeout the run is returned with status `TimedOut`; the run is not
    /// cancelled and later polls report the engine's real status. A timeout
    /// too large to represent as a deadline waits until the run settles.
    pub async fn await_completion(&self, run_id: &RunId, timeout: Duration) -> PipewrightResult<Run> {
        let deadline = Instant::now().checked_add(timeout);
        let mut attempt = 0u32;

        loop {
            let run = self.poll(run_id).await?;
            if run.status.is_terminal() {
                return Ok(run);
            }

            let mut delay = self.policy.delay_for_attempt(attempt);
            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    tracing::warn!(
                        run = %run.id,
                        status = %run.status,
                        "gave up waiting; the run was not cancelled"
                    );
                    return Ok(run.timed_out());
                }
                delay = delay.min(remaining);
            }

            tracing::debug!(run = %run.id, delay_ms = delay.as_millis() as u64, "waiting");
            tokio::time::sleep(delay).await;
            attempt = attempt.saturating_add(1);
        }
    }
}
