// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Local execution engine
//!
//! Runs every task of an artifact as a local process on this machine, with
//! the shared volume root as working directory. Ready tasks start together;
//! images and resource hints are recorded but not enforced.
//!
//! Runs live inside the calling process: when it exits, running steps are
//! killed and no further steps start.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::process::Command;
use tokio::sync::RwLock;
use tokio::task::JoinSet;

use super::{EngineStatus, ExecutionEngine, RemoteStatus, RunId};
use crate::compiler::CompiledArtifact;
use crate::config::OrchestratorConfig;
use crate::errors::PipewrightError;
use crate::storage::SharedVolume;

type RunTable = Arc<RwLock<HashMap<RunId, EngineStatus>>>;

/// A task with its arguments already resolved
#[derive(Debug, Clone)]
struct PlannedTask {
    id: String,
    executable: String,
    args: Vec<String>,
    dependencies: Vec<String>,
}

/// In-process engine backed by local processes
pub struct LocalEngine {
    volume: SharedVolume,
    runs: RunTable,
    sequence: AtomicU64,
}

impl LocalEngine {
    /// Create an engine whose tasks run in `working_dir`
    pub fn new(working_dir: PathBuf) -> Self {
        Self::with_volume(SharedVolume::new(working_dir.clone(), working_dir))
    }

    /// Create an engine whose tasks run in the volume's local root
    ///
    /// Steps see the root in `PIPEWRIGHT_VOLUME` and the path remote steps
    /// would use in `PIPEWRIGHT_MOUNT`.
    pub fn with_volume(volume: SharedVolume) -> Self {
        Self {
            volume,
            runs: Arc::new(RwLock::new(HashMap::new())),
            sequence: AtomicU64::new(0),
        }
    }

    /// Create an engine rooted at the configured shared volume
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::with_volume(config.volume.shared_volume())
    }

    pub fn working_dir(&self) -> &Path {
        self.volume.root()
    }
}

#[async_trait]
impl ExecutionEngine for LocalEngine {
    async fn submit(
        &self,
        artifact: &CompiledArtifact,
        bindings: &BTreeMap<String, String>,
    ) -> Result<RunId, PipewrightError> {
        artifact.ensure_supported()?;

        let plan = artifact
            .tasks
            .iter()
            .map(|task| -> Result<PlannedTask, PipewrightError> {
                Ok(PlannedTask {
                    id: task.id.clone(),
                    executable: task.executable.clone(),
                    args: task.resolve_args(bindings)?,
                    dependencies: task.dependencies.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let digest = artifact.digest()?;
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let run_id = RunId::new(format!("{}-{:04}", &digest[..12], seq));

        self.runs
            .write()
            .await
            .insert(run_id.clone(), EngineStatus::new(RemoteStatus::Pending));

        tracing::info!(run = %run_id, pipeline = %artifact.name, "run accepted");

        let runs = Arc::clone(&self.runs);
        let volume = self.volume.clone();
        let id = run_id.clone();
        tokio::spawn(async move {
            let outcome = execute_plan(&id, plan, &volume, &runs).await;
            tracing::info!(run = %id, status = ?outcome.status, "run finished");
            runs.write().await.insert(id, outcome);
        });

        Ok(run_id)
    }

    async fn status(&self, run_id: &RunId) -> Result<EngineStatus, PipewrightError> {
        self.runs
            .read()
            .await
            .get(run_id)
            .cloned()
            .ok_or_else(|| PipewrightError::UnknownRun {
                run_id: run_id.to_string(),
            })
    }

    fn runs_outlive_caller(&self) -> bool {
        false
    }
}

/// Drive one run to a terminal status
async fn execute_plan(
    run_id: &RunId,
    tasks: Vec<PlannedTask>,
    volume: &SharedVolume,
    runs: &RunTable,
) -> EngineStatus {
    let working_dir = volume.root();
    if let Err(e) = tokio::fs::create_dir_all(working_dir).await {
        return EngineStatus::failed(format!(
            "cannot prepare working directory '{}': {}",
            working_dir.display(),
            e
        ));
    }

    // Relative program paths must not depend on how the child resolves them
    let working_dir = match tokio::fs::canonicalize(working_dir).await {
        Ok(dir) => dir,
        Err(_) => working_dir.to_path_buf(),
    };

    runs.write()
        .await
        .insert(run_id.clone(), EngineStatus::new(RemoteStatus::Running));

    let mut started: HashSet<String> = HashSet::new();
    let mut completed: HashSet<String> = HashSet::new();
    let mut failure: Option<String> = None;
    let mut running = JoinSet::new();

    loop {
        // Nothing new starts once a task has failed
        if failure.is_none() {
            for task in &tasks {
                if started.contains(&task.id)
                    || !task.dependencies.iter().all(|d| completed.contains(d))
                {
                    continue;
                }

                started.insert(task.id.clone());
                let task = task.clone();
                let dir = working_dir.clone();
                let mount = volume.mount_path().to_path_buf();
                running.spawn(async move {
                    let outcome = run_task(&task, &dir, &mount).await.map(|_| ());
                    (task.id, outcome)
                });
            }
        }

        match running.join_next().await {
            None => break,
            Some(Ok((id, Ok(())))) => {
                completed.insert(id);
            }
            Some(Ok((_, Err(detail)))) => {
                failure.get_or_insert(detail);
            }
            Some(Err(e)) => {
                failure.get_or_insert(format!("task aborted: {}", e));
            }
        }
    }

    match failure {
        Some(detail) => EngineStatus::failed(detail),
        None if completed.len() == tasks.len() => EngineStatus::new(RemoteStatus::Succeeded),
        None => EngineStatus::failed("some tasks never became ready"),
    }
}

/// Locate a task's program: a path relative to the working directory, or a name on PATH
fn resolve_program(executable: &str, working_dir: &Path) -> Result<PathBuf, String> {
    let candidate = working_dir.join(executable);
    if Path::new(executable).components().count() > 1 || candidate.is_file() {
        return Ok(candidate);
    }

    which::which(executable).map_err(|_| format!("executable '{}' not found", executable))
}

/// Run one step to completion; returns its captured stdout
async fn run_task(task: &PlannedTask, working_dir: &Path, mount_path: &Path) -> Result<String, String> {
    let program = resolve_program(&task.executable, working_dir)
        .map_err(|e| format!("step '{}': {}", task.id, e))?;

    tracing::debug!(step = %task.id, program = %program.display(), "starting step");
    let start = Instant::now();

    let output = Command::new(&program)
        .args(&task.args)
        .current_dir(working_dir)
        .env("PIPEWRIGHT_VOLUME", working_dir)
        .env("PIPEWRIGHT_MOUNT", mount_path)
        .env("PIPEWRIGHT_STEP", &task.id)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| format!("step '{}' could not start: {}", task.id, e))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        tracing::debug!(step = %task.id, "{}", line);
    }

    if output.status.success() {
        tracing::info!(
            step = %task.id,
            seconds = start.elapsed().as_secs_f64(),
            "step succeeded"
        );
        return Ok(stdout);
    }

    let code = output.status.code().unwrap_or(-1);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let last_line = stderr.lines().rev().find(|l| !l.trim().is_empty());

    tracing::warn!(step = %task.id, code, "step failed");

    Err(match last_line {
        Some(line) => format!("step '{}' exited with code {}: {}", task.id, code, line.trim()),
        None => format!("step '{}' exited with code {}", task.id, code),
    })
}
