// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Build-then-run sequencing
//!
//! The first pipeline produces the image the second one runs in. The second
//! pipeline is submitted only after the first is observed as `Succeeded`.

use std::collections::BTreeMap;
use std::time::Duration;

use super::{resolve_bindings, Run, RunDriver, RunStatus};
use crate::compiler::CompiledArtifact;
use crate::engine::ExecutionEngine;
use crate::errors::{PipewrightError, PipewrightResult};

/// Runs produced by [`build_then_run`]
#[derive(Debug, Clone)]
pub struct SequenceOutcome {
    pub build: Run,
    pub main: Run,
}

/// Fail unless `run` was observed as `Succeeded`
///
/// `TimedOut` counts as not succeeded.
pub fn ensure_prerequisite(run: &Run) -> PipewrightResult<()> {
    if run.status == RunStatus::Succeeded {
        return Ok(());
    }

    Err(PipewrightError::PrerequisiteNotSucceeded {
        run_id: run.id.to_string(),
        status: run.status.to_string(),
        detail: run.error_detail.clone(),
    })
}

/// Submit `build`, wait for it, then submit `main` and wait for that
///
/// Bindings for `main` are checked before anything is submitted, so a
/// missing parameter never costs a build.
pub async fn build_then_run<E: ExecutionEngine + ?Sized>(
    driver: &RunDriver<E>,
    build: &CompiledArtifact,
    build_bindings: &BTreeMap<String, String>,
    main: &CompiledArtifact,
    main_bindings: &BTreeMap<String, String>,
    timeout: Duration,
) -> PipewrightResult<SequenceOutcome> {
    resolve_bindings(main, main_bindings)?;

    let submitted = driver.submit(build, build_bindings).await?;
    let build_run = driver.await_completion(&submitted.id, timeout).await?;
    ensure_prerequisite(&build_run)?;

    tracing::info!(build = %build_run.id, pipeline = %main.name, "prerequisite succeeded");

    let submitted = driver.submit(main, main_bindings).await?;
    let main_run = driver.await_completion(&submitted.id, timeout).await?;

    Ok(SequenceOutcome {
        build: build_run,
        main: main_run,
    })
}

#[cfg(test)]
mod tests {
    use crate::driver::test_support::{artifact, ScriptedEngine};
    use super::*;
    use crate::driver::PollPolicy;
    use crate::engine::{EngineStatus, RemoteStatus};
    use std::sync::Arc;

    fn driver(engine: &Arc<ScriptedEngine>) -> RunDriver<ScriptedEngine> {
        RunDriver::new(Arc::clone(engine), PollPolicy::fixed(Duration::from_millis(2)))
    }

    #[tokio::test]
    async fn test_failed_build_stops_sequence() {
        let engine = Arc::new(
            ScriptedEngine::default()
                .with_script("build", vec![EngineStatus::failed("docker build failed")])
                .with_script("main", vec![EngineStatus::new(RemoteStatus::Succeeded)]),
        );
        let driver = driver(&engine);

        let result = build_then_run(
            &driver,
            &artifact("build", &[]),
            &BTreeMap::new(),
            &artifact("main", &[]),
            &BTreeMap::new(),
            Duration::from_secs(5),
        )
        .await;

        match result {
            Err(PipewrightError::PrerequisiteNotSucceeded { status, detail, .. }) => {
                assert_eq!(status, "failed");
                assert_eq!(detail.as_deref(), Some("docker build failed"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(engine.submitted(), vec!["build"]);
    }

    #[tokio::test]
    async fn test_timed_out_build_stops_sequence() {
        let engine = Arc::new(
            ScriptedEngine::default()
                .with_script("build", vec![EngineStatus::new(RemoteStatus::Running)])
                .with_script("main", vec![EngineStatus::new(RemoteStatus::Succeeded)]),
        );
        let driver = driver(&engine);

        let result = build_then_run(
            &driver,
            &artifact("build", &[]),
            &BTreeMap::new(),
            &artifact("main", &[]),
            &BTreeMap::new(),
            Duration::from_millis(15),
        )
        .await;

        assert!(matches!(
            result,
            Err(PipewrightError::PrerequisiteNotSucceeded { ref status, .. }) if status == "timed out"
        ));
        assert_eq!(engine.submitted(), vec!["build"]);
    }

    #[tokio::test]
    async fn test_successful_build_runs_main() {
        let engine = Arc::new(
            ScriptedEngine::default()
                .with_script(
                    "build",
                    vec![
                        EngineStatus::new(RemoteStatus::Running),
                        EngineStatus::new(RemoteStatus::Succeeded),
                    ],
                )
                .with_script("main", vec![EngineStatus::new(RemoteStatus::Succeeded)]),
        );
        let driver = driver(&engine);
        let main = artifact("main", &[("import-from", None)]);
        let bindings = BTreeMap::from([("import-from".to_string(), "s3://bucket/d".to_string())]);

        let outcome = build_then_run(
            &driver,
            &artifact("build", &[]),
            &BTreeMap::new(),
            &main,
            &bindings,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(outcome.build.status, RunStatus::Succeeded);
        assert_eq!(outcome.main.status, RunStatus::Succeeded);
        assert_eq!(engine.submitted(), vec!["build", "main"]);
    }

    #[tokio::test]
    async fn test_missing_main_parameter_skips_build() {
        let engine = Arc::new(
            ScriptedEngine::default()
                .with_script("build", vec![EngineStatus::new(RemoteStatus::Succeeded)]),
        );
        let driver = driver(&engine);

        let result = build_then_run(
            &driver,
            &artifact("build", &[]),
            &BTreeMap::new(),
            &artifact("main", &[("dataset-md5", None)]),
            &BTreeMap::new(),
            Duration::from_secs(1),
        )
        .await;

        assert!(matches!(result, Err(PipewrightError::MissingParameter { .. })));
        assert!(engine.submitted().is_empty());
    }
}
