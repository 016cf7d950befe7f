// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Run command - submit a pipeline and wait for it

use colored::Colorize;
use miette::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::compile::compile_file;
use super::{is_artifact, load_artifact};
use crate::compiler::CompiledArtifact;
use crate::config::OrchestratorConfig;
use crate::driver::{build_then_run, Run, RunDriver, RunStatus};
use crate::engine::{ExecutionEngine, LocalEngine};
use crate::errors::{PipewrightError, RecoverySuggestion};
use crate::storage::{FilesystemStore, ObjectStore};
use crate::utils::{
    create_spinner, describe_run, print_error, print_info, print_success, print_suggestion,
    print_warning,
};

/// Build pipeline parameter that receives the staged context location
const BUILD_CONTEXT_PARAM: &str = "build-context";
/// Build pipeline parameter that receives the configured image reference
const IMAGE_PARAM: &str = "image";

/// Options for the run command
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub params: Vec<(String, String)>,
    pub build: Option<PathBuf>,
    pub build_params: Vec<(String, String)>,
    pub timeout: Option<u64>,
    pub no_stage: bool,
}

/// Run the pipeline
pub async fn run(
    pipeline_path: PathBuf,
    options: RunOptions,
    config: &OrchestratorConfig,
    verbose: bool,
) -> Result<()> {
    let artifact = load(&pipeline_path, config)?;
    let bindings: BTreeMap<String, String> = options.params.iter().cloned().collect();
    let timeout = options
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.driver.timeout());

    let engine = Arc::new(LocalEngine::from_config(config));
    let detached = engine.runs_outlive_caller();
    if verbose {
        print_info(&format!(
            "Local engine working in {}",
            engine.working_dir().display()
        ));
    }
    let driver = RunDriver::new(engine, config.driver.poll_policy());

    let main_run = match options.build {
        Some(ref build_path) => {
            let build = load(build_path, config)?;
            let mut build_bindings: BTreeMap<String, String> =
                options.build_params.iter().cloned().collect();

            if !options.no_stage {
                stage_context(&build, &mut build_bindings, config).await?;
            }
            if let Some(image) = config.image.reference() {
                if build.parameter(IMAGE_PARAM).is_some() {
                    build_bindings.entry(IMAGE_PARAM.to_string()).or_insert(image);
                }
            }

            println!(
                "{} {} then {}",
                "Building".bold(),
                build.name.cyan(),
                artifact.name.cyan()
            );

            let spinner = create_spinner(&format!("Running '{}'", build.name));
            let outcome = tokio::select! {
                result = build_then_run(&driver, &build, &build_bindings, &artifact, &bindings, timeout) => result,
                _ = tokio::signal::ctrl_c() => {
                    spinner.finish_and_clear();
                    return Err(interrupted(None, detached));
                }
            };
            spinner.finish_and_clear();

            match outcome {
                Ok(outcome) => {
                    print_success(&describe_run("build", &outcome.build));
                    outcome.main
                }
                Err(e) => {
                    if let PipewrightError::PrerequisiteNotSucceeded { ref run_id, .. } = e {
                        print_error(&format!("build run {} did not succeed", run_id));
                    }
                    print_suggestion(&e);
                    return Err(e.into());
                }
            }
        }
        None => {
            let submitted = driver.submit(&artifact, &bindings).await.map_err(|e| {
                print_suggestion(&e);
                e
            })?;
            print_info(&format!("Submitted run {}", submitted.id.as_str().bold()));

            let spinner = create_spinner(&format!("Running '{}'", artifact.name));
            let run = tokio::select! {
                result = driver.await_completion(&submitted.id, timeout) => result,
                _ = tokio::signal::ctrl_c() => {
                    spinner.finish_and_clear();
                    return Err(interrupted(Some(&submitted), detached));
                }
            };
            spinner.finish_and_clear();
            run?
        }
    };

    report(&main_run, detached, verbose)
}

/// Compiled artifact for either a pipeline file or an artifact file
fn load(path: &Path, config: &OrchestratorConfig) -> Result<CompiledArtifact> {
    if is_artifact(path) {
        load_artifact(path)
    } else {
        compile_file(path, config)
    }
}

/// Upload the build context and bind its location for the build pipeline
async fn stage_context(
    build: &CompiledArtifact,
    bindings: &mut BTreeMap<String, String>,
    config: &OrchestratorConfig,
) -> Result<()> {
    let Some(ref destination) = config.build.destination else {
        tracing::debug!("no build destination configured; skipping staging");
        return Ok(());
    };

    let exclusions = config.build.exclusions()?;
    let report = FilesystemStore::new()
        .upload(&config.build.context, destination, &exclusions)
        .await?;

    print_success(&format!(
        "Staged {} files to {} ({} excluded)",
        report.uploaded.len(),
        destination,
        report.skipped.len()
    ));

    if build.parameter(BUILD_CONTEXT_PARAM).is_some() {
        bindings
            .entry(BUILD_CONTEXT_PARAM.to_string())
            .or_insert_with(|| destination.clone());
    }

    Ok(())
}

fn interrupted(run: Option<&Run>, detached: bool) -> miette::Report {
    let what = match run {
        Some(run) => format!("run {}", run.id.as_str()),
        None => "submitted runs".to_string(),
    };
    if detached {
        miette::miette!("Interrupted; {} not cancelled on the engine", what)
    } else {
        miette::miette!("Interrupted; {} stopped with this process", what)
    }
}

fn report(run: &Run, detached: bool, verbose: bool) -> Result<()> {
    match run.status {
        RunStatus::Succeeded => {
            print_success(&describe_run("pipeline", run));
            if verbose {
                for (name, value) in &run.parameter_bindings {
                    println!("    {} = {}", name, value.dimmed());
                }
            }
            Ok(())
        }
        RunStatus::TimedOut => {
            print_warning(&describe_run("pipeline", run));
            eprintln!();
            eprint!(
                "{}",
                RecoverySuggestion::resume_timed_out(run.id.as_str(), detached)
                    .to_string()
                    .cyan()
            );
            Ok(())
        }
        _ => {
            print_error(&describe_run("pipeline", run));
            if let Some(ref detail) = run.error_detail {
                eprintln!("    {}", detail.dimmed());
            }
            Err(miette::miette!("Pipeline run {} failed", run.id.as_str()))
        }
    }
}
