// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Compile command - write a workflow artifact

use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::load_pipeline;
use crate::compiler::{CompiledArtifact, Compiler, CompilerOptions};
use crate::config::OrchestratorConfig;
use crate::utils::print_suggestion;

/// Load, finalize and compile a pipeline file
pub(crate) fn compile_file(path: &Path, config: &OrchestratorConfig) -> Result<CompiledArtifact> {
    let graph = load_pipeline(path)?.into_graph().map_err(|e| {
        print_suggestion(&e);
        e
    })?;

    Ok(Compiler::new(CompilerOptions::from_config(config)).compile(&graph)?)
}

/// Run the compile command
pub async fn run(
    pipeline_path: PathBuf,
    output: Option<PathBuf>,
    config: &OrchestratorConfig,
    verbose: bool,
) -> Result<()> {
    let artifact = compile_file(&pipeline_path, config)?;

    match output {
        Some(path) => {
            artifact.write_to(&path)?;
            eprintln!(
                "  {} Compiled '{}' ({} tasks) to {}",
                "✓".green(),
                artifact.name,
                artifact.tasks.len(),
                path.display()
            );
            eprintln!("  {} {}", "digest".dimmed(), artifact.digest()?);
        }
        None => {
            std::io::stdout()
                .write_all(&artifact.to_bytes()?)
                .into_diagnostic()?;
        }
    }

    if verbose {
        let required: Vec<&str> = artifact
            .required_parameters()
            .map(|p| p.name.as_str())
            .collect();
        if !required.is_empty() {
            eprintln!("  Required parameters: {}", required.join(", "));
        }
    }

    Ok(())
}
