// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for pipewright.

pub mod compile;
pub mod graph;
pub mod run;
pub mod validate;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::compiler::CompiledArtifact;
use crate::pipeline::PipelineFile;

/// Default pipeline file name
pub const DEFAULT_PIPELINE: &str = "pipeline.yaml";

/// Pipeline compiler and run driver
///
/// Declare steps and their ordering, compile them into a portable artifact,
/// and follow runs to completion.
#[derive(Parser, Debug)]
#[clap(
    name = "pipewright",
    version,
    about = "Compile pipeline graphs into workflow artifacts and drive their runs",
    long_about = None,
    after_help = "Examples:\n\
        pipewright validate pipeline.yaml             Check a pipeline definition\n\
        pipewright graph pipeline.yaml -f mermaid     Draw the step graph\n\
        pipewright compile pipeline.yaml -o out.json  Write the compiled artifact\n\
        pipewright run pipeline.yaml --param k=v      Submit and wait for a run\n\n\
        See 'pipewright <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Configuration file (defaults to ./pipewright.toml, then the user config dir)
    #[clap(long, global = true, env = "PIPEWRIGHT_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a pipeline definition
    Validate {
        /// Pipeline file to validate
        #[clap(default_value = DEFAULT_PIPELINE)]
        pipeline: PathBuf,
    },

    /// Show a pipeline as a graph
    Graph {
        /// Pipeline file
        #[clap(default_value = DEFAULT_PIPELINE)]
        pipeline: PathBuf,

        /// Output format
        #[clap(short, long, default_value = "text")]
        format: GraphFormat,
    },

    /// Compile a pipeline into a workflow artifact
    Compile {
        /// Pipeline file
        #[clap(default_value = DEFAULT_PIPELINE)]
        pipeline: PathBuf,

        /// Artifact output file (default: stdout)
        #[clap(short, long)]
        output: Option<PathBuf>,
    },

    /// Submit a pipeline or compiled artifact and wait for the run
    Run {
        /// Pipeline file (.yaml) or compiled artifact (.json)
        #[clap(default_value = DEFAULT_PIPELINE)]
        pipeline: PathBuf,

        /// Parameter binding, repeatable
        #[clap(short, long = "param", value_name = "NAME=VALUE", value_parser = parse_binding)]
        params: Vec<(String, String)>,

        /// Image build pipeline that must succeed first
        #[clap(long, value_name = "PIPELINE")]
        build: Option<PathBuf>,

        /// Parameter binding for the build pipeline, repeatable
        #[clap(long = "build-param", value_name = "NAME=VALUE", value_parser = parse_binding)]
        build_params: Vec<(String, String)>,

        /// Seconds to wait for each run (default from configuration)
        #[clap(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Do not stage the build context before the build pipeline
        #[clap(long)]
        no_stage: bool,
    },
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

impl std::str::FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "dot" => Ok(Self::Dot),
            "mermaid" => Ok(Self::Mermaid),
            _ => Err(format!("Unknown graph format: {}", s)),
        }
    }
}

/// Parse a `NAME=VALUE` binding; the value may itself contain `=`
pub fn parse_binding(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", s)),
    }
}

/// Load a pipeline file, failing with a hint when it does not exist
pub(crate) fn load_pipeline(path: &Path) -> miette::Result<PipelineFile> {
    if !path.exists() {
        return Err(miette::miette!(
            "Pipeline file not found: {}\n\n\
             Pass the path of a pipeline YAML file.",
            path.display()
        ));
    }

    Ok(PipelineFile::from_file(path)?)
}

/// Whether `path` names a compiled artifact rather than a pipeline definition
pub(crate) fn is_artifact(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}

/// Load a compiled artifact file
pub(crate) fn load_artifact(path: &Path) -> miette::Result<CompiledArtifact> {
    if !path.exists() {
        return Err(miette::miette!("Artifact file not found: {}", path.display()));
    }

    Ok(CompiledArtifact::from_file(path)?)
}
