// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! # pipewright - pipeline compiler and run driver
//!
//! `pipewright` turns a declared graph of processing steps into a portable,
//! versioned workflow artifact and drives runs of that artifact on an
//! execution engine.
//!
//! ## Features
//!
//! - **Pipeline graphs** - steps, ordering constraints and typed parameters, checked for cycles
//! - **Deterministic compilation** - the same graph always yields byte-identical artifacts
//! - **Run driver** - submit, poll with backoff, wait with a local timeout
//! - **Build then run** - an image build pipeline gates the pipeline that uses it
//!
//! ## Quick Start
//!
//! ```bash
//! # Check a pipeline definition
//! pipewright validate pipeline.yaml
//!
//! # Compile it
//! pipewright compile pipeline.yaml -o artifact.json
//!
//! # Run it locally
//! pipewright run artifact.json --param import-from=https://example.org/data.zip
//! ```

pub mod cli;
pub mod compiler;
pub mod config;
pub mod digest;
pub mod driver;
pub mod engine;
pub mod errors;
pub mod pipeline;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use compiler::{CompiledArtifact, Compiler, CompilerOptions};
pub use config::OrchestratorConfig;
pub use driver::{Run, RunDriver, RunStatus};
pub use engine::{ExecutionEngine, LocalEngine, RunId};
pub use errors::{PipewrightError, PipewrightResult};
pub use pipeline::{FinalizedGraph, PipelineGraph, StepDescriptor};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
