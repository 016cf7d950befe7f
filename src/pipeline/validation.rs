// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Pipeline validation
//!
//! Collects the problems of a pipeline file in one pass. A rejected parameter
//! or step is reported and skipped so later definitions are still checked;
//! steps that depend on a skipped step are reported as unknown predecessors.
//! Cycle and per-step checks run only once every definition was accepted.

use std::collections::HashSet;

use crate::errors::PipewrightError;
use crate::pipeline::{FinalizedGraph, PipelineFile, PipelineGraph};

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a pipeline file
    ///
    /// Returns the finalized graph alongside the report when the graph builds.
    pub fn validate(file: &PipelineFile) -> (ValidationResult, Option<FinalizedGraph>) {
        let mut result = ValidationResult::new();

        if file.steps.is_empty() {
            result.add_error("Pipeline has no steps defined");
        }

        let mut builder = PipelineGraph::new(&file.name);
        if let Some(ref description) = file.description {
            builder = builder.with_description(description);
        }

        let mut accepted = true;
        for param in &file.parameters {
            if let Err(e) =
                builder.declare_parameter(&param.name, param.declared_type, param.default.clone())
            {
                result.add_error(&Self::describe(&e));
                accepted = false;
            }
        }
        for step in &file.steps {
            if let Err(e) = builder.add_step(step.clone()) {
                result.add_error(&Self::describe(&e));
                accepted = false;
            }
        }

        let graph = if accepted {
            match builder.finalize() {
                Ok(graph) => Some(graph),
                Err(e) => {
                    result.add_error(&Self::describe(&e));
                    None
                }
            }
        } else {
            None
        };

        if let Some(ref graph) = graph {
            Self::check_parameters(graph, &mut result);
            Self::check_steps(graph, &mut result);
        }

        (result, graph)
    }

    fn describe(error: &PipewrightError) -> String {
        match error {
            PipewrightError::CycleDetected { cycle } => {
                format!("Circular dependency: {}", cycle.join(" → "))
            }
            other => other.to_string(),
        }
    }

    /// Unused and required parameters
    fn check_parameters(graph: &FinalizedGraph, result: &mut ValidationResult) {
        let referenced: HashSet<&str> = graph
            .steps()
            .iter()
            .flat_map(|s| s.parameter_refs())
            .collect();

        for param in graph.parameters() {
            if !referenced.contains(param.name.as_str()) {
                result.add_warning(&format!(
                    "Parameter '{}' is declared but never referenced",
                    param.name
                ));
            }
            if param.is_required() {
                result.required_parameters.push(param.name.clone());
            }
        }
    }

    fn check_steps(graph: &FinalizedGraph, result: &mut ValidationResult) {
        for step in graph.steps() {
            if step.executable.trim().is_empty() {
                result.add_error(&format!("Step '{}': executable is empty", step.id));
            }

            if let Some(accelerator) = step.resources.as_ref().and_then(|r| r.accelerator.as_ref()) {
                result.add_warning(&format!(
                    "Step '{}': accelerator '{}' cannot be compiled into the artifact format",
                    step.id, accelerator
                ));
            }
        }
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Parameters that must be bound at submission
    pub required_parameters: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
