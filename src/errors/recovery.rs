// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for recovering from errors.

use super::PipewrightError;

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Suggest fixing a circular dependency
    pub fn fix_cycle(cycle: &[String]) -> Self {
        Self {
            action: "Remove circular dependency".into(),
            steps: vec![
                format!("Detected cycle: {}", cycle.join(" → ")),
                "Remove one of the `after` edges that closes the loop".into(),
                "Steps must form a directed acyclic graph (DAG)".into(),
            ],
            commands: vec![
                "# Visualize your pipeline:".into(),
                "pipewright graph <pipeline.yaml> --format mermaid".into(),
            ],
        }
    }

    /// Suggest binding a required parameter
    pub fn bind_parameter(name: &str) -> Self {
        Self {
            action: format!("Provide a value for '{}'", name),
            steps: vec![
                format!("Parameter '{}' is declared without a default", name),
                "Every such parameter must be bound at submission".into(),
            ],
            commands: vec![format!("pipewright run <pipeline> --param {}=<value>", name)],
        }
    }

    /// Explain what a locally timed-out wait means for the run
    ///
    /// `detached` tells whether the engine keeps the run going after
    /// pipewright exits.
    pub fn resume_timed_out(run_id: &str, detached: bool) -> Self {
        if detached {
            return Self {
                action: format!("Run '{}' is still executing on the engine", run_id),
                steps: vec![
                    "Only the local wait gave up; the run was not cancelled".into(),
                    "Increase --timeout to wait for it to finish".into(),
                ],
                commands: vec![],
            };
        }

        Self {
            action: format!("Run '{}' stops when pipewright exits", run_id),
            steps: vec![
                "The local engine runs steps inside this process".into(),
                "Steps still running are killed and later steps never start".into(),
                "Increase --timeout or [driver] timeout_secs to let the run finish".into(),
            ],
            commands: vec!["pipewright run <pipeline> --timeout <seconds>".into()],
        }
    }

    /// Pick a suggestion for an error, if one applies
    pub fn for_error(error: &PipewrightError) -> Option<Self> {
        match error {
            PipewrightError::CycleDetected { cycle } => Some(Self::fix_cycle(cycle)),
            PipewrightError::MissingParameter { name } => Some(Self::bind_parameter(name)),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}
