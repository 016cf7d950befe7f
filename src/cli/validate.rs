// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Validate command - check a pipeline definition

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::load_pipeline;
use crate::pipeline::PipelineValidator;

/// Run the validate command
pub async fn run(pipeline_path: PathBuf, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    let file = match load_pipeline(&pipeline_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("  {} Failed to parse pipeline", "✗".red());
            eprintln!();
            return Err(e);
        }
    };

    println!("  {} Pipeline file is valid YAML", "✓".green());

    let (validation, graph) = PipelineValidator::validate(&file);

    if !validation.errors.is_empty() {
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    if !validation.warnings.is_empty() {
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }

    if verbose {
        if let Some(ref graph) = graph {
            println!();
            println!("{}:", "Pipeline summary".bold());
            println!("  Name: {}", graph.name());
            println!("  Steps: {}", graph.steps().len());
            for step in graph.topological_order() {
                let deps = if step.predecessors.is_empty() {
                    String::new()
                } else {
                    format!(" [after: {}]", step.predecessors.join(", "))
                };
                println!("    - {} ({}){}", step.id, step.executable, deps.dimmed());
            }
            if !validation.required_parameters.is_empty() {
                println!(
                    "  Required parameters: {}",
                    validation.required_parameters.join(", ")
                );
            }
        }
    }

    println!();

    if !validation.is_valid() {
        return Err(miette::miette!("Pipeline validation failed"));
    }

    if validation.has_warnings() {
        println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
    } else {
        println!("{}", "Pipeline is valid!".green().bold());
    }

    Ok(())
}
