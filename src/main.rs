// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! pipewright - pipeline compiler and run driver

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pipewright::cli::run::RunOptions;
use pipewright::cli::{Cli, Commands};
use pipewright::config::OrchestratorConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; -v also shows step output
    let default_filter = if cli.verbose {
        "pipewright=debug"
    } else {
        "pipewright=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    let config = OrchestratorConfig::load(cli.config.as_deref())?;

    // Dispatch to command handlers
    match cli.command {
        Commands::Validate { pipeline } => {
            pipewright::cli::validate::run(pipeline, cli.verbose).await
        }
        Commands::Graph { pipeline, format } => {
            pipewright::cli::graph::run(pipeline, format, cli.verbose).await
        }
        Commands::Compile { pipeline, output } => {
            pipewright::cli::compile::run(pipeline, output, &config, cli.verbose).await
        }
        Commands::Run {
            pipeline,
            params,
            build,
            build_params,
            timeout,
            no_stage,
        } => {
            let options = RunOptions {
                params,
                build,
                build_params,
                timeout,
                no_stage,
            };
            pipewright::cli::run::run(pipeline, options, &config, cli.verbose).await
        }
    }
}
