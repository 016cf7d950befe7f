// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Styled terminal output

use colored::Colorize;

use crate::driver::{Run, RunStatus};
use crate::errors::{PipewrightError, RecoverySuggestion};

/// Print a success check
pub fn print_success(msg: &str) {
    eprintln!("  {} {}", "✓".green(), msg);
}

/// Print an error cross
pub fn print_error(msg: &str) {
    eprintln!("  {} {}", "✗".red(), msg);
}

/// Print a warning
pub fn print_warning(msg: &str) {
    eprintln!("  {} {}", "⚠".yellow(), msg);
}

/// Print an info item
pub fn print_info(msg: &str) {
    eprintln!("  {} {}", "→".blue(), msg);
}

/// Print a recovery suggestion for `error`, if there is one
pub fn print_suggestion(error: &PipewrightError) {
    if let Some(suggestion) = RecoverySuggestion::for_error(error) {
        eprintln!();
        eprint!("{}", suggestion.to_string().cyan());
    }
}

/// One-line summary of a run's status
pub fn describe_run(label: &str, run: &Run) -> String {
    let status = match run.status {
        RunStatus::Succeeded => run.status.to_string().green(),
        RunStatus::Failed => run.status.to_string().red(),
        RunStatus::TimedOut => run.status.to_string().yellow(),
        RunStatus::Pending | RunStatus::Running => run.status.to_string().blue(),
    };

    let elapsed = run
        .finished_at
        .and_then(|end| end.duration_since(run.started_at).ok())
        .map(|d| format!(" in {:.1}s", d.as_secs_f64()))
        .unwrap_or_default();

    format!("{} run {} {}{}", label, run.id.as_str().bold(), status, elapsed)
}
