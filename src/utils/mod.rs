// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Utility modules
//!
//! Terminal output helpers for the pipewright CLI.

pub mod output;
pub mod spinner;

pub use output::*;
pub use spinner::*;
