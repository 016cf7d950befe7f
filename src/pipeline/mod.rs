// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Pipeline definitions and graphs
//!
//! Step descriptors and parameters, the graph builder that checks them, and
//! the immutable graph snapshot handed to the compiler.

mod dag;
mod definition;
mod validation;

pub use dag::{FinalizedGraph, PipelineGraph};
pub use definition::*;
pub use validation::{PipelineValidator, ValidationResult};
