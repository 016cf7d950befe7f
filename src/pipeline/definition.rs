// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Pipeline definition structures
//!
//! Step descriptors, parameter declarations and the YAML pipeline file
//! schema that feeds the graph builder.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::PipewrightError;
use crate::pipeline::{FinalizedGraph, PipelineGraph};

/// One unit of work within a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDescriptor {
    /// Step id (must be unique within pipeline)
    pub id: String,

    /// Script or program the step runs
    pub executable: String,

    /// Execution image; falls back to the configured default image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Ordered argument list
    #[serde(default, rename = "args")]
    pub arguments: Vec<Argument>,

    /// Steps that must succeed before this one starts
    #[serde(default, rename = "after")]
    pub predecessors: Vec<String>,

    /// Resource hints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceHints>,
}

impl StepDescriptor {
    /// Create a step with no arguments or predecessors
    pub fn new(id: impl Into<String>, executable: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            executable: executable.into(),
            image: None,
            arguments: Vec::new(),
            predecessors: Vec::new(),
            resources: None,
        }
    }

    /// Append a literal argument
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.arguments.push(Argument::Literal(value.into()));
        self
    }

    /// Append a parameter reference argument
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.arguments.push(Argument::param(name));
        self
    }

    /// Declare a predecessor
    pub fn after(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !self.predecessors.contains(&id) {
            self.predecessors.push(id);
        }
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_resources(mut self, resources: ResourceHints) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Names of all parameters referenced by this step's arguments
    pub fn parameter_refs(&self) -> impl Iterator<Item = &str> {
        self.arguments.iter().filter_map(Argument::parameter)
    }
}

/// A step argument: either a literal string or a pipeline parameter reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Argument {
    /// Literal string passed through as-is
    Literal(String),

    /// Reference to a declared pipeline parameter
    Param {
        /// Parameter name
        param: String,
    },
}

impl Argument {
    /// Build a parameter reference
    pub fn param(name: impl Into<String>) -> Self {
        Self::Param { param: name.into() }
    }

    /// Referenced parameter name, if this is a reference
    pub fn parameter(&self) -> Option<&str> {
        match self {
            Self::Literal(_) => None,
            Self::Param { param } => Some(param),
        }
    }
}

/// Resource hints for a step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHints {
    /// CPU quantity, e.g. `500m` or `2`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,

    /// Memory quantity, e.g. `512Mi` or `4Gi`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,

    /// Accelerator request, e.g. `nvidia-tesla-t4`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerator: Option<String>,
}

impl ResourceHints {
    pub fn cpu(mut self, cpu: impl Into<String>) -> Self {
        self.cpu = Some(cpu.into());
        self
    }

    pub fn memory(mut self, memory: impl Into<String>) -> Self {
        self.memory = Some(memory.into());
        self
    }

    pub fn accelerator(mut self, accelerator: impl Into<String>) -> Self {
        self.accelerator = Some(accelerator.into());
        self
    }
}

/// Declared type of a pipeline parameter
///
/// Values are always passed as strings; the type is carried into the
/// compiled artifact as metadata.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Boolean => write!(f, "boolean"),
        }
    }
}

/// A named pipeline parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDecl {
    /// Parameter name
    pub name: String,

    /// Declared type
    #[serde(default, rename = "type")]
    pub declared_type: ParamType,

    /// Default value; parameters without one must be bound at submission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ParameterDecl {
    /// Whether a value must be supplied at submission
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Pipeline file (YAML)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineFile {
    /// Pipeline name
    pub name: String,

    /// Pipeline description
    #[serde(default)]
    pub description: Option<String>,

    /// Declared parameters
    #[serde(default)]
    pub parameters: Vec<ParameterDecl>,

    /// Steps in declaration order
    #[serde(default)]
    pub steps: Vec<StepDescriptor>,
}

impl PipelineFile {
    /// Load pipeline from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, PipewrightError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| PipewrightError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        Self::from_yaml(&content)
    }

    /// Parse pipeline from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, PipewrightError> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Serialize pipeline to YAML
    pub fn to_yaml(&self) -> Result<String, PipewrightError> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Build the graph in file order (parameters first, then steps)
    pub fn to_graph(&self) -> Result<PipelineGraph, PipewrightError> {
        let mut graph = PipelineGraph::new(&self.name);
        if let Some(ref description) = self.description {
            graph = graph.with_description(description);
        }

        for param in &self.parameters {
            graph.declare_parameter(&param.name, param.declared_type, param.default.clone())?;
        }

        for step in &self.steps {
            graph.add_step(step.clone())?;
        }

        Ok(graph)
    }

    /// Build and finalize the graph
    pub fn into_graph(self) -> Result<FinalizedGraph, PipewrightError> {
        self.to_graph()?.finalize()
    }
}
