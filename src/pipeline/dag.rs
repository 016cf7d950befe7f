// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Pipeline graph builder
//!
//! Accumulates parameters and steps into a directed acyclic graph. Edges run
//! from a predecessor to the step that waits on it. Every reference is
//! checked when it is declared; acyclicity is checked once, at
//! [`PipelineGraph::finalize`].

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::OnceLock;

use crate::errors::PipewrightError;
use crate::pipeline::{ParamType, ParameterDecl, StepDescriptor};

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("valid identifier regex"))
}

fn check_identifier(kind: &str, value: &str) -> Result<(), PipewrightError> {
    if identifier_pattern().is_match(value) {
        Ok(())
    } else {
        Err(PipewrightError::InvalidPipeline {
            reason: format!("{} name '{}' is not a valid identifier", kind, value),
            help: Some("Use letters, digits, '-' and '_', starting with a letter".into()),
        })
    }
}

/// Mutable pipeline graph under construction
#[derive(Debug, Clone)]
pub struct PipelineGraph {
    name: String,
    description: Option<String>,
    parameters: Vec<ParameterDecl>,
    steps: Vec<StepDescriptor>,
    graph: DiGraph<String, ()>,
    id_to_index: HashMap<String, NodeIndex>,
    snapshot: Option<FinalizedGraph>,
}

impl PipelineGraph {
    /// Create an empty pipeline graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: Vec::new(),
            steps: Vec::new(),
            graph: DiGraph::new(),
            id_to_index: HashMap::new(),
            snapshot: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether [`finalize`](Self::finalize) has succeeded
    pub fn is_finalized(&self) -> bool {
        self.snapshot.is_some()
    }

    /// The finalized snapshot, if any
    pub fn snapshot(&self) -> Option<&FinalizedGraph> {
        self.snapshot.as_ref()
    }

    fn ensure_mutable(&self) -> Result<(), PipewrightError> {
        if self.is_finalized() {
            return Err(PipewrightError::GraphFinalized {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Register a pipeline parameter
    pub fn declare_parameter(
        &mut self,
        name: impl Into<String>,
        declared_type: ParamType,
        default: Option<String>,
    ) -> Result<(), PipewrightError> {
        self.ensure_mutable()?;
        let name = name.into();
        check_identifier("Parameter", &name)?;

        if self.parameters.iter().any(|p| p.name == name) {
            return Err(PipewrightError::DuplicateParameter { name });
        }

        self.parameters.push(ParameterDecl {
            name,
            declared_type,
            default,
        });
        Ok(())
    }

    /// Insert a step; all predecessors and parameter references must already exist
    pub fn add_step(&mut self, mut step: StepDescriptor) -> Result<(), PipewrightError> {
        self.ensure_mutable()?;
        check_identifier("Step", &step.id)?;

        if self.id_to_index.contains_key(&step.id) {
            return Err(PipewrightError::DuplicateStep { id: step.id });
        }

        for predecessor in &step.predecessors {
            if !self.id_to_index.contains_key(predecessor) {
                return Err(PipewrightError::UnknownPredecessor {
                    step: step.id.clone(),
                    predecessor: predecessor.clone(),
                });
            }
        }

        for parameter in step.parameter_refs() {
            if !self.parameters.iter().any(|p| p.name == parameter) {
                return Err(PipewrightError::UnknownParameterReference {
                    step: step.id.clone(),
                    parameter: parameter.to_string(),
                });
            }
        }

        let mut seen = HashSet::new();
        step.predecessors.retain(|p| seen.insert(p.clone()));

        let node = self.graph.add_node(step.id.clone());
        for predecessor in &step.predecessors {
            self.graph.add_edge(self.id_to_index[predecessor], node, ());
        }

        self.id_to_index.insert(step.id.clone(), node);
        self.steps.push(step);
        Ok(())
    }

    /// Declare an extra edge between two existing steps
    ///
    /// This is the only way to close a loop; the loop is reported by
    /// [`finalize`](Self::finalize).
    pub fn add_dependency(&mut self, step: &str, predecessor: &str) -> Result<(), PipewrightError> {
        self.ensure_mutable()?;

        let step_node = *self
            .id_to_index
            .get(step)
            .ok_or_else(|| PipewrightError::UnknownStep { id: step.to_string() })?;
        let pred_node = *self.id_to_index.get(predecessor).ok_or_else(|| {
            PipewrightError::UnknownPredecessor {
                step: step.to_string(),
                predecessor: predecessor.to_string(),
            }
        })?;

        if !self.graph.contains_edge(pred_node, step_node) {
            self.graph.add_edge(pred_node, step_node, ());
            self.steps[step_node.index()]
                .predecessors
                .push(predecessor.to_string());
        }

        Ok(())
    }

    /// Check acyclicity and seal the graph
    pub fn finalize(&mut self) -> Result<FinalizedGraph, PipewrightError> {
        if let Some(ref snapshot) = self.snapshot {
            return Ok(snapshot.clone());
        }

        if let Err(cycle) = toposort(&self.graph, None) {
            return Err(PipewrightError::CycleDetected {
                cycle: self.find_cycle(cycle.node_id()),
            });
        }

        let snapshot = FinalizedGraph {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
            steps: self.steps.clone(),
            graph: self.graph.clone(),
            id_to_index: self.id_to_index.clone(),
        };
        self.snapshot = Some(snapshot.clone());

        tracing::debug!(
            pipeline = %self.name,
            steps = self.steps.len(),
            "pipeline graph finalized"
        );

        Ok(snapshot)
    }

    /// Shortest path from `start` back to itself, as step ids
    fn find_cycle(&self, start: NodeIndex) -> Vec<String> {
        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if next == start {
                    let mut path = vec![node];
                    let mut current = node;
                    while current != start {
                        current = parent[&current];
                        path.push(current);
                    }
                    path.reverse();
                    path.push(start);
                    return path.into_iter().map(|n| self.graph[n].clone()).collect();
                }
                if visited.insert(next) {
                    parent.insert(next, node);
                    queue.push_back(next);
                }
            }
        }

        vec![self.graph[start].clone()]
    }
}

/// Immutable, acyclic pipeline graph
#[derive(Debug, Clone)]
pub struct FinalizedGraph {
    name: String,
    description: Option<String>,
    parameters: Vec<ParameterDecl>,
    steps: Vec<StepDescriptor>,
    graph: DiGraph<String, ()>,
    id_to_index: HashMap<String, NodeIndex>,
}

impl FinalizedGraph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Parameters in declaration order
    pub fn parameters(&self) -> &[ParameterDecl] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDecl> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Steps in declaration order
    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    pub fn step(&self, id: &str) -> Option<&StepDescriptor> {
        self.id_to_index.get(id).map(|n| &self.steps[n.index()])
    }

    /// Steps ordered so every step follows its predecessors
    ///
    /// Ties are broken by declaration order, so the result is stable.
    pub fn topological_order(&self) -> Vec<&StepDescriptor> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| self.graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(self.steps.len());
        while let Some(idx) = ready.pop_first() {
            order.push(&self.steps[idx]);
            for next in self
                .graph
                .neighbors_directed(NodeIndex::new(idx), Direction::Outgoing)
            {
                in_degree[next.index()] -= 1;
                if in_degree[next.index()] == 0 {
                    ready.insert(next.index());
                }
            }
        }

        order
    }

    /// Direct predecessors of a step, in declaration order
    pub fn dependencies(&self, id: &str) -> Option<Vec<String>> {
        self.step(id).map(|s| s.predecessors.clone())
    }

    /// Steps that directly wait on `id`, in declaration order
    pub fn dependents(&self, id: &str) -> Option<Vec<String>> {
        self.id_to_index.get(id)?;
        Some(
            self.steps
                .iter()
                .filter(|s| s.predecessors.iter().any(|p| p == id))
                .map(|s| s.id.clone())
                .collect(),
        )
    }

    /// Check if step A depends (directly or transitively) on step B
    pub fn depends_on(&self, step_a: &str, step_b: &str) -> bool {
        let Some(node_a) = self.id_to_index.get(step_a) else {
            return false;
        };
        let Some(node_b) = self.id_to_index.get(step_b) else {
            return false;
        };

        node_a != node_b && has_path_connecting(&self.graph, *node_b, *node_a, None)
    }

    /// Steps with no predecessors
    pub fn roots(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.predecessors.is_empty())
            .map(|s| s.id.as_str())
            .collect()
    }

    /// Generate Mermaid diagram of the DAG
    pub fn to_mermaid(&self) -> String {
        let node_id = |id: &str| id.replace('-', "_");
        let mut out = String::from("graph TD\n");

        for step in &self.steps {
            out.push_str(&format!("    {}[{}]\n", node_id(&step.id), step.id));
        }

        for step in &self.steps {
            for pred in &step.predecessors {
                out.push_str(&format!("    {} --> {}\n", node_id(pred), node_id(&step.id)));
            }
        }

        out
    }

    /// Generate DOT diagram of the DAG
    pub fn to_dot(&self) -> String {
        let mut out = format!("digraph \"{}\" {{\n", self.name);
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for step in &self.steps {
            out.push_str(&format!("    \"{}\";\n", step.id));
        }

        for step in &self.steps {
            for pred in &step.predecessors {
                out.push_str(&format!("    \"{}\" -> \"{}\";\n", pred, step.id));
            }
        }

        out.push_str("}\n");
        out
    }

    /// Generate text representation of the execution order
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        for (i, step) in self.topological_order().into_iter().enumerate() {
            out.push_str(&format!("{}. {} ({})", i + 1, step.id, step.executable));

            if !step.predecessors.is_empty() {
                out.push_str(&format!(" [after: {}]", step.predecessors.join(", ")));
            }

            out.push('\n');
        }

        out
    }
}
