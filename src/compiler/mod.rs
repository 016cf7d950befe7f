// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Pipeline compiler
//!
//! Turns a finalized [`FinalizedGraph`] into a [`CompiledArtifact`]. The
//! output depends only on the graph and the [`CompilerOptions`]: compiling
//! the same graph twice yields byte-identical artifacts.

mod artifact;

pub use artifact::{
    placeholder, placeholder_name, ArtifactParameter, ArtifactResources, ArtifactTask,
    ArtifactVolume, CompiledArtifact, ARTIFACT_FORMAT,
};

use regex::Regex;
use std::sync::OnceLock;

use crate::config::OrchestratorConfig;
use crate::errors::{PipewrightError, PipewrightResult};
use crate::pipeline::{Argument, FinalizedGraph, PipelineGraph, ResourceHints, StepDescriptor};

/// Anything the compiler can take a finalized graph from
pub trait Compilable {
    fn finalized_graph(&self) -> PipewrightResult<&FinalizedGraph>;
}

impl Compilable for FinalizedGraph {
    fn finalized_graph(&self) -> PipewrightResult<&FinalizedGraph> {
        Ok(self)
    }
}

impl Compilable for PipelineGraph {
    fn finalized_graph(&self) -> PipewrightResult<&FinalizedGraph> {
        self.snapshot().ok_or_else(|| PipewrightError::NotFinalized {
            name: self.name().to_string(),
        })
    }
}

/// Settings that flow into every compiled artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Image for steps that do not name one
    pub default_image: Option<String>,
    pub volume_name: String,
    pub mount_path: String,
}

impl CompilerOptions {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            default_image: config.image.reference(),
            volume_name: config.volume.name.clone(),
            mount_path: config.volume.mount_path.to_string_lossy().to_string(),
        }
    }
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self::from_config(&OrchestratorConfig::default())
    }
}

fn cpu_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+(\.\d+)?m?$").expect("valid cpu regex"))
}

fn memory_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\d+(\.\d+)?(Ki|Mi|Gi|Ti|K|M|G|T)?$").expect("valid memory regex")
    })
}

/// Pipeline compiler
pub struct Compiler {
    options: CompilerOptions,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile a finalized graph into an artifact
    pub fn compile<G: Compilable + ?Sized>(&self, source: &G) -> PipewrightResult<CompiledArtifact> {
        let graph = source.finalized_graph()?;

        let order = graph.topological_order();
        if order.len() != graph.steps().len() {
            return Err(PipewrightError::InvalidPipeline {
                reason: format!("pipeline '{}' has no complete execution order", graph.name()),
                help: None,
            });
        }

        let parameters = graph
            .parameters()
            .iter()
            .map(|p| ArtifactParameter {
                name: p.name.clone(),
                param_type: p.declared_type,
                default: p.default.clone(),
            })
            .collect();

        let tasks = order
            .into_iter()
            .map(|step| self.compile_step(step))
            .collect::<PipewrightResult<Vec<_>>>()?;

        let artifact = CompiledArtifact {
            format: ARTIFACT_FORMAT.to_string(),
            name: graph.name().to_string(),
            description: graph.description().map(str::to_string),
            parameters,
            volume: ArtifactVolume {
                name: self.options.volume_name.clone(),
                mount_path: self.options.mount_path.clone(),
            },
            tasks,
        };

        tracing::info!(
            pipeline = %artifact.name,
            tasks = artifact.tasks.len(),
            "pipeline compiled"
        );

        Ok(artifact)
    }

    fn compile_step(&self, step: &StepDescriptor) -> PipewrightResult<ArtifactTask> {
        let image = step
            .image
            .clone()
            .or_else(|| self.options.default_image.clone())
            .ok_or_else(|| {
                PipewrightError::unsupported(
                    &step.id,
                    "an implicit image",
                    "the step names no image and no default image is configured",
                )
            })?;

        let args = step
            .arguments
            .iter()
            .map(|arg| match arg {
                Argument::Literal(value) if value.contains("{{") => Err(PipewrightError::unsupported(
                    &step.id,
                    "a literal argument containing '{{'",
                    format!("'{}' would be read as a parameter placeholder", value),
                )),
                Argument::Literal(value) => Ok(value.clone()),
                Argument::Param { param } => Ok(placeholder(param)),
            })
            .collect::<PipewrightResult<Vec<_>>>()?;

        let resources = match step.resources {
            Some(ref hints) => Self::compile_resources(&step.id, hints)?,
            None => None,
        };

        Ok(ArtifactTask {
            id: step.id.clone(),
            image,
            executable: step.executable.clone(),
            args,
            dependencies: step.predecessors.clone(),
            resources,
        })
    }

    fn compile_resources(
        step: &str,
        hints: &ResourceHints,
    ) -> PipewrightResult<Option<ArtifactResources>> {
        if let Some(ref accelerator) = hints.accelerator {
            return Err(PipewrightError::unsupported(
                step,
                "an accelerator hint",
                format!("{} has no accelerator field ('{}')", ARTIFACT_FORMAT, accelerator),
            ));
        }

        if let Some(ref cpu) = hints.cpu {
            if !cpu_pattern().is_match(cpu) {
                return Err(PipewrightError::unsupported(
                    step,
                    "a cpu hint",
                    format!("'{}' is not a cpu quantity such as 500m or 2", cpu),
                ));
            }
        }

        if let Some(ref memory) = hints.memory {
            if !memory_pattern().is_match(memory) {
                return Err(PipewrightError::unsupported(
                    step,
                    "a memory hint",
                    format!("'{}' is not a memory quantity such as 512Mi or 4Gi", memory),
                ));
            }
        }

        if hints.cpu.is_none() && hints.memory.is_none() {
            return Ok(None);
        }

        Ok(Some(ArtifactResources {
            cpu: hints.cpu.clone(),
            memory: hints.memory.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ParamType, PipelineFile};
    use std::collections::HashSet;

    fn options() -> CompilerOptions {
        CompilerOptions {
            default_image: Some("registry.local/proc:1".into()),
            volume_name: "pipeline-data".into(),
            mount_path: "/mnt/data".into(),
        }
    }

    fn fan_out_graph() -> FinalizedGraph {
        let mut graph = PipelineGraph::new("fan-out");
        graph
            .declare_parameter("import-from", ParamType::String, None)
            .unwrap();
        graph
            .declare_parameter("dataset-file", ParamType::String, Some("raw.csv".into()))
            .unwrap();
        graph
            .add_step(
                StepDescriptor::new("download", "download_data.py")
                    .arg("--url")
                    .param("import-from")
                    .arg("--out")
                    .param("dataset-file")
                    .with_resources(ResourceHints::default().cpu("500m").memory("1Gi")),
            )
            .unwrap();
        for i in 1..=10 {
            graph
                .add_step(
                    StepDescriptor::new(format!("process{}", i), "process_data.py")
                        .arg("--in")
                        .param("dataset-file")
                        .arg(format!("--out=p{}.csv", i))
                        .after("download"),
                )
                .unwrap();
        }
        graph.finalize().unwrap()
    }

    #[test]
    fn test_compile_is_deterministic() {
        let compiler = Compiler::new(options());
        let first = compiler.compile(&fan_out_graph()).unwrap();
        let second = compiler.compile(&fan_out_graph()).unwrap();

        assert_eq!(first.to_bytes().unwrap(), second.to_bytes().unwrap());
        assert_eq!(first.digest().unwrap(), second.digest().unwrap());
    }

    #[test]
    fn test_fan_out_preserved() {
        let artifact = Compiler::new(options()).compile(&fan_out_graph()).unwrap();

        let ready: Vec<&str> = artifact
            .ready_tasks(&HashSet::new())
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ready, vec!["download"]);

        let done: HashSet<String> = ["download".to_string()].into();
        let ready = artifact.ready_tasks(&done);
        assert_eq!(ready.len(), 10);
        for task in ready {
            assert_eq!(task.dependencies, vec!["download".to_string()]);
        }
    }

    #[test]
    fn test_translation() {
        let artifact = Compiler::new(options()).compile(&fan_out_graph()).unwrap();

        assert_eq!(artifact.format, ARTIFACT_FORMAT);
        assert_eq!(artifact.tasks[0].id, "download");
        assert_eq!(
            artifact.tasks[0].args,
            vec!["--url", "{{params.import-from}}", "--out", "{{params.dataset-file}}"]
        );
        assert_eq!(artifact.tasks[0].image, "registry.local/proc:1");
        assert_eq!(
            artifact.tasks[0].resources,
            Some(ArtifactResources {
                cpu: Some("500m".into()),
                memory: Some("1Gi".into()),
            })
        );
        assert_eq!(artifact.required_parameters().count(), 1);
        assert_eq!(artifact.volume.mount_path, "/mnt/data");
    }

    #[test]
    fn test_not_finalized() {
        let mut graph = PipelineGraph::new("draft");
        graph.add_step(StepDescriptor::new("a", "a.py")).unwrap();

        assert!(matches!(
            Compiler::new(options()).compile(&graph),
            Err(PipewrightError::NotFinalized { ref name }) if name == "draft"
        ));

        graph.finalize().unwrap();
        assert!(Compiler::new(options()).compile(&graph).is_ok());
    }

    fn compile_single(step: StepDescriptor) -> PipewrightResult<CompiledArtifact> {
        let mut graph = PipelineGraph::new("single");
        graph.add_step(step).unwrap();
        Compiler::new(options()).compile(&graph.finalize().unwrap())
    }

    #[test]
    fn test_accelerator_unsupported() {
        let step = StepDescriptor::new("train", "train.py")
            .with_resources(ResourceHints::default().accelerator("nvidia-tesla-t4"));
        assert!(matches!(
            compile_single(step),
            Err(PipewrightError::UnsupportedConstruct { ref step, .. }) if step == "train"
        ));
    }

    #[test]
    fn test_invalid_quantities_unsupported() {
        let bad_cpu = StepDescriptor::new("a", "a.py")
            .with_resources(ResourceHints::default().cpu("two cores"));
        assert!(matches!(
            compile_single(bad_cpu),
            Err(PipewrightError::UnsupportedConstruct { .. })
        ));

        let bad_memory =
            StepDescriptor::new("a", "a.py").with_resources(ResourceHints::default().memory("4GB"));
        assert!(matches!(
            compile_single(bad_memory),
            Err(PipewrightError::UnsupportedConstruct { .. })
        ));
    }

    #[test]
    fn test_placeholder_like_literal_unsupported() {
        let step = StepDescriptor::new("a", "a.py").arg("{{params.sneaky}}");
        assert!(matches!(
            compile_single(step),
            Err(PipewrightError::UnsupportedConstruct { .. })
        ));
    }

    #[test]
    fn test_missing_image_unsupported() {
        let mut graph = PipelineGraph::new("no-image");
        graph.add_step(StepDescriptor::new("a", "a.py")).unwrap();
        let compiler = Compiler::new(CompilerOptions {
            default_image: None,
            ..options()
        });

        assert!(matches!(
            compiler.compile(&graph.finalize().unwrap()),
            Err(PipewrightError::UnsupportedConstruct { .. })
        ));

        let mut graph = PipelineGraph::new("own-image");
        graph
            .add_step(StepDescriptor::new("a", "a.py").with_image("own:2"))
            .unwrap();
        let artifact = compiler.compile(&graph.finalize().unwrap()).unwrap();
        assert_eq!(artifact.tasks[0].image, "own:2");
    }

    #[test]
    fn test_late_dependency_is_ordered() {
        let yaml = r#"
name: "late"
steps:
  - id: b
    executable: b.py
  - id: a
    executable: a.py
"#;
        let mut graph = PipelineFile::from_yaml(yaml).unwrap().to_graph().unwrap();
        graph.add_dependency("b", "a").unwrap();
        let artifact = Compiler::new(options()).compile(&graph.finalize().unwrap()).unwrap();

        let ids: Vec<&str> = artifact.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(artifact.task("b").unwrap().dependencies, vec!["a".to_string()]);
    }
}
