use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::branch::{Branches, StageToggles};
use crate::classify::{ExperimentSet, FallbackNotice, RunFlags};
use crate::config::RunConfig;
use crate::error::MoscaError;
use crate::graph::TaskGraph;
use crate::paths::Layout;
use crate::pipeline::Pipeline;
use crate::store::{PersistedFiles, RunStore};

#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanResult {
    pub output: Utf8PathBuf,
    pub flags: RunFlags,
    pub fallback: Option<FallbackNotice>,
    pub branches: Branches,
    pub stages: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persisted: Option<PersistedFiles>,
    pub graph: TaskGraph,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateResult {
    pub samples: usize,
    pub groups: Vec<String>,
    pub flags: RunFlags,
    pub fallback: Option<FallbackNotice>,
    pub stages: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Everything derived from a configuration before any node is built.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: RunConfig,
    pub set: ExperimentSet,
    pub layout: Layout,
    pub branches: Branches,
}

impl RunContext {
    pub fn new(config: RunConfig) -> Result<Self, MoscaError> {
        let set = ExperimentSet::classify(&config.experiments)?;
        let layout = Layout::new(config.settings.output.clone());
        let branches = Branches::resolve(set.flags(), StageToggles::from(&config.settings));
        Ok(Self {
            config,
            set,
            layout,
            branches,
        })
    }

    pub fn pipeline(&self) -> Pipeline<'_> {
        Pipeline::new(&self.config.settings, &self.set, &self.layout, self.branches)
    }

    pub fn graph(&self) -> Result<TaskGraph, MoscaError> {
        TaskGraph::assemble(self.pipeline().catalog()?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Planner;

impl Planner {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(
        &self,
        config: RunConfig,
        sink: &dyn ProgressSink,
    ) -> Result<ValidateResult, MoscaError> {
        let started = Instant::now();
        let context = RunContext::new(config)?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Classify; {} experiments in {} groups",
                context.set.len(),
                context.set.groups().len()
            ),
            elapsed: Some(started.elapsed()),
        });

        Ok(ValidateResult {
            samples: context.set.len(),
            groups: context.set.groups().into_iter().map(str::to_string).collect(),
            flags: context.set.flags(),
            fallback: context.set.fallback().cloned(),
            stages: context.branches.included(),
        })
    }

    pub fn plan(
        &self,
        config: RunConfig,
        options: PlanOptions,
        sink: &dyn ProgressSink,
    ) -> Result<PlanResult, MoscaError> {
        let started = Instant::now();
        let context = RunContext::new(config)?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Resolve; stages: {}",
                context.branches.included().join(", ")
            ),
            elapsed: Some(started.elapsed()),
        });

        let graph = context.graph()?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Assemble; {} nodes, {} edges",
                graph.nodes().len(),
                graph.edges().len()
            ),
            elapsed: Some(started.elapsed()),
        });

        let persisted = if options.dry_run {
            sink.event(ProgressEvent {
                message: "phase=Persist; dry run, nothing written".to_string(),
                elapsed: None,
            });
            None
        } else {
            let store = RunStore::new(context.layout.clone());
            let files = store.persist(
                &context.set,
                &context.config.effective,
                context.config.format,
            )?;
            sink.event(ProgressEvent {
                message: format!("phase=Persist; wrote {}", files.experiment_table),
                elapsed: Some(started.elapsed()),
            });
            Some(files)
        };

        Ok(PlanResult {
            output: context.layout.output().to_path_buf(),
            flags: context.set.flags(),
            fallback: context.set.fallback().cloned(),
            branches: context.branches,
            stages: context.branches.included(),
            persisted,
            graph,
        })
    }
}
