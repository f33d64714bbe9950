//! Async execution of a planned run
//!
//! Walks the dependency graph as a wave front: every task whose producers
//! have all completed is spawned onto the runtime, so independent branches
//! run concurrently and barriers fall out of the edge sets. The first
//! failing task aborts the whole run; there is no retry and no partial
//! result mode.

use crate::artifact::ArtifactStore;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, StateError};
use crate::logging::RunLog;
use crate::pheno;
use crate::plan::{Plan, TaskKind, TaskSpec};
use crate::state_machine::{transition_allowed, TaskState};
use crate::tools::{self, ToolInvoker};
use crate::types::{FusionGroup, TaskId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Everything a running task may touch, shared across the wave front
#[derive(Clone)]
pub struct RunContext {
    /// Immutable run configuration
    pub config: Arc<PipelineConfig>,
    /// Seam to the external tools
    pub invoker: Arc<dyn ToolInvoker>,
    /// Artifact hand-off between stages
    pub store: Arc<ArtifactStore>,
    /// Hash-chained provenance record
    pub log: Arc<RunLog>,
    /// Estimates the aggregate barrier must observe
    pub expected_estimates: usize,
}

/// Outcome of a completed run
#[derive(Debug, Clone, Copy)]
pub struct ExecutionReport {
    /// Tasks that ran to completion
    pub tasks_completed: usize,
    /// Estimate artifacts produced
    pub estimates: usize,
}

/// Wave-front executor over a [`Plan`]
#[derive(Debug, Default)]
pub struct Executor {
    states: Mutex<HashMap<TaskId, TaskState>>,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state of a task
    pub fn state(&self, task: TaskId) -> Result<TaskState, StateError> {
        self.states
            .lock()
            .get(&task)
            .copied()
            .ok_or(StateError::UnknownTask(task))
    }

    fn transition(&self, task: TaskId, to: TaskState) -> Result<(), StateError> {
        let mut states = self.states.lock();
        let from = *states.get(&task).ok_or(StateError::UnknownTask(task))?;
        if !transition_allowed(from, to) {
            return Err(StateError::IllegalTransition { task, from, to });
        }
        states.insert(task, to);
        Ok(())
    }

    /// Run every task in dependency order until the terminal barrier
    /// completes or a task fails.
    pub async fn execute(
        &self,
        plan: &Plan,
        ctx: RunContext,
    ) -> Result<ExecutionReport, PipelineError> {
        {
            let mut states = self.states.lock();
            for spec in plan.tasks() {
                states.insert(spec.id, TaskState::Pending);
            }
        }

        let mut indegrees = plan.dag().indegrees();
        let mut join_set: JoinSet<(TaskId, Result<String, PipelineError>)> = JoinSet::new();
        let mut completed = 0usize;

        let ready: Vec<TaskId> = indegrees
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();
        for id in ready {
            self.spawn(plan, id, &ctx, &mut join_set)?;
        }

        while let Some(joined) = join_set.join_next().await {
            let (id, result) = joined
                .map_err(|e| PipelineError::Internal(format!("task join failed: {e}")))?;
            let label = plan
                .task(id)
                .map(TaskSpec::label)
                .unwrap_or_else(|| id.to_string());

            match result {
                Ok(detail) => {
                    self.transition(id, TaskState::Completed)?;
                    ctx.log.append(&label, "task_completed", &detail);
                    completed += 1;
                    for succ in plan.dag().successors(id) {
                        let remaining = indegrees
                            .get_mut(&succ)
                            .ok_or_else(|| {
                                PipelineError::Internal(format!(
                                    "successor {succ} missing from indegree table"
                                ))
                            })?;
                        *remaining -= 1;
                        if *remaining == 0 {
                            self.spawn(plan, succ, &ctx, &mut join_set)?;
                        }
                    }
                }
                Err(err) => {
                    self.transition(id, TaskState::Failed)?;
                    ctx.log.append(&label, "task_failed", &err.to_string());
                    tracing::error!(task = %label, error = %err, "task failed, aborting run");
                    // Dropping the join set tears down still-running
                    // siblings; nothing downstream of a failure may start.
                    return Err(err);
                }
            }
        }

        Ok(ExecutionReport {
            tasks_completed: completed,
            estimates: ctx.store.estimate_count(),
        })
    }

    fn spawn(
        &self,
        plan: &Plan,
        id: TaskId,
        ctx: &RunContext,
        join_set: &mut JoinSet<(TaskId, Result<String, PipelineError>)>,
    ) -> Result<(), PipelineError> {
        let spec = plan
            .task(id)
            .ok_or_else(|| PipelineError::Internal(format!("unknown task {id}")))?
            .clone();
        self.transition(id, TaskState::Running)?;
        ctx.log.append(&spec.label(), "task_started", "");
        tracing::debug!(task = %spec.label(), "task started");

        let ctx = ctx.clone();
        join_set.spawn(async move {
            let result = execute_task(&spec, &ctx).await;
            (spec.id, result)
        });
        Ok(())
    }
}

/// Run one task to completion, returning a short artifact summary for the
/// event log.
async fn execute_task(spec: &TaskSpec, ctx: &RunContext) -> Result<String, PipelineError> {
    let label = spec.label();
    match &spec.kind {
        TaskKind::Normalize(kind) => {
            let input = ctx
                .config
                .variant_inputs()
                .into_iter()
                .find(|i| i.kind == *kind)
                .ok_or_else(|| {
                    PipelineError::Internal(format!("no input configured for {kind}"))
                })?;
            let (request, artifact) = tools::normalize_request(&ctx.config, &input, &label);
            ctx.invoker.invoke(&request).await?;
            let detail = artifact.path.display().to_string();
            ctx.store.record_normalized(artifact);
            Ok(detail)
        }
        TaskKind::BuildGrm(kind) => {
            let normalized = ctx.store.normalized_for(*kind, &label)?;
            let (request, bundle) = tools::grm_request(&ctx.config, &normalized, &label);
            ctx.invoker.invoke(&request).await?;
            let detail = bundle.prefix.clone();
            ctx.store.record_bundle(bundle);
            Ok(detail)
        }
        TaskKind::RemlSingle { kind, phenotype } => {
            validate_phenotype_inputs(ctx, &phenotype.path)?;
            let bundle = ctx.store.bundle_for(*kind, &label)?;
            let (request, estimate) =
                tools::reml_single_request(&ctx.config, &bundle, phenotype, &label);
            ctx.invoker.invoke(&request).await?;
            let detail = estimate.path.display().to_string();
            ctx.store.record_estimate(estimate);
            Ok(detail)
        }
        TaskKind::RemlFused { phenotype } => {
            validate_phenotype_inputs(ctx, &phenotype.path)?;
            let grms = ctx.store.grm_set()?;
            let mut produced = Vec::with_capacity(2);
            for group in FusionGroup::ALL {
                let list = tools::kinship_list_path(&ctx.config, &phenotype.name, group);
                tools::write_kinship_list(&list, &grms, group, &label)?;
                let (request, estimate) =
                    tools::reml_fused_request(&ctx.config, &list, phenotype, group, &label);
                ctx.invoker.invoke(&request).await?;
                produced.push(estimate.path.display().to_string());
                ctx.store.record_estimate(estimate);
            }
            Ok(produced.join(" "))
        }
        TaskKind::Aggregate => {
            let found = ctx.store.estimate_count();
            if found != ctx.expected_estimates {
                return Err(crate::error::IntegrityError::EstimateCount {
                    expected: ctx.expected_estimates,
                    found,
                }
                .into());
            }
            let request = tools::summarize_request(&ctx.config, &label);
            ctx.invoker.invoke(&request).await?;
            Ok(format!("{found} estimates summarized"))
        }
    }
}

fn validate_phenotype_inputs(
    ctx: &RunContext,
    pheno_path: &std::path::Path,
) -> Result<(), PipelineError> {
    let table = pheno::validate_phenotype(pheno_path)?;
    if let Some(covar) = &ctx.config.covar {
        pheno::validate_covariate(covar, pheno_path, &table)?;
    }
    Ok(())
}
