//! Pipeline handle
//!
//! Wires the registries, the planner, the executor, and the event log into
//! the three entry points the binary exposes: validate inputs, print the
//! plan, run the whole thing.

use crate::artifact::ArtifactStore;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::logging::RunLog;
use crate::pheno;
use crate::plan::Plan;
use crate::registry::{PhenotypeRegistry, VariantRegistry};
use crate::scheduler::{Executor, RunContext};
use crate::tools::{SubprocessInvoker, ToolInvoker};
use std::path::PathBuf;
use std::sync::Arc;

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Tasks that ran to completion
    pub tasks_completed: usize,
    /// Estimate artifacts produced
    pub estimates: usize,
    /// Where the final summary landed
    pub summary_dir: PathBuf,
    /// Where the event log landed
    pub events_path: PathBuf,
}

/// Result of input validation
#[derive(Debug, Clone, Copy)]
pub struct ValidationSummary {
    /// Phenotype files found and checked
    pub phenotypes: usize,
}

/// One configured pipeline instance
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    invoker: Arc<dyn ToolInvoker>,
}

impl Pipeline {
    /// Pipeline over the real external tools
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_invoker(config, Arc::new(SubprocessInvoker))
    }

    /// Pipeline over a caller-supplied invoker, used by tests
    #[must_use]
    pub fn with_invoker(config: PipelineConfig, invoker: Arc<dyn ToolInvoker>) -> Self {
        Self {
            config: Arc::new(config),
            invoker,
        }
    }

    /// Configuration this pipeline was built with
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Check every input eagerly without invoking any tool: call sets
    /// readable, phenotype files well-formed, covariate coverage complete.
    pub fn validate(&self) -> Result<ValidationSummary, PipelineError> {
        self.config.validate()?;
        let phenotypes = PhenotypeRegistry::discover(&self.config.pheno_dir)?;
        for phenotype in phenotypes.phenotypes() {
            let table = pheno::validate_phenotype(&phenotype.path)?;
            if let Some(covar) = &self.config.covar {
                pheno::validate_covariate(covar, &phenotype.path, &table)?;
            }
        }
        Ok(ValidationSummary {
            phenotypes: phenotypes.len(),
        })
    }

    /// Build the task graph without executing it
    pub fn plan(&self) -> Result<Plan, PipelineError> {
        self.config.validate()?;
        let variants = VariantRegistry::from_config(&self.config);
        let phenotypes = PhenotypeRegistry::discover(&self.config.pheno_dir)?;
        let plan = Plan::build(variants.inputs(), phenotypes.phenotypes())?;
        Ok(plan)
    }

    /// Execute the full pipeline.
    ///
    /// The event log is flushed to disk whether the run completes or
    /// aborts, so a failed run still leaves its provenance behind.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        self.config.validate()?;
        let variants = VariantRegistry::from_config(&self.config);
        let phenotypes = PhenotypeRegistry::discover(&self.config.pheno_dir)?;
        self.config.prepare_output()?;

        let plan = Plan::build(variants.inputs(), phenotypes.phenotypes())?;
        tracing::info!(
            tasks = plan.len(),
            phenotypes = phenotypes.len(),
            "starting pipeline"
        );

        let log = Arc::new(RunLog::new());
        let config_json = serde_json::to_string(&*self.config)
            .map_err(|e| PipelineError::Internal(format!("config not serializable: {e}")))?;
        log.append("run", "run_started", &config_json);

        let ctx = RunContext {
            config: self.config.clone(),
            invoker: self.invoker.clone(),
            store: Arc::new(ArtifactStore::new()),
            log: log.clone(),
            expected_estimates: plan.expected_estimates(),
        };

        let events_path = self.config.events_path();
        let executor = Executor::new();
        match executor.execute(&plan, ctx).await {
            Ok(report) => {
                log.append(
                    "run",
                    "run_completed",
                    &format!("{} estimates", report.estimates),
                );
                log.write_jsonl(&events_path)?;
                tracing::info!(
                    tasks = report.tasks_completed,
                    estimates = report.estimates,
                    "pipeline completed"
                );
                Ok(RunSummary {
                    tasks_completed: report.tasks_completed,
                    estimates: report.estimates,
                    summary_dir: self.config.summary_dir(),
                    events_path,
                })
            }
            Err(err) => {
                // best effort; the run error is the one worth surfacing
                if let Err(log_err) = log.write_jsonl(&events_path) {
                    tracing::warn!(error = %log_err, "could not flush event log");
                }
                Err(err)
            }
        }
    }
}
