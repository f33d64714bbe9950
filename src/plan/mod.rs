//! Task planning
//!
//! Builds the whole run as a static dependency graph before anything
//! executes. Both cross-join stages live here: the per-type estimate tasks
//! are the full product of the bounded kinship set and the bounded
//! phenotype set, produced by nested iteration over the two materialized
//! registries, each pair exactly once. Barriers are not a separate
//! primitive; they are the edge sets of the fused and aggregate tasks.

use crate::dag::TaskDag;
use crate::error::GraphError;
use crate::types::{Phenotype, TaskId, VariantInput, VariantKind};
use std::collections::HashMap;

/// What one task does when it runs
#[derive(Debug, Clone)]
pub enum TaskKind {
    /// Rewrite one variant call set into normalized form
    Normalize(VariantKind),
    /// Build the kinship bundle for one normalized call set
    BuildGrm(VariantKind),
    /// One single-matrix estimate for a (kind, phenotype) pair
    RemlSingle {
        kind: VariantKind,
        phenotype: Phenotype,
    },
    /// Both fused estimates for one phenotype
    RemlFused { phenotype: Phenotype },
    /// Terminal summary over every estimate
    Aggregate,
}

/// One planned task
#[derive(Debug, Clone)]
pub struct TaskSpec {
    /// Stable identifier, also the graph node
    pub id: TaskId,
    /// What the task does
    pub kind: TaskKind,
}

impl TaskSpec {
    fn new(kind: TaskKind) -> Self {
        Self {
            id: TaskId::new(),
            kind,
        }
    }

    /// Human-readable label used in logs and errors
    #[must_use]
    pub fn label(&self) -> String {
        match &self.kind {
            TaskKind::Normalize(kind) => format!("normalize:{kind}"),
            TaskKind::BuildGrm(kind) => format!("grm:{kind}"),
            TaskKind::RemlSingle { kind, phenotype } => {
                format!("reml:{}.{kind}", phenotype.name)
            }
            TaskKind::RemlFused { phenotype } => format!("mgrm:{}", phenotype.name),
            TaskKind::Aggregate => "aggregate".to_string(),
        }
    }
}

/// Task counts per stage, for `plan` output and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSummary {
    pub normalize: usize,
    pub grm: usize,
    pub single: usize,
    pub fused: usize,
    pub aggregate: usize,
    pub edges: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "normalize tasks: {}", self.normalize)?;
        writeln!(f, "kinship tasks:   {}", self.grm)?;
        writeln!(f, "single estimates: {}", self.single)?;
        writeln!(f, "fused estimates: {}", self.fused)?;
        writeln!(f, "aggregate tasks: {}", self.aggregate)?;
        write!(f, "dependency edges: {}", self.edges)
    }
}

/// The fully planned run: every task plus its dependency graph
#[derive(Debug)]
pub struct Plan {
    tasks: HashMap<TaskId, TaskSpec>,
    order: Vec<TaskId>,
    dag: TaskDag,
    phenotype_count: usize,
}

#[derive(Debug, Default)]
struct PlanBuilder {
    tasks: HashMap<TaskId, TaskSpec>,
    order: Vec<TaskId>,
    dag: TaskDag,
}

impl PlanBuilder {
    fn insert(&mut self, kind: TaskKind) -> TaskId {
        let spec = TaskSpec::new(kind);
        let id = spec.id;
        self.dag.add_node(id);
        self.order.push(id);
        self.tasks.insert(id, spec);
        id
    }
}

impl Plan {
    /// Plan a run over the fixed variant inputs and the discovered
    /// phenotype set.
    pub fn build(
        variants: &[VariantInput; 3],
        phenotypes: &[Phenotype],
    ) -> Result<Self, GraphError> {
        let mut builder = PlanBuilder::default();

        // Per-type branches: normalize feeds the kinship build, no
        // ordering constraint between branches.
        let mut grm_ids = Vec::with_capacity(3);
        for input in variants {
            let norm = builder.insert(TaskKind::Normalize(input.kind));
            let grm = builder.insert(TaskKind::BuildGrm(input.kind));
            builder.dag.add_edge(norm, grm)?;
            grm_ids.push((input.kind, grm));
        }

        // Cross-join: every kinship bundle against every phenotype,
        // exactly once per pair.
        let mut runner_ids = Vec::new();
        for (kind, grm_id) in &grm_ids {
            for phenotype in phenotypes {
                let single = builder.insert(TaskKind::RemlSingle {
                    kind: *kind,
                    phenotype: phenotype.clone(),
                });
                builder.dag.add_edge(*grm_id, single)?;
                runner_ids.push(single);
            }
        }

        // Fused estimates wait on all three branches; the edge set is the
        // barrier the re-keying stage runs behind.
        for phenotype in phenotypes {
            let fused = builder.insert(TaskKind::RemlFused {
                phenotype: phenotype.clone(),
            });
            for (_, grm_id) in &grm_ids {
                builder.dag.add_edge(*grm_id, fused)?;
            }
            runner_ids.push(fused);
        }

        // Terminal barrier: the aggregate runs after every estimate task.
        let aggregate_id = builder.insert(TaskKind::Aggregate);
        for id in runner_ids {
            builder.dag.add_edge(id, aggregate_id)?;
        }

        let PlanBuilder { tasks, order, dag } = builder;

        tracing::debug!(
            tasks = order.len(),
            edges = dag.edge_count(),
            phenotypes = phenotypes.len(),
            "planned pipeline"
        );

        Ok(Self {
            tasks,
            order,
            dag,
            phenotype_count: phenotypes.len(),
        })
    }

    /// Task lookup by id
    #[inline]
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&TaskSpec> {
        self.tasks.get(&id)
    }

    /// All tasks in planning order
    pub fn tasks(&self) -> impl Iterator<Item = &TaskSpec> {
        self.order.iter().map(|id| &self.tasks[id])
    }

    /// The dependency graph
    #[inline]
    #[must_use]
    pub fn dag(&self) -> &TaskDag {
        &self.dag
    }

    /// Total task count
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the plan is empty (never true for a built plan)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// How many estimate artifacts the run must produce before the
    /// aggregate may fire: one per single task, two per fused task.
    #[inline]
    #[must_use]
    pub fn expected_estimates(&self) -> usize {
        3 * self.phenotype_count + 2 * self.phenotype_count
    }

    /// Per-stage counts
    #[must_use]
    pub fn summary(&self) -> PlanSummary {
        let mut s = PlanSummary {
            normalize: 0,
            grm: 0,
            single: 0,
            fused: 0,
            aggregate: 0,
            edges: self.dag.edge_count(),
        };
        for spec in self.tasks() {
            match spec.kind {
                TaskKind::Normalize(_) => s.normalize += 1,
                TaskKind::BuildGrm(_) => s.grm += 1,
                TaskKind::RemlSingle { .. } => s.single += 1,
                TaskKind::RemlFused { .. } => s.fused += 1,
                TaskKind::Aggregate => s.aggregate += 1,
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn variants() -> [VariantInput; 3] {
        VariantKind::ALL.map(|kind| VariantInput {
            kind,
            path: PathBuf::from(format!("{kind}.vcf.gz")),
        })
    }

    fn phenotypes(names: &[&str]) -> Vec<Phenotype> {
        names
            .iter()
            .map(|n| Phenotype {
                name: n.to_string(),
                path: PathBuf::from(format!("{n}.tsv")),
            })
            .collect()
    }

    #[test]
    fn cross_join_counts() {
        let plan = Plan::build(&variants(), &phenotypes(&["Height", "Weight"])).unwrap();
        let s = plan.summary();
        assert_eq!(s.normalize, 3);
        assert_eq!(s.grm, 3);
        assert_eq!(s.single, 6);
        assert_eq!(s.fused, 2);
        assert_eq!(s.aggregate, 1);
        assert_eq!(plan.expected_estimates(), 10);
    }

    #[test]
    fn every_pair_exactly_once() {
        let phenos = phenotypes(&["A", "B", "C"]);
        let plan = Plan::build(&variants(), &phenos).unwrap();
        let mut seen = std::collections::HashSet::new();
        for spec in plan.tasks() {
            if let TaskKind::RemlSingle { kind, phenotype } = &spec.kind {
                assert!(
                    seen.insert((*kind, phenotype.name.clone())),
                    "duplicate pair {kind}/{}",
                    phenotype.name
                );
            }
        }
        assert_eq!(seen.len(), 9);
    }

    #[test]
    fn aggregate_is_sole_exit() {
        let plan = Plan::build(&variants(), &phenotypes(&["Height"])).unwrap();
        let exits = plan.dag().exit_nodes();
        assert_eq!(exits.len(), 1);
        assert!(matches!(
            plan.task(exits[0]).unwrap().kind,
            TaskKind::Aggregate
        ));
        // and the graph orders cleanly
        assert_eq!(
            plan.dag().topological_sort().unwrap().len(),
            plan.len()
        );
    }

    #[test]
    fn fused_tasks_wait_on_all_three_branches() {
        let plan = Plan::build(&variants(), &phenotypes(&["Height"])).unwrap();
        let indegrees = plan.dag().indegrees();
        for spec in plan.tasks() {
            if matches!(spec.kind, TaskKind::RemlFused { .. }) {
                assert_eq!(indegrees[&spec.id], 3);
            }
        }
    }
}
