//! Task-plan tests
//!
//! The plan is static: for N phenotype files it must contain exactly
//! N x 3 single-estimate tasks and N fused tasks, with the aggregate as
//! the sole terminal barrier.

use kinflow::plan::{Plan, TaskKind};
use kinflow::{Phenotype, VariantInput, VariantKind};
use std::collections::HashSet;
use std::path::PathBuf;

fn variants() -> [VariantInput; 3] {
    VariantKind::ALL.map(|kind| VariantInput {
        kind,
        path: PathBuf::from(format!("in/{kind}.vcf.gz")),
    })
}

fn phenotypes(names: &[&str]) -> Vec<Phenotype> {
    names
        .iter()
        .map(|n| Phenotype {
            name: n.to_string(),
            path: PathBuf::from(format!("in/phenos/{n}.tsv")),
        })
        .collect()
}

#[test]
fn test_task_counts_scale_with_phenotypes() {
    for n in [1usize, 2, 5, 11] {
        let names: Vec<String> = (0..n).map(|i| format!("Trait{i}")).collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let plan = Plan::build(&variants(), &phenotypes(&name_refs)).unwrap();
        let s = plan.summary();

        assert_eq!(s.normalize, 3, "n={n}");
        assert_eq!(s.grm, 3, "n={n}");
        assert_eq!(s.single, 3 * n, "n={n}");
        assert_eq!(s.fused, n, "n={n}");
        assert_eq!(s.aggregate, 1, "n={n}");
        assert_eq!(plan.len(), 3 + 3 + 3 * n + n + 1, "n={n}");
        assert_eq!(plan.expected_estimates(), 3 * n + 2 * n, "n={n}");
    }
}

#[test]
fn test_no_pair_skipped_or_duplicated() {
    let phenos = phenotypes(&["Height", "Weight"]);
    let plan = Plan::build(&variants(), &phenos).unwrap();

    let mut pairs = HashSet::new();
    for spec in plan.tasks() {
        if let TaskKind::RemlSingle { kind, phenotype } = &spec.kind {
            assert!(
                pairs.insert((*kind, phenotype.name.clone())),
                "pair emitted twice: {kind}/{}",
                phenotype.name
            );
        }
    }
    for kind in VariantKind::ALL {
        for pheno in &phenos {
            assert!(
                pairs.contains(&(kind, pheno.name.clone())),
                "pair skipped: {kind}/{}",
                pheno.name
            );
        }
    }
}

#[test]
fn test_aggregate_is_the_only_exit_and_depends_on_all_runners() {
    let plan = Plan::build(&variants(), &phenotypes(&["Height", "Weight"])).unwrap();

    let exits = plan.dag().exit_nodes();
    assert_eq!(exits.len(), 1, "aggregate must be the sole exit");
    let aggregate = exits[0];
    assert!(matches!(
        plan.task(aggregate).unwrap().kind,
        TaskKind::Aggregate
    ));

    // 6 single + 2 fused tasks feed the terminal barrier
    assert_eq!(plan.dag().indegrees()[&aggregate], 8);
}

#[test]
fn test_expected_estimates_for_two_phenotypes_is_ten() {
    let plan = Plan::build(&variants(), &phenotypes(&["Height", "Weight"])).unwrap();
    assert_eq!(plan.expected_estimates(), 10);
}

#[test]
fn test_plan_orders_topologically() {
    let plan = Plan::build(&variants(), &phenotypes(&["Height"])).unwrap();
    let order = plan.dag().topological_sort().unwrap();
    assert_eq!(order.len(), plan.len());

    let position: std::collections::HashMap<_, _> =
        order.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    // every kinship build follows its normalization, every runner follows
    // the kinship builds it consumes
    let mut norm_pos = std::collections::HashMap::new();
    let mut grm_pos = std::collections::HashMap::new();
    for spec in plan.tasks() {
        match &spec.kind {
            TaskKind::Normalize(kind) => {
                norm_pos.insert(*kind, position[&spec.id]);
            }
            TaskKind::BuildGrm(kind) => {
                grm_pos.insert(*kind, position[&spec.id]);
            }
            _ => {}
        }
    }
    for kind in VariantKind::ALL {
        assert!(norm_pos[&kind] < grm_pos[&kind]);
    }
    for spec in plan.tasks() {
        match &spec.kind {
            TaskKind::RemlSingle { kind, .. } => {
                assert!(grm_pos[kind] < position[&spec.id]);
            }
            TaskKind::RemlFused { .. } => {
                for kind in VariantKind::ALL {
                    assert!(grm_pos[&kind] < position[&spec.id]);
                }
            }
            _ => {}
        }
    }
}
