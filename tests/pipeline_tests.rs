//! End-to-end pipeline tests over a recording tool invoker
//!
//! No external genetics tool runs here; the invoker records every
//! invocation and fabricates the declared outputs, which is enough to
//! exercise the fan-out, the cross-joins, the barriers, and the terminal
//! aggregation exactly as a real run would order them.

use async_trait::async_trait;
use kinflow::artifact::ArtifactStore;
use kinflow::logging::RunLog;
use kinflow::scheduler::{Executor, RunContext};
use kinflow::tools::{RecordingInvoker, ToolInvoker, ToolRequest};
use kinflow::{Pipeline, PipelineConfig, PipelineError, ToolError};
use std::path::Path;
use std::sync::Arc;

fn setup(dir: &Path, pheno_files: &[(&str, &str)]) -> PipelineConfig {
    let config = PipelineConfig {
        snp_vcf: dir.join("snp.vcf.gz"),
        indel_vcf: dir.join("indel.vcf.gz"),
        sv_vcf: dir.join("sv.vcf.gz"),
        pheno_dir: dir.join("phenos"),
        covar: None,
        out_dir: dir.join("out"),
        maf: 0.01,
        power: -0.25,
        ld_window: 0.98,
        threads: 2,
    };
    for p in [&config.snp_vcf, &config.indel_vcf, &config.sv_vcf] {
        std::fs::write(p, b"##fileformat=VCFv4.2\n").unwrap();
    }
    std::fs::create_dir_all(&config.pheno_dir).unwrap();
    for (name, content) in pheno_files {
        std::fs::write(config.pheno_dir.join(name), content).unwrap();
    }
    config
}

const HEIGHT: &str = "FID\tIID\tHeight\nF1\tI1\t172.5\nF2\tI2\tNA\n";
const WEIGHT: &str = "FID\tIID\tWeight\nF1\tI1\t70.1\nF2\tI2\t81.4\n";

fn label_positions(requests: &[ToolRequest]) -> std::collections::HashMap<String, usize> {
    requests
        .iter()
        .enumerate()
        .map(|(i, r)| (r.label.clone(), i))
        .collect()
}

#[tokio::test]
async fn test_end_to_end_two_phenotypes() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(
        dir.path(),
        &[("Height.tsv", HEIGHT), ("Weight.tsv", WEIGHT)],
    );
    let invoker = Arc::new(RecordingInvoker::new());
    let pipeline = Pipeline::with_invoker(config.clone(), invoker.clone());

    let summary = pipeline.run().await.unwrap();
    assert_eq!(summary.estimates, 10, "6 single + 4 fused estimates");
    // 3 normalize + 3 grm + 6 single + 4 fused + 1 summary
    assert_eq!(invoker.requests().len(), 17);

    for pheno in ["Height", "Weight"] {
        for tag in ["SNP", "INDEL", "SV", "SNP_INDEL", "SNP_INDEL_SV"] {
            let path = config.out_dir.join("reml").join(format!("{pheno}.{tag}.reml"));
            assert!(path.exists(), "missing estimate {}", path.display());
        }
    }

    // the summary input set is the full 10-artifact estimate directory
    let reml_files = std::fs::read_dir(config.out_dir.join("reml"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "reml"))
        .count();
    assert_eq!(reml_files, 10);

    assert!(summary.events_path.exists());
}

#[tokio::test]
async fn test_invocation_order_respects_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(
        dir.path(),
        &[("Height.tsv", HEIGHT), ("Weight.tsv", WEIGHT)],
    );
    let invoker = Arc::new(RecordingInvoker::new());
    let pipeline = Pipeline::with_invoker(config, invoker.clone());
    pipeline.run().await.unwrap();

    let requests = invoker.requests();
    let pos = label_positions(&requests);

    for kind in ["SNP", "INDEL", "SV"] {
        assert!(
            pos[&format!("normalize:{kind}")] < pos[&format!("grm:{kind}")],
            "normalization must precede the {kind} kinship build"
        );
    }

    // fused runs sit behind the three-branch barrier
    for pheno in ["Height", "Weight"] {
        for kind in ["SNP", "INDEL", "SV"] {
            assert!(
                pos[&format!("grm:{kind}")] < pos[&format!("mgrm:{pheno}")],
                "mgrm:{pheno} ran before grm:{kind}"
            );
        }
    }

    // the aggregate is the last invocation, exactly once
    let aggregate_count = requests.iter().filter(|r| r.label == "aggregate").count();
    assert_eq!(aggregate_count, 1);
    assert_eq!(requests.last().unwrap().label, "aggregate");
}

#[tokio::test]
async fn test_kinship_lists_are_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path(), &[("Height.tsv", HEIGHT)]);
    let invoker = Arc::new(RecordingInvoker::new());
    let pipeline = Pipeline::with_invoker(config.clone(), invoker);
    pipeline.run().await.unwrap();

    let grm = |kind: &str| config.out_dir.join("grm").join(kind).display().to_string();
    let two = config.out_dir.join("reml").join("Height.SNP_INDEL.list");
    assert_eq!(
        std::fs::read_to_string(two).unwrap(),
        format!("{}\n{}\n", grm("SNP"), grm("INDEL"))
    );
    let three = config.out_dir.join("reml").join("Height.SNP_INDEL_SV.list");
    assert_eq!(
        std::fs::read_to_string(three).unwrap(),
        format!("{}\n{}\n{}\n", grm("SNP"), grm("INDEL"), grm("SV"))
    );
}

#[tokio::test]
async fn test_malformed_phenotype_fails_before_its_runner_invokes() {
    let dir = tempfile::tempdir().unwrap();
    // every trait value missing
    let bad = "FID\tIID\tBad\nF1\tI1\tNA\nF2\tI2\tNA\n";
    let config = setup(dir.path(), &[("Bad.tsv", bad)]);
    let invoker = Arc::new(RecordingInvoker::new());
    let pipeline = Pipeline::with_invoker(config, invoker.clone());

    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, PipelineError::Phenotype(_)), "got {err}");

    // no estimate invocation may have consumed the bad file
    for request in invoker.requests() {
        assert!(
            !request.label.starts_with("reml:Bad") && !request.label.starts_with("mgrm:Bad"),
            "runner invoked a tool on a malformed phenotype: {}",
            request.label
        );
    }
}

/// Invoker that fails one labelled task and records the rest
struct FailingInvoker {
    fail_prefix: String,
    inner: RecordingInvoker,
}

#[async_trait]
impl ToolInvoker for FailingInvoker {
    async fn invoke(&self, request: &ToolRequest) -> Result<(), ToolError> {
        if request.label.starts_with(&self.fail_prefix) {
            return Err(ToolError::Failed {
                label: request.label.clone(),
                program: request.program.clone(),
                status: "exit status: 1".to_string(),
                stderr: "synthetic failure".to_string(),
            });
        }
        self.inner.invoke(request).await
    }
}

#[tokio::test]
async fn test_tool_failure_aborts_run_without_aggregation() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(
        dir.path(),
        &[("Height.tsv", HEIGHT), ("Weight.tsv", WEIGHT)],
    );
    let invoker = Arc::new(FailingInvoker {
        fail_prefix: "grm:SV".to_string(),
        inner: RecordingInvoker::new(),
    });
    let pipeline = Pipeline::with_invoker(config, invoker.clone());

    let err = pipeline.run().await.unwrap_err();
    match &err {
        PipelineError::Tool(tool_err) => {
            assert!(tool_err.to_string().contains("grm:SV"));
        }
        other => panic!("expected tool error, got {other}"),
    }

    for request in invoker.inner.requests() {
        assert_ne!(
            request.label, "aggregate",
            "aggregation ran despite a failed branch"
        );
    }
}

#[tokio::test]
async fn test_aggregate_gate_rejects_wrong_estimate_count() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path(), &[("Height.tsv", HEIGHT)]);
    config.prepare_output().unwrap();

    let pipeline = Pipeline::with_invoker(config.clone(), Arc::new(RecordingInvoker::new()));
    let plan = pipeline.plan().unwrap();

    let invoker = Arc::new(RecordingInvoker::new());
    let ctx = RunContext {
        config: Arc::new(config),
        invoker: invoker.clone(),
        store: Arc::new(ArtifactStore::new()),
        log: Arc::new(RunLog::new()),
        // deliberately wrong: the real run would expect 5
        expected_estimates: 99,
    };

    let err = Executor::new().execute(&plan, ctx).await.unwrap_err();
    assert!(err.is_integrity(), "got {err}");
    for request in invoker.requests() {
        assert_ne!(request.label, "aggregate");
    }
}

#[tokio::test]
async fn test_event_log_records_run_and_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path(), &[("Height.tsv", HEIGHT)]);
    let invoker = Arc::new(RecordingInvoker::new());
    let pipeline = Pipeline::with_invoker(config.clone(), invoker);
    let summary = pipeline.run().await.unwrap();

    let content = std::fs::read_to_string(summary.events_path).unwrap();
    let events: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert_eq!(events.first().unwrap()["action"], "run_started");
    assert_eq!(events.last().unwrap()["action"], "run_completed");
    let completions = events
        .iter()
        .filter(|e| e["action"] == "task_completed")
        .count();
    // 3 normalize + 3 grm + 3 single + 1 fused + 1 aggregate
    assert_eq!(completions, 11);
}
