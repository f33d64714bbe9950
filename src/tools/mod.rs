//! External collaborator wrappers
//!
//! Every statistical step is an opaque subprocess with fixed arguments.
//! This module builds those invocations and the artifact records they
//! produce; it knows nothing about ordering. The [`ToolInvoker`] trait is
//! the seam the scheduler calls through, so tests can swap the subprocess
//! runner for a recording fake.

use crate::config::PipelineConfig;
use crate::error::ToolError;
use crate::types::{
    FusionGroup, GrmBundle, GrmSet, GrmSource, HeritabilityEstimate, NormalizedVcf,
    Phenotype, VariantInput,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Normalization script, resolved via PATH
pub const NORMALIZER_PROGRAM: &str = "normalize-vcf.sh";
/// Kinship and REML tool, resolved via PATH
pub const KINSHIP_PROGRAM: &str = "ldak";
/// Summary renderer, resolved via PATH
pub const SUMMARIZER_PROGRAM: &str = "table_all_reml.py";

/// One prepared external invocation
#[derive(Debug, Clone)]
pub struct ToolRequest {
    /// Task label for error context
    pub label: String,
    /// Program name or path
    pub program: String,
    /// Full argument vector
    pub args: Vec<String>,
    /// Files the tool must leave behind on success
    pub outputs: Vec<PathBuf>,
}

/// Runs prepared invocations. Implementations must be safe to call from
/// many tasks at once.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, request: &ToolRequest) -> Result<(), ToolError>;
}

/// Production invoker: spawns the subprocess, fails on non-zero exit, and
/// requires every declared output to exist afterwards.
#[derive(Debug, Default)]
pub struct SubprocessInvoker;

#[async_trait]
impl ToolInvoker for SubprocessInvoker {
    async fn invoke(&self, request: &ToolRequest) -> Result<(), ToolError> {
        tracing::info!(task = %request.label, program = %request.program, "invoking tool");
        let output = Command::new(&request.program)
            .args(&request.args)
            .output()
            .await
            .map_err(|source| ToolError::Spawn {
                label: request.label.clone(),
                program: request.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                label: request.label.clone(),
                program: request.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        check_outputs(request)
    }
}

/// Test invoker: records every request in call order and touches declared
/// outputs so downstream stages see them on disk.
#[derive(Debug, Default)]
pub struct RecordingInvoker {
    requests: Mutex<Vec<ToolRequest>>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests seen so far, in invocation order
    #[must_use]
    pub fn requests(&self) -> Vec<ToolRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ToolInvoker for RecordingInvoker {
    async fn invoke(&self, request: &ToolRequest) -> Result<(), ToolError> {
        for path in &request.outputs {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            std::fs::write(path, b"").map_err(|source| ToolError::Spawn {
                label: request.label.clone(),
                program: request.program.clone(),
                source,
            })?;
        }
        self.requests.lock().push(request.clone());
        check_outputs(request)
    }
}

fn check_outputs(request: &ToolRequest) -> Result<(), ToolError> {
    for path in &request.outputs {
        if !path.exists() {
            return Err(ToolError::MissingOutput {
                label: request.label.clone(),
                path: path.clone(),
            });
        }
    }
    Ok(())
}

/// Normalizer invocation for one variant input; returns the request and
/// the artifact record it will produce.
#[must_use]
pub fn normalize_request(
    config: &PipelineConfig,
    input: &VariantInput,
    label: &str,
) -> (ToolRequest, NormalizedVcf) {
    let out = config
        .normalized_dir()
        .join(format!("{}.norm.vcf.gz", input.kind));
    let request = ToolRequest {
        label: label.to_string(),
        program: NORMALIZER_PROGRAM.to_string(),
        args: vec![
            input.path.display().to_string(),
            out.display().to_string(),
        ],
        outputs: vec![out.clone()],
    };
    let artifact = NormalizedVcf {
        kind: input.kind,
        path: out,
    };
    (request, artifact)
}

/// Kinship-build invocation for one normalized call set.
///
/// The symbolic prefix is the variant tag under the kinship directory;
/// everything downstream addresses the bundle through it.
#[must_use]
pub fn grm_request(
    config: &PipelineConfig,
    normalized: &NormalizedVcf,
    label: &str,
) -> (ToolRequest, GrmBundle) {
    let prefix_path = config.grm_dir().join(normalized.kind.label());
    let prefix = prefix_path.display().to_string();
    let files: Vec<PathBuf> = ["grm.bin", "grm.id", "grm.details"]
        .iter()
        .map(|ext| PathBuf::from(format!("{prefix}.{ext}")))
        .collect();
    let request = ToolRequest {
        label: label.to_string(),
        program: KINSHIP_PROGRAM.to_string(),
        args: vec![
            "--calc-kins-direct".to_string(),
            prefix.clone(),
            "--vcf".to_string(),
            normalized.path.display().to_string(),
            "--minmaf".to_string(),
            config.maf.to_string(),
            "--power".to_string(),
            config.power.to_string(),
            "--window-prune".to_string(),
            config.ld_window.to_string(),
            "--max-threads".to_string(),
            config.threads.to_string(),
        ],
        outputs: files.clone(),
    };
    let bundle = GrmBundle {
        kind: normalized.kind,
        prefix,
        files,
    };
    (request, bundle)
}

/// Result stem for one (phenotype, source) pair. The `.reml` file the tool
/// writes under this stem is what the summarizer later parses the pair
/// back out of, so the format is part of the aggregation contract.
#[must_use]
pub fn estimate_path(config: &PipelineConfig, phenotype: &str, source: GrmSource) -> PathBuf {
    config
        .reml_dir()
        .join(format!("{phenotype}.{}.reml", source.label()))
}

fn reml_stem(path: &Path) -> String {
    // the tool appends ".reml" itself
    let s = path.display().to_string();
    s.strip_suffix(".reml").map(str::to_string).unwrap_or(s)
}

/// Single-matrix REML invocation for one (kind, phenotype) pair
#[must_use]
pub fn reml_single_request(
    config: &PipelineConfig,
    bundle: &GrmBundle,
    phenotype: &Phenotype,
    label: &str,
) -> (ToolRequest, HeritabilityEstimate) {
    let source = GrmSource::Single(bundle.kind);
    let out = estimate_path(config, &phenotype.name, source);
    let mut args = vec![
        "--reml".to_string(),
        reml_stem(&out),
        "--grm".to_string(),
        bundle.prefix.clone(),
        "--pheno".to_string(),
        phenotype.path.display().to_string(),
        "--max-threads".to_string(),
        config.threads.to_string(),
    ];
    push_covar(&mut args, config);
    let request = ToolRequest {
        label: label.to_string(),
        program: KINSHIP_PROGRAM.to_string(),
        args,
        outputs: vec![out.clone()],
    };
    let estimate = HeritabilityEstimate {
        source,
        phenotype: phenotype.name.clone(),
        path: out,
    };
    (request, estimate)
}

/// Write the kinship list manifest for one fused grouping.
///
/// Line order is the grouping's member order (SNP before INDEL before SV);
/// the downstream tool keys its reported components by line position.
pub fn write_kinship_list(
    path: &Path,
    grms: &GrmSet,
    group: FusionGroup,
    label: &str,
) -> Result<(), ToolError> {
    let mut content = String::new();
    for kind in group.members() {
        content.push_str(&grms.get(*kind).prefix);
        content.push('\n');
    }
    std::fs::write(path, content).map_err(|source| ToolError::ListWrite {
        label: label.to_string(),
        path: path.to_path_buf(),
        source,
    })
}

/// Path of the list manifest for one (phenotype, grouping) pair
#[must_use]
pub fn kinship_list_path(
    config: &PipelineConfig,
    phenotype: &str,
    group: FusionGroup,
) -> PathBuf {
    config
        .reml_dir()
        .join(format!("{phenotype}.{}.list", group.label()))
}

/// Fused REML invocation for one (phenotype, grouping) pair; the list
/// manifest must already exist.
#[must_use]
pub fn reml_fused_request(
    config: &PipelineConfig,
    list: &Path,
    phenotype: &Phenotype,
    group: FusionGroup,
    label: &str,
) -> (ToolRequest, HeritabilityEstimate) {
    let source = GrmSource::Fused(group);
    let out = estimate_path(config, &phenotype.name, source);
    let mut args = vec![
        "--reml".to_string(),
        reml_stem(&out),
        "--mgrm".to_string(),
        list.display().to_string(),
        "--pheno".to_string(),
        phenotype.path.display().to_string(),
        "--max-threads".to_string(),
        config.threads.to_string(),
    ];
    push_covar(&mut args, config);
    let request = ToolRequest {
        label: label.to_string(),
        program: KINSHIP_PROGRAM.to_string(),
        args,
        outputs: vec![out.clone()],
    };
    let estimate = HeritabilityEstimate {
        source,
        phenotype: phenotype.name.clone(),
        path: out,
    };
    (request, estimate)
}

/// Summarizer invocation over the complete estimate directory
#[must_use]
pub fn summarize_request(config: &PipelineConfig, label: &str) -> ToolRequest {
    let out = config.summary_dir().join("heritability_summary.xlsx");
    ToolRequest {
        label: label.to_string(),
        program: SUMMARIZER_PROGRAM.to_string(),
        args: vec![
            "--pattern".to_string(),
            format!("{}/*.reml", config.reml_dir().display()),
            "-o".to_string(),
            out.display().to_string(),
        ],
        outputs: vec![out],
    }
}

fn push_covar(args: &mut Vec<String>, config: &PipelineConfig) {
    if let Some(covar) = &config.covar {
        args.push("--covar".to_string());
        args.push(covar.display().to_string());
    }
}
