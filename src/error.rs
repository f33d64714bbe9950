//! Error types for the pipeline
//!
//! The taxonomy mirrors the failure classes of a run:
//! - Configuration problems caught before any task starts
//! - External tool invocations that fail or leave no output
//! - Integrity violations in collected branch outputs
//! - Malformed phenotype or covariate inputs

use crate::types::{TaskId, VariantKind};
use std::path::PathBuf;

/// Main pipeline error type
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Configuration problem, fatal before any task starts
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// External tool invocation failed
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    /// Collected artifacts violate a structural invariant
    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// Phenotype or covariate input is malformed
    #[error("phenotype error: {0}")]
    Phenotype(#[from] PhenotypeError),

    /// Task graph construction failed
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Illegal task lifecycle transition
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Run event log failure
    #[error("event log error: {0}")]
    Log(#[from] LogError),

    /// Runtime fault that is not a task's own failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Whether the failure indicates misaligned or corrupted pipeline
    /// structure rather than a bad input or a failing tool.
    #[inline]
    #[must_use]
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An input file is missing or unreadable
    #[error("input not readable: {}", .path.display())]
    Unreadable { path: PathBuf },

    /// The phenotype directory contains no phenotype files
    #[error("no phenotype files found in {}", .dir.display())]
    NoPhenotypes { dir: PathBuf },

    /// A numeric parameter is out of range
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: String },

    /// Output directory could not be prepared
    #[error("cannot create output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// External tool invocation errors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The tool process could not be spawned
    #[error("task {label}: failed to spawn {program}: {source}")]
    Spawn {
        label: String,
        program: String,
        source: std::io::Error,
    },

    /// The tool exited non-zero
    #[error("task {label}: {program} exited with {status}: {stderr}")]
    Failed {
        label: String,
        program: String,
        status: String,
        stderr: String,
    },

    /// The tool exited zero but an expected output file is absent
    #[error("task {label}: expected output missing: {}", .path.display())]
    MissingOutput { label: String, path: PathBuf },

    /// A list manifest for a fused run could not be written
    #[error("task {label}: cannot write kinship list {}: {source}", .path.display())]
    ListWrite {
        label: String,
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Structural integrity errors in collected branch outputs
#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    /// A variant kind produced no kinship bundle
    #[error("no kinship bundle collected for {kind}")]
    MissingKind { kind: VariantKind },

    /// A variant kind produced more than one kinship bundle
    #[error("duplicate kinship bundle collected for {kind}")]
    DuplicateKind { kind: VariantKind },

    /// A task asked for an upstream artifact that was never recorded
    #[error("task {label}: upstream artifact absent: {what}")]
    UpstreamMissing { label: String, what: String },

    /// The terminal barrier saw the wrong number of estimates
    #[error("aggregation expected {expected} estimates, found {found}")]
    EstimateCount { expected: usize, found: usize },
}

/// Phenotype and covariate input errors
#[derive(Debug, thiserror::Error)]
pub enum PhenotypeError {
    /// The file could not be read
    #[error("{}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },

    /// The header row is not FID, IID, trait
    #[error("{}: bad header, expected FID/IID/<trait>, got {found:?}", .path.display())]
    BadHeader { path: PathBuf, found: String },

    /// A data row has the wrong number of columns
    #[error("{}:{line}: expected 3 columns, found {found}", .path.display())]
    ColumnCount {
        path: PathBuf,
        line: usize,
        found: usize,
    },

    /// A trait value is neither numeric nor the missing sentinel
    #[error("{}:{line}: invalid trait value {value:?} (missing values must be NA)", .path.display())]
    BadValue {
        path: PathBuf,
        line: usize,
        value: String,
    },

    /// Every trait value in the file is missing
    #[error("{}: all trait values are missing", .path.display())]
    AllMissing { path: PathBuf },

    /// The covariate file does not cover a phenotype sample
    #[error("{}: sample {fid}/{iid} from {} has no covariate row", .covar.display(), .pheno.display())]
    CovariateMismatch {
        covar: PathBuf,
        pheno: PathBuf,
        fid: String,
        iid: String,
    },
}

/// Task graph errors
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// An edge would create a cycle
    #[error("cycle detected in task graph")]
    CycleDetected,

    /// An edge references a task not in the graph
    #[error("unknown task in edge: {0}")]
    UnknownTask(TaskId),

    /// A task depends on itself
    #[error("self loop on task {0}")]
    SelfLoop(TaskId),
}

/// Task lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The requested transition is not allowed
    #[error("illegal transition {from:?} -> {to:?} on task {task}")]
    IllegalTransition {
        task: TaskId,
        from: crate::state_machine::TaskState,
        to: crate::state_machine::TaskState,
    },

    /// The task has no recorded state
    #[error("unknown task {0}")]
    UnknownTask(TaskId),
}

/// Run event log errors
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The hash chain does not verify
    #[error("event log hash chain broken at entry {index}")]
    ChainBroken { index: usize },

    /// The log file could not be written
    #[error("cannot write event log {}: {source}", .path.display())]
    Write { path: PathBuf, source: std::io::Error },
}
