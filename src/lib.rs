//! Orchestration core for a multi-GRM heritability pipeline.
//!
//! Fans three variant call sets (SNP, INDEL, SV) out to independent
//! normalization and kinship-matrix branches, cross-joins the resulting
//! matrices against a set of phenotype files, re-keys the branch outputs
//! into fixed-order groups for joint estimation, and fans everything back
//! in for a single summary step. External genetics tools do the statistics;
//! this crate does the ordering.

pub mod artifact;
pub mod config;
pub mod dag;
pub mod logging;
pub mod pheno;
pub mod pipeline;
pub mod plan;
pub mod registry;
pub mod scheduler;
pub mod state_machine;
pub mod tools;
pub mod types;

pub mod error;

pub use config::PipelineConfig;
pub use error::*;
pub use pipeline::Pipeline;
pub use types::*;
