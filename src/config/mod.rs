//! Pipeline configuration
//!
//! One immutable value built at startup and threaded into every stage.
//! Nothing reads parameters from ambient state.

use crate::error::ConfigError;
use crate::types::{VariantInput, VariantKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Immutable run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// SNP call-set path
    pub snp_vcf: PathBuf,
    /// INDEL call-set path
    pub indel_vcf: PathBuf,
    /// SV call-set path
    pub sv_vcf: PathBuf,
    /// Directory of tab-separated phenotype files
    pub pheno_dir: PathBuf,
    /// Optional covariate file
    pub covar: Option<PathBuf>,
    /// Output root
    pub out_dir: PathBuf,
    /// Allele-frequency threshold passed to the kinship tool
    pub maf: f64,
    /// Kinship power exponent passed to the kinship tool
    pub power: f64,
    /// LD-pruning threshold passed to the kinship tool
    pub ld_window: f64,
    /// Worker-count hint passed to each external tool
    pub threads: usize,
}

impl PipelineConfig {
    /// The three variant inputs in fixed pipeline order
    #[inline]
    #[must_use]
    pub fn variant_inputs(&self) -> [VariantInput; 3] {
        [
            VariantInput {
                kind: VariantKind::Snp,
                path: self.snp_vcf.clone(),
            },
            VariantInput {
                kind: VariantKind::Indel,
                path: self.indel_vcf.clone(),
            },
            VariantInput {
                kind: VariantKind::Sv,
                path: self.sv_vcf.clone(),
            },
        ]
    }

    /// Check input files and numeric parameters.
    ///
    /// Runs before any task starts; a failure here means no tool is ever
    /// invoked.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for input in self.variant_inputs() {
            require_readable(&input.path)?;
        }
        if !self.pheno_dir.is_dir() {
            return Err(ConfigError::Unreadable {
                path: self.pheno_dir.clone(),
            });
        }
        if let Some(covar) = &self.covar {
            require_readable(covar)?;
        }
        if !(0.0..=0.5).contains(&self.maf) {
            return Err(ConfigError::InvalidParameter {
                name: "maf",
                value: self.maf.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.ld_window) {
            return Err(ConfigError::InvalidParameter {
                name: "ld-window",
                value: self.ld_window.to_string(),
            });
        }
        if self.threads == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "threads",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Create the output subdirectory layout
    pub fn prepare_output(&self) -> Result<(), ConfigError> {
        for dir in [
            self.normalized_dir(),
            self.grm_dir(),
            self.reml_dir(),
            self.summary_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|source| ConfigError::OutputDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Normalized call sets land here
    #[inline]
    #[must_use]
    pub fn normalized_dir(&self) -> PathBuf {
        self.out_dir.join("normalized")
    }

    /// Kinship bundles land here
    #[inline]
    #[must_use]
    pub fn grm_dir(&self) -> PathBuf {
        self.out_dir.join("grm")
    }

    /// Single and fused heritability estimates land here
    #[inline]
    #[must_use]
    pub fn reml_dir(&self) -> PathBuf {
        self.out_dir.join("reml")
    }

    /// The final summary lands here
    #[inline]
    #[must_use]
    pub fn summary_dir(&self) -> PathBuf {
        self.out_dir.join("summary")
    }

    /// Run event log path
    #[inline]
    #[must_use]
    pub fn events_path(&self) -> PathBuf {
        self.out_dir.join("kinflow.events.jsonl")
    }
}

fn require_readable(path: &Path) -> Result<(), ConfigError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ConfigError::Unreadable {
            path: path.to_path_buf(),
        })
    }
}
