//! Source registries
//!
//! Two static catalogs built once at startup: the fixed three-entry variant
//! table and the discovered phenotype set. Both are immutable for the life
//! of a run; every downstream stage borrows from them.

use crate::config::PipelineConfig;
use crate::error::ConfigError;
use crate::types::{Phenotype, VariantInput};
use std::path::Path;

/// Fixed catalog of the three variant call-set inputs
#[derive(Debug, Clone)]
pub struct VariantRegistry {
    inputs: [VariantInput; 3],
}

impl VariantRegistry {
    /// Build from configuration
    #[inline]
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            inputs: config.variant_inputs(),
        }
    }

    /// The inputs in fixed pipeline order
    #[inline]
    #[must_use]
    pub fn inputs(&self) -> &[VariantInput; 3] {
        &self.inputs
    }
}

/// Catalog of phenotype files discovered from a directory
#[derive(Debug, Clone)]
pub struct PhenotypeRegistry {
    phenotypes: Vec<Phenotype>,
}

impl PhenotypeRegistry {
    /// Scan a directory for phenotype files.
    ///
    /// Accepts `.tsv` and `.txt` entries, sorted by file name so task
    /// labels and the summary are stable across runs. An empty result is a
    /// configuration error.
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        let entries = std::fs::read_dir(dir).map_err(|_| ConfigError::Unreadable {
            path: dir.to_path_buf(),
        })?;

        let mut phenotypes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|_| ConfigError::Unreadable {
                path: dir.to_path_buf(),
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match path.extension().and_then(|e| e.to_str()) {
                Some("tsv") | Some("txt") => {}
                _ => continue,
            }
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            if name.is_empty() {
                continue;
            }
            phenotypes.push(Phenotype { name, path });
        }

        if phenotypes.is_empty() {
            return Err(ConfigError::NoPhenotypes {
                dir: dir.to_path_buf(),
            });
        }
        phenotypes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self { phenotypes })
    }

    /// The discovered phenotypes, sorted by name
    #[inline]
    #[must_use]
    pub fn phenotypes(&self) -> &[Phenotype] {
        &self.phenotypes
    }

    /// Number of phenotypes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.phenotypes.len()
    }

    /// Whether the registry is empty (never true after `discover`)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phenotypes.is_empty()
    }
}
