//! Phenotype and covariate file validation
//!
//! Runners call this before invoking any external tool, so a malformed
//! file fails the run at its first use with a precise location instead of
//! surfacing as an opaque tool error.

use crate::error::PhenotypeError;
use std::collections::HashSet;
use std::path::Path;

/// Missing trait values must be this literal string. Numeric sentinels
/// (-9 and friends) are rejected as malformed.
pub const MISSING_SENTINEL: &str = "NA";

/// Parsed view of a phenotype file, retained only for validation
#[derive(Debug)]
pub struct PhenotypeTable {
    /// Trait name from the header's third column
    pub trait_name: String,
    /// (FID, IID) per data row, in file order
    pub samples: Vec<(String, String)>,
    /// Count of rows whose trait value is not the missing sentinel
    pub non_missing: usize,
}

/// Validate one phenotype file.
///
/// Checks, in order: readability, the FID/IID/trait header, a fixed three
/// columns per row, trait values numeric or `NA`, and at least one
/// non-missing value overall.
pub fn validate_phenotype(path: &Path) -> Result<PhenotypeTable, PhenotypeError> {
    let content = std::fs::read_to_string(path).map_err(|source| PhenotypeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut lines = content.lines().enumerate();

    let (_, header) = lines.next().ok_or_else(|| PhenotypeError::BadHeader {
        path: path.to_path_buf(),
        found: String::new(),
    })?;
    let cols: Vec<&str> = header.split('\t').collect();
    if cols.len() != 3 || cols[0] != "FID" || cols[1] != "IID" {
        return Err(PhenotypeError::BadHeader {
            path: path.to_path_buf(),
            found: header.to_string(),
        });
    }
    let trait_name = cols[2].to_string();

    let mut samples = Vec::new();
    let mut non_missing = 0usize;
    for (idx, line) in lines {
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 3 {
            return Err(PhenotypeError::ColumnCount {
                path: path.to_path_buf(),
                line: idx + 1,
                found: fields.len(),
            });
        }
        let value = fields[2];
        if value == MISSING_SENTINEL {
            // missing, allowed
        } else if value.parse::<f64>().is_ok() {
            non_missing += 1;
        } else {
            return Err(PhenotypeError::BadValue {
                path: path.to_path_buf(),
                line: idx + 1,
                value: value.to_string(),
            });
        }
        samples.push((fields[0].to_string(), fields[1].to_string()));
    }

    if non_missing == 0 {
        return Err(PhenotypeError::AllMissing {
            path: path.to_path_buf(),
        });
    }

    Ok(PhenotypeTable {
        trait_name,
        samples,
        non_missing,
    })
}

/// Validate that a covariate file covers every sample of a phenotype.
///
/// The covariate file shares the FID/IID key columns; a phenotype sample
/// with no covariate row would silently shrink the analysis, so it is
/// rejected instead.
pub fn validate_covariate(
    covar: &Path,
    pheno: &Path,
    table: &PhenotypeTable,
) -> Result<(), PhenotypeError> {
    let content = std::fs::read_to_string(covar).map_err(|source| PhenotypeError::Io {
        path: covar.to_path_buf(),
        source,
    })?;
    let mut lines = content.lines();

    let header = lines.next().unwrap_or_default();
    let cols: Vec<&str> = header.split('\t').collect();
    if cols.len() < 3 || cols[0] != "FID" || cols[1] != "IID" {
        return Err(PhenotypeError::BadHeader {
            path: covar.to_path_buf(),
            found: header.to_string(),
        });
    }

    let covered: HashSet<(String, String)> = lines
        .filter(|l| !l.is_empty())
        .filter_map(|l| {
            let mut it = l.split('\t');
            Some((it.next()?.to_string(), it.next()?.to_string()))
        })
        .collect();

    for (fid, iid) in &table.samples {
        if !covered.contains(&(fid.clone(), iid.clone())) {
            return Err(PhenotypeError::CovariateMismatch {
                covar: covar.to_path_buf(),
                pheno: pheno.to_path_buf(),
                fid: fid.clone(),
                iid: iid.clone(),
            });
        }
    }
    Ok(())
}
