//! Core types for the pipeline
//!
//! Defines the records that flow between stages:
//! - Variant call-set inputs and their normalized forms
//! - Kinship bundles keyed by variant kind
//! - Phenotype files and heritability estimates
//! - Fusion groupings for joint estimation

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Unique task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Generate new task ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The three variant classes, in their fixed pipeline order.
///
/// The order SNP, INDEL, SV is part of the downstream contract: kinship
/// list manifests and the re-keyed bundle triple always follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VariantKind {
    /// Single-nucleotide polymorphisms
    Snp,
    /// Insertions and deletions
    Indel,
    /// Structural variants
    Sv,
}

impl VariantKind {
    /// All kinds in fixed pipeline order
    pub const ALL: [VariantKind; 3] = [VariantKind::Snp, VariantKind::Indel, VariantKind::Sv];

    /// Uppercase tag used in filenames and estimate labels
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            VariantKind::Snp => "SNP",
            VariantKind::Indel => "INDEL",
            VariantKind::Sv => "SV",
        }
    }
}

impl std::fmt::Display for VariantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One variant call-set input, fixed at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantInput {
    /// Variant class of this call set
    pub kind: VariantKind,
    /// Path to the raw call-set file
    pub path: PathBuf,
}

/// A call set rewritten by the normalizer, 1:1 with its input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedVcf {
    /// Variant class of this call set
    pub kind: VariantKind,
    /// Path to the normalized file
    pub path: PathBuf,
}

/// One kinship-matrix bundle produced by the GRM builder.
///
/// The bundle is an opaque multi-file set sharing `prefix`; the prefix is
/// the only handle downstream consumers need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrmBundle {
    /// Variant class the matrix was computed from
    pub kind: VariantKind,
    /// Symbolic prefix locating the bundle on storage
    pub prefix: String,
    /// The bundle's files, all sharing `prefix`
    pub files: Vec<PathBuf>,
}

/// The fixed-order triple of kinship bundles emitted by the re-keying
/// barrier: SNP first, INDEL second, SV third, regardless of the order the
/// branches finished in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrmSet {
    /// SNP kinship bundle
    pub snp: GrmBundle,
    /// INDEL kinship bundle
    pub indel: GrmBundle,
    /// SV kinship bundle
    pub sv: GrmBundle,
}

impl GrmSet {
    /// Bundles in fixed pipeline order
    #[inline]
    #[must_use]
    pub fn ordered(&self) -> [&GrmBundle; 3] {
        [&self.snp, &self.indel, &self.sv]
    }

    /// Bundle for one variant kind
    #[inline]
    #[must_use]
    pub fn get(&self, kind: VariantKind) -> &GrmBundle {
        match kind {
            VariantKind::Snp => &self.snp,
            VariantKind::Indel => &self.indel,
            VariantKind::Sv => &self.sv,
        }
    }
}

/// One discovered phenotype file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phenotype {
    /// Base name without extension, used in result filenames
    pub name: String,
    /// Path to the tab-separated phenotype file
    pub path: PathBuf,
}

/// Named combination of variant kinds analyzed jointly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FusionGroup {
    /// SNP and INDEL matrices together
    SnpIndel,
    /// All three matrices together
    SnpIndelSv,
}

impl FusionGroup {
    /// Both groupings, in reporting order
    pub const ALL: [FusionGroup; 2] = [FusionGroup::SnpIndel, FusionGroup::SnpIndelSv];

    /// Tag used in filenames and estimate labels
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            FusionGroup::SnpIndel => "SNP_INDEL",
            FusionGroup::SnpIndelSv => "SNP_INDEL_SV",
        }
    }

    /// Member kinds in the order the kinship list manifest requires
    #[inline]
    #[must_use]
    pub fn members(&self) -> &'static [VariantKind] {
        match self {
            FusionGroup::SnpIndel => &[VariantKind::Snp, VariantKind::Indel],
            FusionGroup::SnpIndelSv => {
                &[VariantKind::Snp, VariantKind::Indel, VariantKind::Sv]
            }
        }
    }
}

impl std::fmt::Display for FusionGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Source tag carried by every heritability estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrmSource {
    /// Estimate from one variant kind's matrix
    Single(VariantKind),
    /// Estimate from a fused grouping
    Fused(FusionGroup),
}

impl GrmSource {
    /// Tag used in filenames, e.g. "SNP" or "SNP_INDEL_SV"
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            GrmSource::Single(kind) => kind.label(),
            GrmSource::Fused(group) => group.label(),
        }
    }
}

impl std::fmt::Display for GrmSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One terminal heritability-estimate artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeritabilityEstimate {
    /// Matrix or grouping the estimate came from
    pub source: GrmSource,
    /// Phenotype base name
    pub phenotype: String,
    /// Path to the result artifact
    pub path: PathBuf,
}
