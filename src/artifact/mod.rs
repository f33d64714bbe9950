//! Artifact hand-off between stages
//!
//! Tasks never share mutable state; a producer appends its artifact record
//! here and consumers look records up by key. The store is append-only for
//! the life of a run, so completion order is preserved for the event log
//! while lookups stay order-independent.
//!
//! The re-keying barrier lives here too: the three kinship branches finish
//! in whatever order the scheduler lands them, and [`collect_by_kind`]
//! rebuilds the fixed-order triple by explicit kind lookup. A kind that is
//! absent or appears twice is a structural fault of the run and raises an
//! integrity error instead of a misaligned result.

use crate::error::IntegrityError;
use crate::types::{
    GrmBundle, GrmSet, HeritabilityEstimate, NormalizedVcf, VariantKind,
};
use parking_lot::Mutex;

/// Re-key an unordered collection of kinship bundles into the fixed
/// SNP, INDEL, SV triple.
///
/// Arrival order is irrelevant; only the `kind` tag on each bundle is
/// consulted. Exactly one bundle per kind must be present.
pub fn collect_by_kind(bundles: &[GrmBundle]) -> Result<GrmSet, IntegrityError> {
    let mut snp = None;
    let mut indel = None;
    let mut sv = None;

    for bundle in bundles {
        let slot = match bundle.kind {
            VariantKind::Snp => &mut snp,
            VariantKind::Indel => &mut indel,
            VariantKind::Sv => &mut sv,
        };
        if slot.is_some() {
            return Err(IntegrityError::DuplicateKind { kind: bundle.kind });
        }
        *slot = Some(bundle.clone());
    }

    let require = |slot: Option<GrmBundle>, kind| {
        slot.ok_or(IntegrityError::MissingKind { kind })
    };
    Ok(GrmSet {
        snp: require(snp, VariantKind::Snp)?,
        indel: require(indel, VariantKind::Indel)?,
        sv: require(sv, VariantKind::Sv)?,
    })
}

/// Append-only record of everything the run has produced so far
#[derive(Debug, Default)]
pub struct ArtifactStore {
    normalized: Mutex<Vec<NormalizedVcf>>,
    bundles: Mutex<Vec<GrmBundle>>,
    estimates: Mutex<Vec<HeritabilityEstimate>>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a normalized call set
    pub fn record_normalized(&self, artifact: NormalizedVcf) {
        self.normalized.lock().push(artifact);
    }

    /// Record a kinship bundle
    pub fn record_bundle(&self, bundle: GrmBundle) {
        self.bundles.lock().push(bundle);
    }

    /// Record a heritability estimate
    pub fn record_estimate(&self, estimate: HeritabilityEstimate) {
        self.estimates.lock().push(estimate);
    }

    /// The normalized call set for one variant kind.
    ///
    /// `label` names the asking task for the error path.
    pub fn normalized_for(
        &self,
        kind: VariantKind,
        label: &str,
    ) -> Result<NormalizedVcf, IntegrityError> {
        self.normalized
            .lock()
            .iter()
            .find(|n| n.kind == kind)
            .cloned()
            .ok_or_else(|| IntegrityError::UpstreamMissing {
                label: label.to_string(),
                what: format!("normalized call set for {kind}"),
            })
    }

    /// The kinship bundle for one variant kind
    pub fn bundle_for(
        &self,
        kind: VariantKind,
        label: &str,
    ) -> Result<GrmBundle, IntegrityError> {
        self.bundles
            .lock()
            .iter()
            .find(|b| b.kind == kind)
            .cloned()
            .ok_or_else(|| IntegrityError::UpstreamMissing {
                label: label.to_string(),
                what: format!("kinship bundle for {kind}"),
            })
    }

    /// Re-keyed fixed-order triple of all three kinship bundles
    pub fn grm_set(&self) -> Result<GrmSet, IntegrityError> {
        collect_by_kind(&self.bundles.lock())
    }

    /// Snapshot of every estimate recorded so far, in completion order
    #[must_use]
    pub fn estimates(&self) -> Vec<HeritabilityEstimate> {
        self.estimates.lock().clone()
    }

    /// Count of recorded estimates
    #[must_use]
    pub fn estimate_count(&self) -> usize {
        self.estimates.lock().len()
    }
}
