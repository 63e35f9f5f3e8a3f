//! Feature source collaborators
//!
//! The pipeline consumes features from two kinds of external sources: an
//! in-process per-file extractor and an optional external batch toolbox.
//! Both are modeled as traits so they can be replaced by deterministic
//! stand-ins in tests.

use crate::error::MetricsError;
use crate::types::SequenceDescriptor;
use std::collections::BTreeMap;
use std::path::Path;

/// An in-process, synchronous per-file feature extractor.
///
/// Called once per audio file, in sequence order. A failure aborts the
/// whole batch: the collector never skips a failed file, since downstream
/// column alignment assumes complete rows.
pub trait FeatureExtractor {
    /// Namespace prefix prepended to every feature name from this source
    /// (e.g. `ac` yields columns like `ac_sharpness`).
    fn prefix(&self) -> &str;

    /// Extract a flat mapping of named scalar features from one audio file.
    fn extract(&self, file: &Path) -> Result<BTreeMap<String, f64>, MetricsError>;
}

/// The external batch analysis toolbox.
///
/// Invoked at most once per pipeline run with the full batch of sequences.
/// The result holds one inner list per sequence, one feature mapping per
/// file, in the same order as the descriptors. The run is awaited
/// synchronously; callers should impose their own timeout. Failures are
/// fatal and never retried here, because a rerun of the long batch analysis
/// requires stale result files to be purged first.
pub trait ToolboxRunner {
    /// Namespace prefix for this source's feature names (e.g. `tt`).
    fn prefix(&self) -> &str;

    /// Run the batch analysis over all sequences.
    fn run(
        &self,
        sequences: &[SequenceDescriptor],
    ) -> Result<Vec<Vec<BTreeMap<String, f64>>>, MetricsError>;
}
