//! Core types for the morphing metrics pipeline
//!
//! This module defines the data structures that flow through each stage of
//! the pipeline: sequence descriptors, feature rows, the canonical feature
//! table, and the metrics table.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// One morphing sequence: an ordered set of audio files meant to interpolate
/// between two sonic endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceDescriptor {
    /// Zero-based index of the sequence within the batch
    pub sequence_index: usize,
    /// Human-readable name (directory basename by default)
    pub sequence_name: String,
    /// Source directory the files were discovered in
    pub sequence_dir: PathBuf,
    /// Ordered audio file paths; metric computation is order-sensitive,
    /// so this order must be deterministic. Always holds at least 3 files.
    pub files: Vec<PathBuf>,
}

impl SequenceDescriptor {
    /// Number of files (= number of positions) in the sequence
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// One row of the canonical feature table: all features extracted for a
/// single (sequence, position) pair, keyed by namespaced feature name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRow {
    pub sequence_index: usize,
    pub sequence_name: String,
    pub sequence_dir: PathBuf,
    /// Position of the file within its sequence (0-based)
    pub position_index: usize,
    pub file_path: PathBuf,
    /// Feature name -> value. Keys are prefixed per source (e.g. `ac_`,
    /// `tt_`) so the two feature sources cannot collide. BTreeMap keeps
    /// column iteration deterministic.
    pub features: BTreeMap<String, f64>,
}

/// The canonical feature table: the union of all feature rows across
/// sequences and sources, column-aligned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureTable {
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(rows: Vec<FeatureRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sorted union of feature column names present in any row.
    pub fn feature_columns(&self) -> Vec<String> {
        let mut columns = BTreeSet::new();
        for row in &self.rows {
            for name in row.features.keys() {
                columns.insert(name.clone());
            }
        }
        columns.into_iter().collect()
    }

    /// Number of distinct sequences present in the table.
    pub fn sequence_count(&self) -> usize {
        let indices: BTreeSet<usize> = self.rows.iter().map(|r| r.sequence_index).collect();
        indices.len()
    }

    /// Rows belonging to one sequence, in position order.
    pub fn sequence_rows(&self, sequence_index: usize) -> Vec<&FeatureRow> {
        let mut rows: Vec<&FeatureRow> = self
            .rows
            .iter()
            .filter(|r| r.sequence_index == sequence_index)
            .collect();
        rows.sort_by_key(|r| r.position_index);
        rows
    }
}

/// Kind of curve-shape metric carried by a metric record.
///
/// The engine always produces the "non-" framed kinds (higher is worse);
/// the result shaper may flip them to their negated counterparts
/// (higher, i.e. closer to 0 from below, is better).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Nonsmoothness,
    Nonlinearity,
    Smoothness,
    Linearity,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Nonsmoothness => "nonsmoothness",
            MetricKind::Nonlinearity => "nonlinearity",
            MetricKind::Smoothness => "smoothness",
            MetricKind::Linearity => "linearity",
        }
    }

    /// The same metric under the opposite sign convention
    /// (`nonsmoothness` <-> `smoothness`, `nonlinearity` <-> `linearity`).
    pub fn flipped(&self) -> MetricKind {
        match self {
            MetricKind::Nonsmoothness => MetricKind::Smoothness,
            MetricKind::Nonlinearity => MetricKind::Linearity,
            MetricKind::Smoothness => MetricKind::Nonsmoothness,
            MetricKind::Linearity => MetricKind::Nonlinearity,
        }
    }
}

/// One metric record: one (sequence, metric_kind) pair, holding one value
/// per feature column plus the sequence's descriptive columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    pub sequence_index: usize,
    pub sequence_name: String,
    pub sequence_dir: PathBuf,
    pub metric: MetricKind,
    /// Feature column name -> metric value for that feature
    pub values: BTreeMap<String, f64>,
}

/// The full metrics table: exactly two records per sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsTable {
    pub records: Vec<MetricRecord>,
}

impl MetricsTable {
    pub fn new(records: Vec<MetricRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records of one metric kind, in sequence order.
    pub fn records_of_kind(&self, kind: MetricKind) -> Vec<&MetricRecord> {
        self.records.iter().filter(|r| r.metric == kind).collect()
    }
}

/// Options recognized by the pipeline entry points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Skip the external toolbox integration even when a runner is supplied
    pub skip_toolbox: bool,
    /// Keep the "non-" framed metrics (>= 0, higher is worse). When false,
    /// the shaper negates all values and renames the metric kinds.
    pub positive_metrics: bool,
    /// Divide each metric column by its per-kind mean across sequences
    pub normalize: bool,
    /// Log-scale wide-range positive feature columns during postprocessing
    pub log_scale: bool,
    /// Standardize feature columns (zero mean, unit variance) during
    /// postprocessing
    pub standardize: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            skip_toolbox: false,
            positive_metrics: true,
            normalize: false,
            log_scale: true,
            standardize: true,
        }
    }
}
