//! Morphing metric engine
//!
//! For each sequence and each canonical feature column, this module scores
//! how the feature evolves across the ordered sequence:
//!
//! - **non-smoothness**: RMS of a discrete second-derivative estimate
//!   (second-order central difference divided by the squared step), after
//!   <https://proceedings.neurips.cc/paper/2019/file/7d12b66d3df6af8d429c1a357d8b9e1a-Paper.pdf>
//! - **non-linearity**: RMS deviation from the ideal straight line between
//!   the first and last values.
//!
//! Values are treated as sampled at uniform positions `0, h, 2h, ..., 1`
//! with `h = 1/(n-1)`. Both metrics are 0 for constant and perfectly linear
//! sequences, and grow with curvature and deviation respectively.

use crate::error::MetricsError;
use crate::postprocess::PostprocessedFeatures;
use crate::types::{MetricKind, MetricRecord, MetricsTable};
use std::collections::BTreeMap;

/// Engine computing the per-sequence, per-feature curve-shape metrics.
pub struct MetricEngine;

impl MetricEngine {
    /// Compute the raw metrics table from the canonical feature table.
    ///
    /// Precondition: every sequence in the table has at least 3 rows. This
    /// is enforced upstream by the collector and not re-checked here.
    ///
    /// Output: exactly two records per sequence (one `nonsmoothness`, one
    /// `nonlinearity`), each holding one value per feature column and the
    /// sequence's descriptive columns copied from its first row.
    pub fn compute(features: &PostprocessedFeatures) -> Result<MetricsTable, MetricsError> {
        let table = &features.table;
        if table.is_empty() {
            return Err(MetricsError::Data(
                "canonical feature table is empty".to_string(),
            ));
        }

        let mut sequence_indices: Vec<usize> =
            table.rows.iter().map(|r| r.sequence_index).collect();
        sequence_indices.sort_unstable();
        sequence_indices.dedup();

        let mut records = Vec::with_capacity(sequence_indices.len() * 2);
        for sequence_index in sequence_indices {
            let rows = table.sequence_rows(sequence_index);
            let first = rows[0];

            let mut nonsmoothness = BTreeMap::new();
            let mut nonlinearity = BTreeMap::new();
            for column in &features.feature_columns {
                let values: Vec<f64> = rows
                    .iter()
                    .map(|r| r.features.get(column).copied().ok_or_else(|| {
                        MetricsError::Data(format!(
                            "feature column {column} missing for {}",
                            r.file_path.display()
                        ))
                    }))
                    .collect::<Result<_, _>>()?;

                nonsmoothness.insert(column.clone(), curve_nonsmoothness(&values));
                nonlinearity.insert(column.clone(), curve_nonlinearity(&values));
            }

            for (kind, values) in [
                (MetricKind::Nonsmoothness, nonsmoothness),
                (MetricKind::Nonlinearity, nonlinearity),
            ] {
                records.push(MetricRecord {
                    sequence_index,
                    sequence_name: first.sequence_name.clone(),
                    sequence_dir: first.sequence_dir.clone(),
                    metric: kind,
                    values,
                });
            }
        }

        Ok(MetricsTable::new(records))
    }
}

/// RMS of the `[1, -2, 1]` second-difference kernel over the interior
/// points, divided by `h^2` to estimate the second derivative.
pub fn curve_nonsmoothness(values: &[f64]) -> f64 {
    let n = values.len();
    debug_assert!(n >= 3, "sequences shorter than 3 are rejected upstream");
    let h = 1.0 / (n as f64 - 1.0);
    let h2 = h * h;

    let second_diffs: Vec<f64> = values
        .windows(3)
        .map(|w| (w[0] - 2.0 * w[1] + w[2]) / h2)
        .collect();
    rms(&second_diffs)
}

/// RMS of the pointwise deviation from the straight line between the first
/// and last values, sampled at the same uniform positions.
pub fn curve_nonlinearity(values: &[f64]) -> f64 {
    let n = values.len();
    debug_assert!(n >= 3, "sequences shorter than 3 are rejected upstream");
    let first = values[0];
    let last = values[n - 1];
    let step = (last - first) / (n as f64 - 1.0);

    let deviations: Vec<f64> = values
        .iter()
        .enumerate()
        .map(|(i, v)| v - (first + step * i as f64))
        .collect();
    rms(&deviations)
}

fn rms(values: &[f64]) -> f64 {
    let mean_square = values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64;
    mean_square.sqrt()
}
