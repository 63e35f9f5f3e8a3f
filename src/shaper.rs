//! Result shaping
//!
//! Two independent, composable post-steps over the full metrics table:
//! per-kind mean normalization and the sign/naming convention flip. This is
//! the terminal pipeline stage and the only one allowed to rewrite a table
//! it did not produce; both steps mutate the table in place, once.

use crate::types::{MetricKind, MetricsTable, PipelineOptions};

/// Result shaper applying the caller-selected output conventions.
pub struct ResultShaper;

impl ResultShaper {
    /// Apply the configured post-steps to the raw metrics table.
    pub fn shape(table: &mut MetricsTable, options: &PipelineOptions) {
        if options.normalize {
            Self::normalize(table);
        }
        if !options.positive_metrics {
            Self::flip_sign_convention(table);
        }
    }

    /// Divide every feature column by its mean across all sequences,
    /// independently per metric kind, so that each column averages to 1.
    ///
    /// A column whose mean is 0 for some kind produces non-finite values.
    /// That is a documented numerical edge case, not an error: whether to
    /// skip or reject such a column is left to the caller.
    pub fn normalize(table: &mut MetricsTable) {
        for kind in [MetricKind::Nonsmoothness, MetricKind::Nonlinearity] {
            let mut columns: Vec<String> = table
                .records_of_kind(kind)
                .iter()
                .flat_map(|r| r.values.keys().cloned())
                .collect();
            columns.sort();
            columns.dedup();

            for column in columns {
                let values: Vec<f64> = table
                    .records_of_kind(kind)
                    .iter()
                    .filter_map(|r| r.values.get(&column).copied())
                    .collect();
                if values.is_empty() {
                    continue;
                }
                let mean = values.iter().sum::<f64>() / values.len() as f64;

                for record in table.records.iter_mut().filter(|r| r.metric == kind) {
                    if let Some(value) = record.values.get_mut(&column) {
                        *value /= mean;
                    }
                }
            }
        }
    }

    /// Switch to the "positive metrics" naming: negate every value and strip
    /// the `non` prefix from the metric kinds. The returned convention is
    /// "smoothness/linearity, values <= 0, higher (closer to 0) is better".
    pub fn flip_sign_convention(table: &mut MetricsTable) {
        for record in &mut table.records {
            record.metric = record.metric.flipped();
            for value in record.values.values_mut() {
                *value = -*value;
            }
        }
    }
}
