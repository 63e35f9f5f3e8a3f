//! Feature postprocessing
//!
//! This module turns the raw collected feature table into the canonical
//! table the metric engine consumes: it aligns columns across all rows,
//! validates that every feature column is fully numeric, and applies
//! column-wise value transforms (log-scaling, standardization) so features
//! of very different magnitudes become commensurable.
//!
//! The transform is pure: every normalization constant is computed from the
//! same table it is applied to.

use crate::error::MetricsError;
use crate::types::{FeatureTable, PipelineOptions};

/// A postprocessed canonical table plus the usable feature column names.
#[derive(Debug, Clone)]
pub struct PostprocessedFeatures {
    /// Feature columns actually present in the table, sorted
    pub feature_columns: Vec<String>,
    /// The canonical table, value-transformed, row identity unchanged
    pub table: FeatureTable,
}

/// Columns whose max/min ratio exceeds this are considered wide-range and
/// get log-scaled (when they are strictly positive).
const LOG_SCALE_RATIO: f64 = 100.0;

/// Postprocessor for the raw feature table.
pub struct Postprocessor;

impl Postprocessor {
    /// Validate and transform the raw table.
    ///
    /// Fails with [`MetricsError::Data`] if the table is empty or any
    /// aligned feature column has a missing or non-finite value in any row.
    pub fn postprocess(
        table: &FeatureTable,
        options: &PipelineOptions,
    ) -> Result<PostprocessedFeatures, MetricsError> {
        if table.is_empty() {
            return Err(MetricsError::Data(
                "feature table is empty, nothing to postprocess".to_string(),
            ));
        }

        let feature_columns = table.feature_columns();
        let mut table = table.clone();

        for column in &feature_columns {
            let mut values = column_values(&table, column)?;

            if options.log_scale && is_wide_range_positive(&values) {
                values = values.iter().map(|v| v.log10()).collect();
            }
            if options.standardize {
                standardize(&mut values);
            }

            write_column(&mut table, column, &values);
        }

        Ok(PostprocessedFeatures {
            feature_columns,
            table,
        })
    }
}

/// Read one aligned column, validating presence and finiteness per row.
fn column_values(table: &FeatureTable, column: &str) -> Result<Vec<f64>, MetricsError> {
    let mut values = Vec::with_capacity(table.len());
    for row in &table.rows {
        let value = row.features.get(column).copied().ok_or_else(|| {
            MetricsError::Data(format!(
                "feature column {column} missing for {} (sequence {}, position {})",
                row.file_path.display(),
                row.sequence_index,
                row.position_index
            ))
        })?;
        if !value.is_finite() {
            return Err(MetricsError::Data(format!(
                "feature column {column} has non-finite value {value} for {}",
                row.file_path.display()
            )));
        }
        values.push(value);
    }
    Ok(values)
}

fn write_column(table: &mut FeatureTable, column: &str, values: &[f64]) {
    for (row, value) in table.rows.iter_mut().zip(values) {
        row.features.insert(column.to_string(), *value);
    }
}

/// Strictly positive column spanning more than [`LOG_SCALE_RATIO`] between
/// its smallest and largest value.
fn is_wide_range_positive(values: &[f64]) -> bool {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    min > 0.0 && max / min > LOG_SCALE_RATIO
}

/// Center on the column mean and scale by the column standard deviation.
/// Constant columns are centered only (all values become 0).
fn standardize(values: &mut [f64]) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();

    for v in values.iter_mut() {
        *v -= mean;
        if std > 0.0 {
            *v /= std;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeatureRow;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn make_table(columns: &[(&str, &[f64])]) -> FeatureTable {
        let n = columns[0].1.len();
        let rows = (0..n)
            .map(|pos| FeatureRow {
                sequence_index: 0,
                sequence_name: "morph0".to_string(),
                sequence_dir: PathBuf::from("/data/morph0"),
                position_index: pos,
                file_path: PathBuf::from(format!("/data/morph0/{pos}.wav")),
                features: columns
                    .iter()
                    .map(|(name, values)| (name.to_string(), values[pos]))
                    .collect(),
            })
            .collect();
        FeatureTable::new(rows)
    }

    #[test]
    fn test_empty_table_is_a_data_error() {
        let err =
            Postprocessor::postprocess(&FeatureTable::default(), &PipelineOptions::default())
                .unwrap_err();
        assert!(matches!(err, MetricsError::Data(_)));
    }

    #[test]
    fn test_missing_column_value_is_a_data_error() {
        let mut table = make_table(&[("ac_sharpness", &[1.0, 2.0, 3.0])]);
        table.rows[1].features.remove("ac_sharpness");
        table.rows[1]
            .features
            .insert("ac_booming".to_string(), 5.0);

        let err = Postprocessor::postprocess(&table, &PipelineOptions::default()).unwrap_err();
        assert!(matches!(err, MetricsError::Data(_)));
    }

    #[test]
    fn test_non_finite_value_is_a_data_error() {
        let table = make_table(&[("ac_sharpness", &[1.0, f64::NAN, 3.0])]);
        let err = Postprocessor::postprocess(&table, &PipelineOptions::default()).unwrap_err();
        assert!(matches!(err, MetricsError::Data(_)));
    }

    #[test]
    fn test_standardized_column_has_zero_mean_unit_std() {
        let table = make_table(&[("ac_sharpness", &[1.0, 2.0, 3.0, 4.0])]);
        let post = Postprocessor::postprocess(&table, &PipelineOptions::default()).unwrap();

        let values: Vec<f64> = post
            .table
            .rows
            .iter()
            .map(|r| r.features["ac_sharpness"])
            .collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        assert!(mean.abs() < 1e-12);
        assert!((variance - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_centers_to_zero() {
        let table = make_table(&[("ac_flat", &[7.0, 7.0, 7.0])]);
        let post = Postprocessor::postprocess(&table, &PipelineOptions::default()).unwrap();
        for row in &post.table.rows {
            assert_eq!(row.features["ac_flat"], 0.0);
        }
    }

    #[test]
    fn test_wide_range_positive_column_is_log_scaled() {
        let table = make_table(&[("ac_energy", &[1.0, 100.0, 100000.0])]);
        let options = PipelineOptions {
            standardize: false,
            ..Default::default()
        };
        let post = Postprocessor::postprocess(&table, &options).unwrap();

        let values: Vec<f64> = post
            .table
            .rows
            .iter()
            .map(|r| r.features["ac_energy"])
            .collect();
        assert!((values[0] - 0.0).abs() < 1e-12);
        assert!((values[1] - 2.0).abs() < 1e-12);
        assert!((values[2] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_narrow_or_signed_columns_keep_linear_scale() {
        let table = make_table(&[
            ("ac_narrow", &[1.0, 2.0, 3.0]),
            ("ac_signed", &[-1.0, 10.0, 100000.0]),
        ]);
        let options = PipelineOptions {
            standardize: false,
            ..Default::default()
        };
        let post = Postprocessor::postprocess(&table, &options).unwrap();

        assert_eq!(post.table.rows[2].features["ac_narrow"], 3.0);
        assert_eq!(post.table.rows[2].features["ac_signed"], 100000.0);
    }

    #[test]
    fn test_feature_column_list_reflects_table() {
        let table = make_table(&[
            ("ac_sharpness", &[1.0, 2.0, 3.0]),
            ("tt_spread", &[4.0, 5.0, 6.0]),
        ]);
        let post = Postprocessor::postprocess(&table, &PipelineOptions::default()).unwrap();
        assert_eq!(post.feature_columns, vec!["ac_sharpness", "tt_spread"]);
    }
}
