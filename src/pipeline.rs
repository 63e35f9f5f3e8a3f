//! Pipeline orchestration
//!
//! This module provides the public API for computing morphing metrics.
//! It wires the stages together: feature collection → postprocessing →
//! metric computation → result shaping.

use crate::collector::{self, Collector};
use crate::engine::MetricEngine;
use crate::error::MetricsError;
use crate::extractors::{FeatureExtractor, ToolboxRunner};
use crate::postprocess::Postprocessor;
use crate::report::{MetricsReport, ReportEncoder};
use crate::shaper::ResultShaper;
use crate::types::{FeatureTable, MetricsTable, PipelineOptions};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Compute morphing metrics for a batch of morphing directories.
///
/// Each directory must hold one ordered morphing sequence of at least 3
/// audio files. Files are ordered lexicographically; use
/// [`compute_metrics_sorted_by`] to override the order.
///
/// Returns the final metrics table (two records per sequence) together with
/// the postprocessed canonical feature table. There is no partial-success
/// mode: any stage failure fails the whole call.
pub fn compute_metrics(
    directories: &[PathBuf],
    extractor: &dyn FeatureExtractor,
    toolbox: Option<&dyn ToolboxRunner>,
    options: &PipelineOptions,
) -> Result<(MetricsTable, FeatureTable), MetricsError> {
    compute_metrics_sorted_by(directories, Path::cmp, extractor, toolbox, options)
}

/// Same as [`compute_metrics`], ordering the files of each sequence with a
/// caller-supplied comparator. The comparator must induce a deterministic
/// total order: metric computation is order-sensitive.
pub fn compute_metrics_sorted_by<F>(
    directories: &[PathBuf],
    compare: F,
    extractor: &dyn FeatureExtractor,
    toolbox: Option<&dyn ToolboxRunner>,
    options: &PipelineOptions,
) -> Result<(MetricsTable, FeatureTable), MetricsError>
where
    F: FnMut(&Path, &Path) -> Ordering,
{
    let sequences = collector::discover_sequences_sorted_by(directories, compare)?;
    let toolbox = if options.skip_toolbox { None } else { toolbox };
    let raw = Collector::collect(&sequences, extractor, toolbox)?;
    shape_from_raw(raw, options)
}

/// Compute morphing metrics from pre-extracted feature rows (for example
/// parsed from `morph.feature_row.v1` NDJSON via [`crate::schema`]).
///
/// Performs the same minimum-length precondition check as the collector:
/// every sequence present in the table must have at least 3 rows.
pub fn compute_metrics_from_rows(
    raw: FeatureTable,
    options: &PipelineOptions,
) -> Result<(MetricsTable, FeatureTable), MetricsError> {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for row in &raw.rows {
        *counts.entry(row.sequence_index).or_insert(0) += 1;
    }
    for (sequence_index, count) in &counts {
        if *count < collector::MIN_SEQUENCE_FILES {
            return Err(MetricsError::Configuration(format!(
                "sequence {sequence_index} has {count} rows, at least {} required",
                collector::MIN_SEQUENCE_FILES
            )));
        }
    }
    shape_from_raw(raw, options)
}

fn shape_from_raw(
    raw: FeatureTable,
    options: &PipelineOptions,
) -> Result<(MetricsTable, FeatureTable), MetricsError> {
    let features = Postprocessor::postprocess(&raw, options)?;
    let mut metrics = MetricEngine::compute(&features)?;
    ResultShaper::shape(&mut metrics, options);
    Ok((metrics, features.table))
}

/// Stateful pipeline wrapper bundling options with a report encoder.
///
/// Use this when several batches should share the same output conventions
/// and report provenance (one encoder instance id per processor).
pub struct MorphProcessor {
    options: PipelineOptions,
    encoder: ReportEncoder,
}

impl Default for MorphProcessor {
    fn default() -> Self {
        Self::new(PipelineOptions::default())
    }
}

impl MorphProcessor {
    /// Create a processor with the given options
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            options,
            encoder: ReportEncoder::new(),
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Process morphing directories with the configured options
    pub fn process_directories(
        &self,
        directories: &[PathBuf],
        extractor: &dyn FeatureExtractor,
        toolbox: Option<&dyn ToolboxRunner>,
    ) -> Result<(MetricsTable, FeatureTable), MetricsError> {
        compute_metrics(directories, extractor, toolbox, &self.options)
    }

    /// Process pre-extracted feature rows with the configured options
    pub fn process_rows(
        &self,
        raw: FeatureTable,
    ) -> Result<(MetricsTable, FeatureTable), MetricsError> {
        compute_metrics_from_rows(raw, &self.options)
    }

    /// Encode a metrics table into a report under this processor's identity
    pub fn encode_report(&self, metrics: &MetricsTable) -> MetricsReport {
        self.encoder.encode(metrics)
    }

    /// Encode a metrics table to pretty report JSON
    pub fn encode_report_json(&self, metrics: &MetricsTable) -> Result<String, MetricsError> {
        self.encoder.encode_to_json(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FeatureRow, MetricKind};
    use pretty_assertions::assert_eq;

    /// Raw-values options: no postprocessing transforms, no shaping.
    fn raw_options() -> PipelineOptions {
        PipelineOptions {
            log_scale: false,
            standardize: false,
            normalize: false,
            positive_metrics: true,
            skip_toolbox: false,
        }
    }

    fn table_from_sequences(sequences: &[&[f64]]) -> FeatureTable {
        let mut rows = Vec::new();
        for (seq, values) in sequences.iter().enumerate() {
            for (pos, v) in values.iter().enumerate() {
                rows.push(FeatureRow {
                    sequence_index: seq,
                    sequence_name: format!("morph{seq}"),
                    sequence_dir: PathBuf::from(format!("/data/morph{seq}")),
                    position_index: pos,
                    file_path: PathBuf::from(format!("/data/morph{seq}/{pos:04}.wav")),
                    features: [("ac_sharpness".to_string(), *v)].into_iter().collect(),
                });
            }
        }
        FeatureTable::new(rows)
    }

    /// Stand-in extractor deriving a ramp value from the file position,
    /// encoded in the file name by the test fixtures.
    struct RampExtractor;

    impl FeatureExtractor for RampExtractor {
        fn prefix(&self) -> &str {
            "ac"
        }

        fn extract(
            &self,
            file: &Path,
        ) -> Result<BTreeMap<String, f64>, MetricsError> {
            let stem = file
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| MetricsError::Extraction("bad file name".to_string()))?;
            let value: f64 = stem
                .parse()
                .map_err(|e| MetricsError::Extraction(format!("{stem}: {e}")))?;
            Ok(BTreeMap::from([("sharpness".to_string(), value)]))
        }
    }

    fn fixture_directories(lengths: &[usize]) -> Vec<PathBuf> {
        let base = std::env::temp_dir().join(format!(
            "morphmetrics_pipeline_{}",
            uuid::Uuid::new_v4()
        ));
        let mut dirs = Vec::new();
        for (seq, n) in lengths.iter().enumerate() {
            let dir = base.join(format!("morph{seq}"));
            std::fs::create_dir_all(&dir).unwrap();
            for i in 0..*n {
                std::fs::write(dir.join(format!("{i:02}.wav")), b"").unwrap();
            }
            dirs.push(dir);
        }
        dirs
    }

    #[test]
    fn test_end_to_end_ramps_score_zero() {
        // Three ramp sequences of lengths 3, 5 and 10: the sharpness value
        // is the file position, a straight line in every sequence.
        let dirs = fixture_directories(&[3, 5, 10]);
        let (metrics, features) =
            compute_metrics(&dirs, &RampExtractor, None, &raw_options()).unwrap();

        assert_eq!(metrics.len(), 6);
        assert_eq!(features.len(), 18);
        assert_eq!(features.feature_columns(), vec!["ac_sharpness"]);
        for record in &metrics.records {
            assert!(record.values["ac_sharpness"].abs() < 1e-6);
        }

        std::fs::remove_dir_all(dirs[0].parent().unwrap()).unwrap();
    }

    #[test]
    fn test_row_count_law() {
        for count in 1..5 {
            let sequences: Vec<Vec<f64>> =
                (0..count).map(|s| vec![s as f64, 1.0, 4.0, 2.0]).collect();
            let refs: Vec<&[f64]> = sequences.iter().map(|v| v.as_slice()).collect();
            let (metrics, _) =
                compute_metrics_from_rows(table_from_sequences(&refs), &raw_options()).unwrap();
            assert_eq!(metrics.len(), 2 * count);
        }
    }

    #[test]
    fn test_zigzag_scores_large() {
        let (metrics, _) = compute_metrics_from_rows(
            table_from_sequences(&[&[0.0, 10.0, 0.0, 10.0, 0.0]]),
            &raw_options(),
        )
        .unwrap();

        let ns = metrics.records_of_kind(MetricKind::Nonsmoothness)[0];
        let nl = metrics.records_of_kind(MetricKind::Nonlinearity)[0];
        assert!(ns.values["ac_sharpness"] > 100.0);
        // Equal endpoints: the ideal line is flat at 0, so the deviation is
        // the values themselves. RMS([0,10,0,10,0]) = sqrt(40).
        assert!((nl.values["ac_sharpness"] - 40.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_short_sequence_in_rows_rejected() {
        let err = compute_metrics_from_rows(
            table_from_sequences(&[&[1.0, 2.0, 3.0], &[1.0, 2.0]]),
            &raw_options(),
        )
        .unwrap_err();
        assert!(matches!(err, MetricsError::Configuration(_)));
    }

    #[test]
    fn test_sign_convention_is_involution_on_magnitudes() {
        let table = table_from_sequences(&[&[3.0, -1.0, 4.0, 1.0, 5.0]]);

        let (positive, _) =
            compute_metrics_from_rows(table.clone(), &raw_options()).unwrap();
        let negative_options = PipelineOptions {
            positive_metrics: false,
            ..raw_options()
        };
        let (negative, _) = compute_metrics_from_rows(table, &negative_options).unwrap();

        for (pos, neg) in positive.records.iter().zip(&negative.records) {
            assert_eq!(neg.metric, pos.metric.flipped());
            let p = pos.values["ac_sharpness"];
            let n = neg.values["ac_sharpness"];
            assert!((p.abs() - n.abs()).abs() < 1e-12);
            assert!(p >= 0.0);
            assert!(n <= 0.0);
        }
        let kinds: Vec<MetricKind> = negative.records.iter().map(|r| r.metric).collect();
        assert_eq!(kinds, vec![MetricKind::Smoothness, MetricKind::Linearity]);
    }

    #[test]
    fn test_normalized_metric_columns_average_to_one() {
        let options = PipelineOptions {
            normalize: true,
            ..raw_options()
        };
        let (metrics, _) = compute_metrics_from_rows(
            table_from_sequences(&[
                &[0.0, 3.0, 1.0, 7.0],
                &[2.0, 2.5, 9.0, 4.0],
                &[1.0, 8.0, 0.5, 3.0],
            ]),
            &options,
        )
        .unwrap();

        for kind in [MetricKind::Nonsmoothness, MetricKind::Nonlinearity] {
            let values: Vec<f64> = metrics
                .records_of_kind(kind)
                .iter()
                .map(|r| r.values["ac_sharpness"])
                .collect();
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            assert!((mean - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_skip_toolbox_ignores_runner() {
        struct PanickyToolbox;
        impl ToolboxRunner for PanickyToolbox {
            fn prefix(&self) -> &str {
                "tt"
            }
            fn run(
                &self,
                _sequences: &[crate::types::SequenceDescriptor],
            ) -> Result<Vec<Vec<BTreeMap<String, f64>>>, MetricsError> {
                panic!("toolbox must not run when skip_toolbox is set");
            }
        }

        let dirs = fixture_directories(&[3]);
        let options = PipelineOptions {
            skip_toolbox: true,
            ..raw_options()
        };
        let (metrics, features) =
            compute_metrics(&dirs, &RampExtractor, Some(&PanickyToolbox), &options).unwrap();

        assert_eq!(metrics.len(), 2);
        assert_eq!(features.feature_columns(), vec!["ac_sharpness"]);

        std::fs::remove_dir_all(dirs[0].parent().unwrap()).unwrap();
    }

    #[test]
    fn test_custom_sort_order_changes_metrics() {
        // Reverse order turns the ramp 0..n into n..0, still linear.
        let dirs = fixture_directories(&[4]);
        let (metrics, features) = compute_metrics_sorted_by(
            &dirs,
            |a: &Path, b: &Path| b.cmp(a),
            &RampExtractor,
            None,
            &raw_options(),
        )
        .unwrap();

        let rows = features.sequence_rows(0);
        assert_eq!(rows[0].features["ac_sharpness"], 3.0);
        for record in &metrics.records {
            assert!(record.values["ac_sharpness"].abs() < 1e-6);
        }

        std::fs::remove_dir_all(dirs[0].parent().unwrap()).unwrap();
    }

    #[test]
    fn test_processor_report_shape() {
        let processor = MorphProcessor::new(raw_options());
        let (metrics, _) = processor
            .process_rows(table_from_sequences(&[&[0.0, 5.0, 2.0]]))
            .unwrap();
        let report = processor.encode_report(&metrics);

        assert_eq!(report.sequence_count, 1);
        assert_eq!(report.metrics.len(), 2);
        assert_eq!(report.feature_columns, vec!["ac_sharpness"]);
    }
}
