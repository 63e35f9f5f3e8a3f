//! Feature collection
//!
//! This module turns morphing directories into the raw canonical feature
//! table: it discovers and orders the audio files of each sequence, checks
//! the minimum-length precondition, runs the in-process extractor once per
//! file, merges optional toolbox results, and tags every row with its
//! sequence and position identifiers.

use crate::error::MetricsError;
use crate::extractors::{FeatureExtractor, ToolboxRunner};
use crate::types::{FeatureRow, FeatureTable, SequenceDescriptor};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Minimum number of files per morphing sequence. Curve-shape metrics are
/// degenerate below this.
pub const MIN_SEQUENCE_FILES: usize = 3;

/// Audio container extensions the collector recognizes. Broader format
/// support is the extractor's concern, not the collector's.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav"];

/// Discover morphing sequences with the default (lexicographic) file order.
pub fn discover_sequences(
    directories: &[PathBuf],
) -> Result<Vec<SequenceDescriptor>, MetricsError> {
    discover_sequences_sorted_by(directories, Path::cmp)
}

/// Discover morphing sequences, ordering files with a caller-supplied
/// comparator. Metric computation is order-sensitive, so the comparator
/// must induce a deterministic total order.
///
/// Fails fast with [`MetricsError::Configuration`] before any extraction
/// work if a directory is unreadable or yields fewer than
/// [`MIN_SEQUENCE_FILES`] audio files.
pub fn discover_sequences_sorted_by<F>(
    directories: &[PathBuf],
    mut compare: F,
) -> Result<Vec<SequenceDescriptor>, MetricsError>
where
    F: FnMut(&Path, &Path) -> Ordering,
{
    let mut sequences = Vec::with_capacity(directories.len());

    for (sequence_index, dir) in directories.iter().enumerate() {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            MetricsError::Configuration(format!(
                "cannot read morphing directory {}: {e}",
                dir.display()
            ))
        })?;

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                MetricsError::Configuration(format!(
                    "cannot read entry in {}: {e}",
                    dir.display()
                ))
            })?;
            let path = entry.path();
            if is_audio_file(&path) {
                files.push(path);
            }
        }
        files.sort_by(|a, b| compare(a, b));

        let sequence_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());

        let descriptor = SequenceDescriptor {
            sequence_index,
            sequence_name,
            sequence_dir: dir.clone(),
            files,
        };
        validate_sequence(&descriptor)?;
        sequences.push(descriptor);
    }

    Ok(sequences)
}

/// Check the minimum-length precondition on one descriptor.
pub fn validate_sequence(sequence: &SequenceDescriptor) -> Result<(), MetricsError> {
    if sequence.len() < MIN_SEQUENCE_FILES {
        return Err(MetricsError::Configuration(format!(
            "morphing directory {} must contain at least {} audio files ({} found)",
            sequence.sequence_dir.display(),
            MIN_SEQUENCE_FILES,
            sequence.len()
        )));
    }
    Ok(())
}

fn is_audio_file(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    match path.extension() {
        Some(ext) => AUDIO_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known)),
        None => false,
    }
}

/// Collector for assembling the raw canonical feature table.
pub struct Collector;

impl Collector {
    /// Collect features for all sequences into one flat table.
    ///
    /// The extractor is called once per file, sequentially; the first
    /// failure aborts the whole batch. The toolbox, when present, is
    /// invoked exactly once for the full batch and its per-file mappings
    /// are merged into the matching rows under the toolbox's prefix.
    pub fn collect(
        sequences: &[SequenceDescriptor],
        extractor: &dyn FeatureExtractor,
        toolbox: Option<&dyn ToolboxRunner>,
    ) -> Result<FeatureTable, MetricsError> {
        for sequence in sequences {
            validate_sequence(sequence)?;
        }

        let mut rows = Vec::new();
        for sequence in sequences {
            for (position_index, file) in sequence.files.iter().enumerate() {
                let extracted = extractor.extract(file).map_err(|e| {
                    MetricsError::Extraction(format!("{}: {e}", file.display()))
                })?;
                let features = namespace_features(extractor.prefix(), extracted);
                rows.push(FeatureRow {
                    sequence_index: sequence.sequence_index,
                    sequence_name: sequence.sequence_name.clone(),
                    sequence_dir: sequence.sequence_dir.clone(),
                    position_index,
                    file_path: file.clone(),
                    features,
                });
            }
        }

        let mut table = FeatureTable::new(rows);
        if let Some(runner) = toolbox {
            Self::merge_toolbox(&mut table, sequences, runner)?;
        }
        Ok(table)
    }

    fn merge_toolbox(
        table: &mut FeatureTable,
        sequences: &[SequenceDescriptor],
        runner: &dyn ToolboxRunner,
    ) -> Result<(), MetricsError> {
        let results = runner.run(sequences)?;
        if results.len() != sequences.len() {
            return Err(MetricsError::Toolbox(format!(
                "toolbox returned {} sequence results, expected {}",
                results.len(),
                sequences.len()
            )));
        }

        for (sequence, per_file) in sequences.iter().zip(&results) {
            if per_file.len() != sequence.len() {
                return Err(MetricsError::Toolbox(format!(
                    "toolbox returned {} file results for {}, expected {}",
                    per_file.len(),
                    sequence.sequence_name,
                    sequence.len()
                )));
            }
            for (position_index, extracted) in per_file.iter().enumerate() {
                let row = table
                    .rows
                    .iter_mut()
                    .find(|r| {
                        r.sequence_index == sequence.sequence_index
                            && r.position_index == position_index
                    })
                    .ok_or_else(|| {
                        MetricsError::Toolbox(format!(
                            "no feature row for sequence {} position {position_index}",
                            sequence.sequence_index
                        ))
                    })?;
                row.features
                    .extend(namespace_features(runner.prefix(), extracted.clone()));
            }
        }
        Ok(())
    }
}

fn namespace_features(
    prefix: &str,
    features: BTreeMap<String, f64>,
) -> BTreeMap<String, f64> {
    features
        .into_iter()
        .map(|(name, value)| (format!("{prefix}_{name}"), value))
        .collect()
}
