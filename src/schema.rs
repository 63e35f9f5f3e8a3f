//! morph.feature_row.v1 schema definition
//!
//! Interchange schema for externally supplied feature rows. Callers that run
//! feature extraction elsewhere (or replay stored toolbox results) can feed
//! the pipeline NDJSON rows in this shape instead of going through the
//! collector's extractor interface.

use crate::error::MetricsError;
use crate::types::{FeatureRow, FeatureTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Current schema version
pub const SCHEMA_VERSION: &str = "morph.feature_row.v1";

/// One externally supplied feature row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFeatureRow {
    /// Schema version tag; rejected when it does not match
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub sequence_index: usize,
    pub sequence_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_dir: Option<PathBuf>,
    pub position_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    /// Namespaced feature name -> value
    pub features: BTreeMap<String, f64>,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl RawFeatureRow {
    /// Validate the row against the schema rules.
    pub fn validate(&self) -> Result<(), MetricsError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(MetricsError::Data(format!(
                "unsupported schema version {} (expected {SCHEMA_VERSION})",
                self.schema_version
            )));
        }
        if self.features.is_empty() {
            return Err(MetricsError::Data(format!(
                "row (sequence {}, position {}) has no features",
                self.sequence_index, self.position_index
            )));
        }
        for (name, value) in &self.features {
            if !value.is_finite() {
                return Err(MetricsError::Data(format!(
                    "feature {name} is non-finite in row (sequence {}, position {})",
                    self.sequence_index, self.position_index
                )));
            }
        }
        Ok(())
    }

    /// Convert into an internal feature row, filling defaults for the
    /// optional descriptive fields.
    pub fn into_feature_row(self) -> FeatureRow {
        let sequence_dir = self
            .sequence_dir
            .unwrap_or_else(|| PathBuf::from(&self.sequence_name));
        let file_path = self.file_path.unwrap_or_else(|| {
            sequence_dir.join(format!("{:04}.wav", self.position_index))
        });
        FeatureRow {
            sequence_index: self.sequence_index,
            sequence_name: self.sequence_name,
            sequence_dir,
            position_index: self.position_index,
            file_path,
            features: self.features,
        }
    }
}

/// Parse NDJSON (one row object per line) into a raw feature table.
///
/// Every row is schema-validated; any malformed line fails the whole parse.
pub fn parse_ndjson(input: &str) -> Result<FeatureTable, MetricsError> {
    let mut rows = Vec::new();
    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let raw: RawFeatureRow = serde_json::from_str(line)?;
        raw.validate()?;
        rows.push(raw.into_feature_row());
    }
    Ok(FeatureTable::new(rows))
}

/// Parse a JSON array of rows into a raw feature table.
pub fn parse_json_array(input: &str) -> Result<FeatureTable, MetricsError> {
    let raws: Vec<RawFeatureRow> = serde_json::from_str(input)?;
    let mut rows = Vec::with_capacity(raws.len());
    for raw in raws {
        raw.validate()?;
        rows.push(raw.into_feature_row());
    }
    Ok(FeatureTable::new(rows))
}
