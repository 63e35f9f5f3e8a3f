//! Metrics report encoding
//!
//! This module wraps the final metrics table in a versioned JSON report
//! carrying producer metadata, so downstream tooling can track which engine
//! instance and version computed a given set of scores.

use crate::error::MetricsError;
use crate::types::{MetricRecord, MetricsTable};
use crate::{ENGINE_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "morph.metrics.v1";

/// Producer metadata embedded in every report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// A versioned, self-describing metrics report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub report_version: String,
    pub producer: ReportProducer,
    /// RFC 3339 timestamp of when the report was encoded
    pub computed_at_utc: String,
    pub sequence_count: usize,
    pub feature_columns: Vec<String>,
    pub metrics: Vec<MetricRecord>,
}

/// Encoder for producing metrics reports
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    /// Encode a metrics table into a report
    pub fn encode(&self, table: &MetricsTable) -> MetricsReport {
        let sequence_indices: BTreeSet<usize> =
            table.records.iter().map(|r| r.sequence_index).collect();
        let feature_columns: BTreeSet<String> = table
            .records
            .iter()
            .flat_map(|r| r.values.keys().cloned())
            .collect();

        MetricsReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: ENGINE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            sequence_count: sequence_indices.len(),
            feature_columns: feature_columns.into_iter().collect(),
            metrics: table.records.clone(),
        }
    }

    /// Encode to a pretty JSON string
    pub fn encode_to_json(&self, table: &MetricsTable) -> Result<String, MetricsError> {
        serde_json::to_string_pretty(&self.encode(table)).map_err(MetricsError::Json)
    }
}
