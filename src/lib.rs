//! Morphmetrics - quality metrics for audio morphing sequences
//!
//! Given directories of ordered audio files interpolating between two sonic
//! endpoints, morphmetrics extracts per-file timbre features through
//! pluggable collaborators and scores each sequence on how smoothly and how
//! linearly every feature evolves: collection → postprocessing → curve-shape
//! metrics → result shaping.
//!
//! ## Modules
//!
//! - **collector**: file discovery, ordering and feature-row assembly
//! - **postprocess**: column alignment, validation and value transforms
//! - **engine**: the non-smoothness / non-linearity metric computation
//! - **shaper**: optional normalization and sign/naming conventions
//! - **report**: versioned JSON metrics reports
//! - **schema**: interchange format for pre-extracted feature rows

pub mod collector;
pub mod engine;
pub mod error;
pub mod extractors;
pub mod pipeline;
pub mod postprocess;
pub mod report;
pub mod schema;
pub mod shaper;
pub mod types;

pub use error::MetricsError;
pub use extractors::{FeatureExtractor, ToolboxRunner};
pub use pipeline::{
    compute_metrics, compute_metrics_from_rows, compute_metrics_sorted_by, MorphProcessor,
};
pub use types::{
    FeatureRow, FeatureTable, MetricKind, MetricRecord, MetricsTable, PipelineOptions,
    SequenceDescriptor,
};

// Schema exports
pub use schema::{RawFeatureRow, SCHEMA_VERSION};

/// Engine version embedded in all metrics reports
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for metrics reports
pub const PRODUCER_NAME: &str = "morphmetrics";
