//! Error types for the morphing metrics pipeline

use thiserror::Error;

/// Errors that can occur while computing morphing metrics
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A morphing sequence does not satisfy the pipeline preconditions
    /// (fewer than 3 audio files, unreadable directory, ...). Raised before
    /// any extraction work begins.
    #[error("Invalid morphing sequence configuration: {0}")]
    Configuration(String),

    /// A per-file feature extraction call failed. Fatal for the whole
    /// batch: downstream column alignment assumes complete rows, so no
    /// partial results are produced.
    #[error("Feature extraction failed: {0}")]
    Extraction(String),

    /// Postprocessing encountered an empty table, or a feature column with
    /// missing or non-finite values after alignment.
    #[error("Invalid feature data: {0}")]
    Data(String),

    /// The external toolbox process failed to run or returned results that
    /// do not line up with the analyzed sequences. Not retried: reruns of a
    /// long batch analysis require external result-file cleanup first.
    #[error("Timbre toolbox failed: {0}")]
    Toolbox(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
