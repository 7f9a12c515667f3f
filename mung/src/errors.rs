use thiserror::Error;

/// Hard failures of the alignment / factorization / transform pipeline.
///
/// Per-spot extraction failures are not here: an out-of-bounds spot is
/// dropped and logged, and the run continues as long as one spot
/// remains.
#[derive(Error, Debug)]
pub enum MungError {
    /// No common rows or columns across modalities
    #[error("alignment failed: {0}")]
    Alignment(String),

    /// Requested latent dimensionality incompatible with the data shape
    #[error("dimensionality error: {0}")]
    Dimensionality(String),

    /// Transform input disagrees with the fitted modality
    #[error("shape mismatch for modality '{modality}': expected {expected} features, got {actual}")]
    ShapeMismatch {
        modality: String,
        expected: usize,
        actual: usize,
    },

    /// Transform requested between modalities absent from the fitted
    /// topology
    #[error("unknown modality '{0}' (fitted: {1})")]
    UnknownModality(String, String),

    /// Invalid join topology declaration
    #[error("invalid join topology: {0}")]
    Topology(String),

    /// Every spot fell outside the image bounds
    #[error("extraction produced no spots: {0}")]
    EmptyExtraction(String),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A linear solve or decomposition failed
    #[error("numerical failure: {0}")]
    Numeric(String),
}

pub type Result<T> = std::result::Result<T, MungError>;
