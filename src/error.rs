//! Error types for the analytical-map library.

use thiserror::Error;

/// Result type for analytical-map operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Error types that can occur while matching and aggregating detections.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Error during JSON parsing or serialization.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error during I/O operations.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid annotation data.
    #[error("Invalid annotation: {0}")]
    InvalidAnnotation(String),

    /// Invalid bounding box coordinates.
    #[error("Invalid bounding box: {0}")]
    InvalidBoundingBox(String),

    /// Missing required field in COCO format.
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Empty dataset provided.
    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    /// Invalid score or IoU threshold.
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    /// Inconsistent analysis parameters.
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// The same id appears twice within one record collection.
    #[error("Duplicate {collection} id: {id}")]
    DuplicateId { collection: &'static str, id: u64 },

    /// A record references an image that is not part of the evaluation.
    #[error("{collection} record references unknown image {image_id}")]
    UnknownImage {
        collection: &'static str,
        image_id: u64,
    },

    /// Records from different images were handed to a single matching pass.
    #[error("Image group {expected} contains a record from image {found}")]
    MixedImageGroup { expected: u64, found: u64 },

    /// Aggregation was requested before every record was classified.
    #[error("Not evaluated: {0}")]
    NotEvaluated(String),
}
