//! Error types for the flattening engine.

use thiserror::Error;

/// Main error type for flattening operations.
///
/// Errors are `Clone` because a single store failure may fan out to every
/// listener attached to the failing location.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlattenError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Rule has an empty collection name")]
    EmptyCollectionName,

    #[error("Unknown collection: {path}")]
    UnknownCollection { path: String },

    #[error("Duplicate rule for collection: {path}")]
    DuplicateRule { path: String },

    #[error("Invalid subscription depth: {0}")]
    InvalidDepth(u32),

    #[error("Ruleset depth {depth} exceeds limit {limit}")]
    DepthLimitExceeded { depth: u32, limit: u32 },

    #[error("Listen failed for {location}: {message}")]
    Listen { location: String, message: String },

    #[error("Snapshot kind does not match location {location}")]
    SnapshotMismatch { location: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<serde_json::Error> for FlattenError {
    fn from(e: serde_json::Error) -> Self {
        FlattenError::Deserialization(e.to_string())
    }
}

/// Result type for flattening operations.
pub type Result<T> = std::result::Result<T, FlattenError>;
