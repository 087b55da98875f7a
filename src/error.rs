//! Error types for the terndb segment engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SegmentError>;

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Index corruption. Fatal: the segment refuses all further operations.
    #[error("Index corruption: {0}")]
    Corruption(String),

    /// A mutation needed more room than the last `ensure_fit` reserved.
    #[error("Out of space: {0}")]
    OutOfSpace(String),

    #[error("Segment not found: {}", .0.display())]
    SegmentNotFound(std::path::PathBuf),
}

impl From<bincode::Error> for SegmentError {
    fn from(err: bincode::Error) -> Self {
        SegmentError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for SegmentError {
    fn from(err: serde_json::Error) -> Self {
        SegmentError::Serialization(err.to_string())
    }
}
