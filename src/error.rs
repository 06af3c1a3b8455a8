//! Error types for the media sorter

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for media sorter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the media sorter
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Failed to read EXIF data from {path}: {message}")]
    ExifRead { path: PathBuf, message: String },

    #[error("Failed to parse timestamp from {source_info}: {message}")]
    TimestampParse { source_info: String, message: String },

    #[error("Invalid name template {template:?}: {message}")]
    Template { template: String, message: String },

    #[error("Source {path} is not a directory")]
    InvalidSource { path: PathBuf },

    #[error("Failed to {operation} {source_path} to {destination}: {source}")]
    Placement {
        operation: &'static str,
        source_path: PathBuf,
        destination: PathBuf,
        source: std::io::Error,
    },

    #[error("No free name for {source_path} after {attempts} dedupe attempts")]
    DedupeExhausted { source_path: PathBuf, attempts: u32 },
}
