// Error types, one taxonomy per service
//
// thiserror keeps the definitions ergonomic: typed matching, Display
// derivation and source chaining. The batch runner is the only place
// that turns these into user-facing event messages.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Segmentation endpoint must be an http(s) URL, got {0:?}")]
    InvalidEndpoint(String),

    #[error("API timeout must be > 0 seconds, got {0}")]
    InvalidTimeout(u64),

    #[error("Event poll interval must be > 0 ms, got {0}")]
    InvalidPollInterval(u64),
}

/// API key store errors
#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("API key is empty")]
    EmptyKey,

    #[error("Failed to read API key from {}: {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to save API key to {}: {source}", .path.display())]
    SaveFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to remove API key file {}: {source}", .path.display())]
    RemoveFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Segmentation operation errors
#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("API error: {0}")]
    Status(u16),

    #[error("API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File {} is outside the input directory", .0.display())]
    OutsideInputRoot(PathBuf),
}

/// Compositing operation errors
#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File {} is outside the input directory", .0.display())]
    OutsideInputRoot(PathBuf),

    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

/// Errors admitting a new pipeline run
#[derive(Debug, Error)]
pub enum StartError {
    #[error("A {0} run is already active")]
    Busy(&'static str),
}

// Convenience type aliases for Results
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type KeyStoreResult<T> = Result<T, KeyStoreError>;
pub type SegmentationResult<T> = Result<T, SegmentationError>;
pub type CompositeResult<T> = Result<T, CompositeError>;
