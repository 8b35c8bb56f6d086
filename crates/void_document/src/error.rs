//! Document error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by document queries, mutations and persistence
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to serialize document: {0}")]
    Serialize(String),

    #[error("Unsupported document version {found} (this build reads up to {supported})")]
    VersionMismatch { found: u32, supported: u32 },

    #[error("Object '{0}' not found")]
    ObjectNotFound(String),

    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("Scene '{0}' not found")]
    SceneNotFound(String),

    #[error("Stale handle: {0}")]
    StaleHandle(String),

    #[error("Linking '{child}' under '{parent}' would create a cycle")]
    CycleDetected { child: String, parent: String },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type for document operations
pub type Result<T> = std::result::Result<T, DocumentError>;
