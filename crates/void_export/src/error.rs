//! Export error types

use std::fmt;

use thiserror::Error;
use void_document::DocumentError;

/// Kind of entity a failed lookup was looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Object,
    Collection,
    Scene,
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => write!(f, "object"),
            Self::Collection => write!(f, "collection"),
            Self::Scene => write!(f, "scene"),
        }
    }
}

/// Errors raised while planning or running an export
///
/// Name collisions are never an error; the reconciler always resolves them.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Malformed or contradictory options
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required entity name is absent
    #[error("Lookup error: {kind} \"{name}\" not found")]
    Lookup { kind: LookupKind, name: String },

    /// Reading the source or writing the destination failed
    #[error("I/O error: {0}")]
    Io(#[source] DocumentError),

    /// The destination document rejected an operation
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),
}

impl ExportError {
    pub fn lookup(kind: LookupKind, name: impl Into<String>) -> Self {
        Self::Lookup {
            kind,
            name: name.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Whether the whole invocation must abort without a best-effort save
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Io(_))
    }
}

/// Result type for export operations
pub type Result<T> = std::result::Result<T, ExportError>;
