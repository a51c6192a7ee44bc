//! Store error handling
//!
//! Provides one typed error for every backend so callers can branch on the
//! kind of failure (missing key, unsupported operation, bad URI) without
//! knowing which engine produced it.

use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum KvError {
    /// The key has no value in the store
    #[error("No such key '{key}'")]
    NotFound { key: String },

    /// The backend does not implement this operation
    #[error("Operation '{operation}' is not supported by the {backend} backend")]
    Unsupported {
        operation: &'static str,
        backend: &'static str,
    },

    /// The URI names a scheme no backend is registered for
    #[error("Unknown protocol '{0}'")]
    UnknownProtocol(String),

    /// The URI has a known scheme but malformed parameters
    #[error("Invalid store URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// The storage engine could not be opened
    #[error("Failed to open store '{uri}': {source}")]
    Open {
        uri: String,
        #[source]
        source: Box<KvError>,
    },

    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Filesystem error with path context
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A key read back from an engine is not valid UTF-8
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Encoding or decoding a value failed
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// LSM-tree engine error
    #[error("Engine error: {0}")]
    Engine(#[from] fjall::Error),

    /// Error raised by a visitor or default provider
    #[error("{0}")]
    Callback(Box<dyn StdError + Send + Sync>),
}

impl KvError {
    /// Create an error from an I/O error with path context
    ///
    /// A missing file becomes `NotFound` for `key`, so filesystem absence
    /// looks the same as absence in the other backends.
    pub fn from_io(error: io::Error, path: PathBuf, key: &str) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => KvError::NotFound {
                key: key.to_string(),
            },
            io::ErrorKind::PermissionDenied => KvError::PermissionDenied {
                path,
                source: error,
            },
            _ => KvError::Io {
                path,
                source: error,
            },
        }
    }

    /// Wrap an arbitrary caller error so it can abort a traversal
    pub fn callback<E>(error: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        KvError::Callback(error.into())
    }

    pub(crate) fn unsupported(operation: &'static str, backend: &'static str) -> Self {
        KvError::Unsupported { operation, backend }
    }

    /// Check if this error means the key is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, KvError::NotFound { .. })
    }

    /// Check if this error means the backend lacks the operation
    pub fn is_unsupported(&self) -> bool {
        matches!(self, KvError::Unsupported { .. })
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            KvError::PermissionDenied { .. } => {
                Some("Check file and directory permissions of the store root.")
            }
            KvError::UnknownProtocol(_) => {
                Some("Use a plain path, 'pebble:<path>' or 'sql:<path>[?batch=N]'.")
            }
            KvError::Unsupported { .. } => {
                Some("Use a different backend, or a shallow operation such as list.")
            }
            _ => None,
        }
    }
}

/// Result type for store operations
pub type KvResult<T> = Result<T, KvError>;
