//! Unified error type for the lustmolch workspace.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum LustmolchError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A host command could not be spawned or exited unsuccessfully.
    #[error("command `{program}` failed: {message}")]
    Command {
        /// Program that was executed.
        program: String,
        /// Exit status or spawn failure, plus captured stderr if any.
        message: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A resource that must be fresh already exists.
    #[error("{kind} already exists: {id}")]
    AlreadyExists {
        /// Type of the resource.
        kind: &'static str,
        /// Identifier of the resource.
        id: String,
    },

    /// A container or user name is not usable.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A template could not be loaded or rendered.
    #[error("template {name}: {message}")]
    Template {
        /// Template name.
        name: String,
        /// Renderer message, including the full error chain.
        message: String,
    },

    /// An allocation sequence (ports, addresses) ran out of values.
    #[error("no free {resource} left")]
    Exhausted {
        /// What ran out.
        resource: &'static str,
    },

    /// A permission or privilege error.
    #[error("permission denied: {message}")]
    PermissionDenied {
        /// Description of the denied operation.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl LustmolchError {
    /// Wraps an I/O error with the path it happened at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, LustmolchError>;
