//! Error types for shard-session.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for session storage operations.
#[derive(Error, Debug)]
pub enum ShardSessionError {
    /// Session identifier is too short or contains characters outside
    /// `[A-Za-z0-9,-]`.
    #[error("invalid session identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Shard directory could not be created.
    #[error("failed to create session directory {}: {source}", path.display())]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Session record could not be written in full.
    #[error("failed to write session file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Session record exists but could not be read.
    #[error("failed to read session file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Session record could not be removed.
    #[error("failed to remove session file {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session configuration was rejected.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A blocking storage task panicked or was cancelled.
    #[error("session storage task failed: {0}")]
    Task(String),
}

impl ShardSessionError {
    /// Whether this error means the identifier itself was rejected, as opposed
    /// to the storage backend failing.
    pub fn is_invalid_identifier(&self) -> bool {
        matches!(self, Self::InvalidIdentifier(_))
    }
}

/// Convenience Result type for shard-session operations.
pub type Result<T> = std::result::Result<T, ShardSessionError>;
