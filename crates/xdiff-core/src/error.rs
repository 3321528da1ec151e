//! Error types for the mutation differ
//!
//! Errors are split by the layer that produces them:
//! - Fatal run-level failures (key list, connections, configuration)
//! - Per-key fetch failures reported by a store
//! - Batch-level failures that the retry driver may repeat
//! - Output write failures

use crate::types::Side;
use std::path::PathBuf;

/// Message carried by the not-found sentinel
pub const KEY_NOT_FOUND_MSG: &str = "key not found";

/// Fatal errors that abort a run before any worker starts
#[derive(Debug, thiserror::Error)]
pub enum DifferError {
    /// Key list file could not be read
    #[error("failed to read key list {path}: {source}")]
    KeyListRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Key list file is not a JSON array of strings
    #[error("malformed key list {path}: {source}")]
    KeyListParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Connecting or authenticating to a cluster failed
    #[error("failed to connect to {side} cluster at {url}: {reason}")]
    Connect {
        side: Side,
        url: String,
        reason: String,
    },

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DifferError {
    /// Create a connection error for one side
    pub fn connect(side: Side, url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Connect {
            side,
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }
}

/// Per-key error reported by a document store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// No document exists for the key
    #[error("key not found")]
    NotFound,

    /// Any other failure (network, auth, throttling, ...)
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Create a non-sentinel fetch error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Whether this is the not-found sentinel.
    ///
    /// Stores that surface errors as plain messages are matched on
    /// [`KEY_NOT_FOUND_MSG`] as well.
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound => true,
            Self::Other(message) => message == KEY_NOT_FOUND_MSG,
        }
    }
}

/// A single batch round failed as a whole
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    /// Not every fetch completed before the batch deadline
    #[error(
        "batch of {batch_size} keys timed out after {timeout_secs}s \
         ({pending_source} source and {pending_target} target fetches outstanding)"
    )]
    Timeout {
        batch_size: usize,
        timeout_secs: u64,
        pending_source: usize,
        pending_target: usize,
    },

    /// Every fetch task went away without reporting back
    #[error("fetch result channel closed with {pending} fetches outstanding")]
    ChannelClosed { pending: usize },
}

/// Writing one of the result files failed
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// Result could not be encoded as JSON
    #[error("failed to encode output: {0}")]
    Serialize(#[from] serde_json::Error),

    /// File write failed
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OutputError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
