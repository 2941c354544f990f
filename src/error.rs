//! Error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the mock store, matcher, and engine.
#[derive(Debug, Error)]
pub enum HotMockError {
    /// Filesystem access failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A canonical collection file exists but could not be parsed, so it
    /// is not safe to overwrite.
    #[error("malformed mock collection {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Serializing a collection or the settings file failed.
    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A stored `url_pattern` is not a valid regular expression.
    #[error("invalid url_pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A scenario name that is empty or not a single path segment.
    #[error("invalid scenario name `{0}`")]
    InvalidScenario(String),

    /// An HTTP method name outside the supported set.
    #[error("unsupported HTTP method `{0}`")]
    InvalidMethod(String),

    /// The live transport failed while passing a request through.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl HotMockError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HotMockError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure reported by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Used by transports that are not backed by reqwest.
    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = HotMockError> = std::result::Result<T, E>;
