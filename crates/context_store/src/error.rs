use std::path::PathBuf;

use thiserror::Error;

/// Rejected in-memory transcript mutation. The transcript is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("n must be at least 1 (got {requested})")]
    InvalidCount { requested: i64 },

    #[error("can't pop {requested} elements from the context because it only contains {len} elements")]
    OutOfRange { requested: i64, len: usize },
}

#[derive(Debug, Error)]
pub enum ContextFileError {
    #[error("I/O error while {operation} {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse context file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path}: message #{index} (starting from zero) has an invalid \"role\" attribute: \"{role}\"")]
    InvalidRole {
        path: PathBuf,
        index: usize,
        role: String,
    },

    #[error("failed to serialize context for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ContextFileError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn serialize(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Serialize {
            path: path.into(),
            source,
        }
    }
}
