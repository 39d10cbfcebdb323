use std::num::ParseIntError;

use completion_provider::ProviderError;
use context_store::{ContextError, ContextFileError};
use thiserror::Error;

/// Failure of one command or exchange. Reported to the operator; never fatal
/// to the session loop.
#[derive(Debug, Error)]
pub enum ReplError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{0}")]
    InvalidArgumentCount(&'static str),
    #[error("{0}")]
    MissingArgument(&'static str),
    #[error("expected no arguments")]
    UnexpectedArguments,
    #[error("invalid role: \"{0}\"")]
    InvalidRole(String),
    #[error(transparent)]
    InvalidArgument(ContextError),
    #[error(transparent)]
    InvalidRange(ContextError),
    #[error("invalid integer \"{input}\": {source}")]
    ParseInteger {
        input: String,
        #[source]
        source: ParseIntError,
    },
    #[error(transparent)]
    ContextFile(#[from] ContextFileError),
    #[error("failed to send context{}: {source}", attempts_note(.attempts))]
    Network {
        attempts: u32,
        #[source]
        source: ProviderError,
    },
    #[error("stream error: {0}")]
    Stream(#[source] ProviderError),
    #[error("{0}")]
    Editor(String),
    #[error("no content in file")]
    NoContent,
}

impl From<ContextError> for ReplError {
    fn from(error: ContextError) -> Self {
        match error {
            ContextError::InvalidCount { .. } => Self::InvalidArgument(error),
            ContextError::OutOfRange { .. } => Self::InvalidRange(error),
        }
    }
}

fn attempts_note(attempts: &u32) -> String {
    if *attempts > 1 {
        format!(" after {attempts} attempts")
    } else {
        String::new()
    }
}
