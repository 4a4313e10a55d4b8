use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Everything that can go wrong inside one polling cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("record {index} is missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("record {index} has an invalid `{field}`: {reason}")]
    InvalidField {
        index: usize,
        field: &'static str,
        reason: String,
    },

    #[error("cannot analyze an empty table")]
    EmptyTable,

    #[error("workbook {path:?}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl CycleError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
