use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide error type. A line-level failure never produces one of
/// these — only resource-acquisition failures do (spec §7).
#[derive(Debug, Error)]
pub enum LogSculptError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("worker failed while learning patterns: {detail}")]
    Worker { detail: String },

    #[error("invalid option: {detail}")]
    InvalidOption { detail: String },

    #[error("output sink failed: {detail}")]
    Output { detail: String },
}

impl LogSculptError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LogSculptError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn worker(detail: impl Into<String>) -> Self {
        LogSculptError::Worker {
            detail: detail.into(),
        }
    }

    pub fn invalid_option(detail: impl Into<String>) -> Self {
        LogSculptError::InvalidOption {
            detail: detail.into(),
        }
    }

    pub fn output(detail: impl Into<String>) -> Self {
        LogSculptError::Output {
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LogSculptError>;
