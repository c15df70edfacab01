use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("log file '{}' not found or unreadable: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("{collaborator} failed: {message}")]
    Collaborator {
        collaborator: &'static str,
        message: String,
    },
}

impl ScanError {
    pub fn source_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScanError::SourceUnavailable {
            path: path.into(),
            source,
        }
    }

    pub fn collaborator(collaborator: &'static str, message: impl Into<String>) -> Self {
        ScanError::Collaborator {
            collaborator,
            message: message.into(),
        }
    }

    /// True when the log source itself could not be opened or vanished
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, ScanError::SourceUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
