use bridge_traits::error::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("File name '{name}' does not match MDalarm_YYYYMMDD_HHMMSS.avi")]
    FormatMismatch { name: String },

    #[error(
        "Local file {} is larger than the remote file ({local_size} > {remote_size} bytes)",
        .path.display()
    )]
    Integrity {
        path: PathBuf,
        local_size: u64,
        remote_size: u64,
    },

    #[error("Destination {} exists and is not a regular file", .path.display())]
    Conflict { path: PathBuf },

    #[error(
        "Incomplete download of {}: expected {expected} bytes, wrote {actual}",
        .path.display()
    )]
    IncompleteTransfer {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: BridgeError,
    },

    #[error("Post-download hook failed: {0}")]
    Hook(String),
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: impl Into<BridgeError>) -> Self {
        SyncError::Io {
            path: path.into(),
            source: source.into(),
        }
    }

    /// The path or name the error is about, if any
    pub fn subject(&self) -> Option<String> {
        match self {
            SyncError::FormatMismatch { name } => Some(name.clone()),
            SyncError::Integrity { path, .. }
            | SyncError::Conflict { path }
            | SyncError::IncompleteTransfer { path, .. }
            | SyncError::Io { path, .. } => Some(path.display().to_string()),
            SyncError::Provider(_) | SyncError::Hook(_) => None,
        }
    }
}

impl From<BridgeError> for SyncError {
    fn from(error: BridgeError) -> Self {
        SyncError::Provider(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
