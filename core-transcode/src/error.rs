use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error(
        "Encoder failed on {} ({}): {}",
        .source_path.display(),
        status_label(.status),
        .stderr.trim()
    )]
    EncoderFailed {
        source_path: PathBuf,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Failed to run encoder '{program}': {message}")]
    Spawn { program: String, message: String },

    #[error("Cannot transcode {}: not a regular file or already in the target format", .path.display())]
    InvalidSource { path: PathBuf },

    #[error("Filesystem error: {0}")]
    Filesystem(String),
}

fn status_label(status: &Option<i32>) -> String {
    match *status {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, TranscodeError>;
