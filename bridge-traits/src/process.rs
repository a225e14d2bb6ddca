//! External Process Abstraction
//!
//! Lets the core invoke external programs (the video encoder) without
//! depending on a concrete process API, so tests can substitute a mock.

use async_trait::async_trait;
use std::ffi::OsString;

use crate::error::Result;

/// Captured result of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub status_code: Option<i32>,
    /// Captured standard output
    pub stdout: Vec<u8>,
    /// Captured standard error
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Process runner trait
///
/// Runs a program to completion with its standard output and error captured
/// rather than streamed to the terminal.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args` and wait for it to exit
    ///
    /// # Errors
    ///
    /// Returns an error only if the process could not be started. A non-zero
    /// exit status is reported through [`ProcessOutput::status_code`].
    async fn run(&self, program: &str, args: &[OsString]) -> Result<ProcessOutput>;
}
