//! # Core Configuration Module
//!
//! Configuration for a download run.
//!
//! ## Overview
//!
//! A [`CoreConfig`] is constructed through [`CoreConfigBuilder`], which
//! enforces fail-fast validation so that a missing token or a malformed
//! remote folder is reported before any network or disk activity.
//!
//! Values usually come from the environment:
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `DROPBOX_TOKEN` | Bearer token for the Dropbox API |
//! | `VIDEO_ROOT_DIR` | Default destination directory (falls back to `.`) |
//! | `OPTICAM_FFMPEG` | Encoder program (falls back to `ffmpeg`) |
//! | `OPTICAM_LOG` | Log filter directives |
//!
//! An env file can be loaded with [`load_env_file`] before the builder reads
//! the environment. Variables already set in the process take precedence.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{load_env_file, CoreConfigBuilder};
//!
//! load_env_file("/etc/opticam.env")?;
//! let config = CoreConfigBuilder::from_env()
//!     .remove_downloaded(true)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the Dropbox bearer token
pub const ENV_DROPBOX_TOKEN: &str = "DROPBOX_TOKEN";

/// Environment variable holding the default destination directory
pub const ENV_VIDEO_ROOT_DIR: &str = "VIDEO_ROOT_DIR";

/// Environment variable overriding the encoder program
pub const ENV_FFMPEG: &str = "OPTICAM_FFMPEG";

/// Environment variable holding log filter directives
pub const ENV_LOG_FILTER: &str = "OPTICAM_LOG";

/// Folder the camera uploads into
pub const DEFAULT_REMOTE_FOLDER: &str = "/apps/ipcamera";

/// Default process umask, in the form accepted by [`parse_umask`]
pub const DEFAULT_UMASK: &str = "0o022";

/// Default encoder program
pub const DEFAULT_ENCODER: &str = "ffmpeg";

/// Default timeout for remote API calls
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for one download run.
#[derive(Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Dropbox bearer token
    pub access_token: String,

    /// Local directory receiving the videos
    pub video_root: PathBuf,

    /// Remote folder to list
    pub remote_folder: String,

    /// Timeout for remote API calls (downloads are not bounded)
    pub request_timeout: Duration,

    /// Encoder program used when transcoding
    pub encoder_program: String,

    /// Feature flags
    pub features: FeatureFlags,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("access_token", &"[REDACTED]")
            .field("video_root", &self.video_root)
            .field("remote_folder", &self.remote_folder)
            .field("request_timeout", &self.request_timeout)
            .field("encoder_program", &self.encoder_program)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional behavior of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    /// Delete the remote file after a successful download
    pub remove_downloaded: bool,

    /// Transcode each downloaded video
    pub transcode_after_download: bool,

    /// Also delete remote files whose local copy is already complete.
    /// Has no effect unless `remove_downloaded` is set.
    pub remove_skipped: bool,

    /// Download every revision of each video instead of the latest content
    pub download_revisions: bool,
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The access token is not empty
    /// - The destination root is not empty
    /// - The remote folder is an absolute Dropbox path
    /// - The request timeout is not zero
    /// - An encoder is named when transcoding is enabled
    pub fn validate(&self) -> Result<()> {
        if self.access_token.trim().is_empty() {
            return Err(Error::Config("Access token cannot be empty".to_string()));
        }

        if self.video_root.as_os_str().is_empty() {
            return Err(Error::Config(
                "Destination directory cannot be empty".to_string(),
            ));
        }

        if !self.remote_folder.starts_with('/') {
            return Err(Error::Config(format!(
                "Remote folder must start with '/': {}",
                self.remote_folder
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if self.features.transcode_after_download && self.encoder_program.trim().is_empty() {
            return Err(Error::Config(
                "Transcoding enabled but no encoder program configured".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    access_token: Option<String>,
    video_root: Option<PathBuf>,
    remote_folder: Option<String>,
    request_timeout: Option<Duration>,
    encoder_program: Option<String>,
    features: FeatureFlags,
}

impl fmt::Debug for CoreConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfigBuilder")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("video_root", &self.video_root)
            .field("remote_folder", &self.remote_folder)
            .field("features", &self.features)
            .finish()
    }
}

impl CoreConfigBuilder {
    /// Pre-populates the builder from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Pre-populates the builder from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset. The destination falls back to `.`
    /// when `VIDEO_ROOT_DIR` is missing.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Self {
            access_token: get(ENV_DROPBOX_TOKEN),
            video_root: Some(
                get(ENV_VIDEO_ROOT_DIR)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(".")),
            ),
            encoder_program: get(ENV_FFMPEG),
            ..Self::default()
        }
    }

    /// Sets the Dropbox bearer token.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets the destination directory.
    pub fn video_root<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.video_root = Some(path.into());
        self
    }

    /// Sets the remote folder.
    ///
    /// Default: `/apps/ipcamera`
    pub fn remote_folder(mut self, folder: impl Into<String>) -> Self {
        self.remote_folder = Some(folder.into());
        self
    }

    /// Sets the remote API call timeout.
    ///
    /// Default: 30 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the encoder program.
    ///
    /// Default: `ffmpeg`
    pub fn encoder_program(mut self, program: impl Into<String>) -> Self {
        self.encoder_program = Some(program.into());
        self
    }

    pub fn remove_downloaded(mut self, enabled: bool) -> Self {
        self.features.remove_downloaded = enabled;
        self
    }

    pub fn transcode_after_download(mut self, enabled: bool) -> Self {
        self.features.transcode_after_download = enabled;
        self
    }

    pub fn remove_skipped(mut self, enabled: bool) -> Self {
        self.features.remove_skipped = enabled;
        self
    }

    pub fn download_revisions(mut self, enabled: bool) -> Self {
        self.features.download_revisions = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the token or destination is missing, or
    /// when [`CoreConfig::validate`] rejects a value.
    pub fn build(self) -> Result<CoreConfig> {
        let access_token = self.access_token.ok_or_else(|| {
            Error::Config(format!(
                "Dropbox access token is required. Set {} or use .access_token() to set it.",
                ENV_DROPBOX_TOKEN
            ))
        })?;

        let video_root = self.video_root.ok_or_else(|| {
            Error::Config(
                "Destination directory is required. Use .video_root() to set it.".to_string(),
            )
        })?;

        let config = CoreConfig {
            access_token,
            video_root,
            remote_folder: self
                .remote_folder
                .unwrap_or_else(|| DEFAULT_REMOTE_FOLDER.to_string()),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            encoder_program: self
                .encoder_program
                .unwrap_or_else(|| DEFAULT_ENCODER.to_string()),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}

/// Loads variables from an env file into the process environment.
///
/// Variables that are already set are left untouched.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    dotenvy::from_path(path).map_err(|e| {
        Error::Config(format!(
            "Failed to load env file {}: {}",
            path.display(),
            e
        ))
    })
}

/// Parses an octal umask written as `0o022`, `0022` or `022`.
pub fn parse_umask(value: &str) -> Result<u32> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0o")
        .or_else(|| trimmed.strip_prefix("0O"))
        .unwrap_or(trimmed);

    if digits.is_empty() {
        return Err(Error::Config(format!("Invalid umask '{}'", value)));
    }

    let mask = u32::from_str_radix(digits, 8)
        .map_err(|_| Error::Config(format!("Invalid umask '{}': not an octal number", value)))?;

    if mask > 0o777 {
        return Err(Error::Config(format!(
            "Invalid umask '{}': must be between 0o000 and 0o777",
            value
        )));
    }

    Ok(mask)
}
