//! Local destination resolver
//!
//! Decides what to do with the destination path of a remote clip before any
//! network I/O happens.
//!
//! ## Policies
//!
//! - **SizeChecked**: one local file per alarm event. A complete file is kept,
//!   a shorter one is a partial download and is removed, a longer one is an
//!   integrity violation.
//! - **AlwaysReplace**: one local file per revision. Any file already at the
//!   path is stale and removed.
//!
//! Under both policies a path occupied by something other than a regular
//! file is a conflict and is never removed.

use crate::error::{Result, SyncError};
use bridge_traits::storage::FileSystemAccess;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// How an existing destination file is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DestinationPolicy {
    #[default]
    SizeChecked,
    AlwaysReplace,
}

/// Outcome of resolving a destination path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadDecision {
    /// The destination already holds the complete file
    Skip,
    /// A stale local file of `local_size` bytes was removed; fetch again
    RepairAndFetch { local_size: u64 },
    /// Nothing at the destination
    Fetch,
}

impl DownloadDecision {
    pub fn needs_transfer(&self) -> bool {
        !matches!(self, DownloadDecision::Skip)
    }
}

/// Resolves destinations against the local filesystem
pub struct DestinationResolver {
    file_system: Arc<dyn FileSystemAccess>,
    policy: DestinationPolicy,
}

impl DestinationResolver {
    pub fn new(file_system: Arc<dyn FileSystemAccess>, policy: DestinationPolicy) -> Self {
        Self {
            file_system,
            policy,
        }
    }

    pub fn policy(&self) -> DestinationPolicy {
        self.policy
    }

    /// Resolve `path` for a remote file of `remote_size` bytes.
    ///
    /// Stale files are deleted before returning `RepairAndFetch`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Conflict`] if the path is not a regular file
    /// - [`SyncError::Integrity`] if the local file is larger than the
    ///   remote one (size-checked policy only); the file is left untouched
    #[instrument(skip_all, fields(path = %path.display(), remote_size = remote_size))]
    pub async fn resolve(&self, path: &Path, remote_size: u64) -> Result<DownloadDecision> {
        let metadata = self
            .file_system
            .metadata(path)
            .await
            .map_err(|e| SyncError::io(path, e))?;

        let Some(metadata) = metadata else {
            debug!("Destination does not exist");
            return Ok(DownloadDecision::Fetch);
        };

        if !metadata.is_file() {
            return Err(SyncError::Conflict {
                path: path.to_path_buf(),
            });
        }

        let local_size = metadata.size;
        match self.policy {
            DestinationPolicy::SizeChecked if local_size == remote_size => {
                Ok(DownloadDecision::Skip)
            }
            DestinationPolicy::SizeChecked if local_size > remote_size => {
                Err(SyncError::Integrity {
                    path: path.to_path_buf(),
                    local_size,
                    remote_size,
                })
            }
            DestinationPolicy::SizeChecked => {
                info!(
                    local_size,
                    remote_size, "Removing existing partially downloaded file"
                );
                self.remove(path).await?;
                Ok(DownloadDecision::RepairAndFetch { local_size })
            }
            DestinationPolicy::AlwaysReplace => {
                info!(local_size, "Removing existing file");
                self.remove(path).await?;
                Ok(DownloadDecision::RepairAndFetch { local_size })
            }
        }
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        self.file_system
            .delete_file(path)
            .await
            .map_err(|e| SyncError::io(path, e))
    }
}
