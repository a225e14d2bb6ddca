//! # Sync Coordinator
//!
//! Drives one download run from the remote alarm folder into a local
//! destination root.
//!
//! ## Workflow
//!
//! 1. List the remote folder (the provider follows pagination)
//! 2. Keep `.avi` clips, expanding them into revisions when keyed by revision
//! 3. For each candidate, in listing order:
//!    - derive the destination path from the clip name
//!    - resolve it against the local filesystem
//!    - transfer the clip unless it is already complete
//!    - optionally remove the remote source
//!    - optionally run the post-download hook
//! 4. Emit a completion event with the run report
//!
//! Candidates are processed strictly one after another. The first fatal
//! error aborts the run; re-running is the recovery mechanism since every
//! decision is derived from the local filesystem.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{SyncConfig, SyncCoordinator};
//! use std::sync::Arc;
//!
//! let coordinator = SyncCoordinator::new(
//!     SyncConfig::from_core(&core_config),
//!     provider,
//!     file_system,
//!     event_bus,
//! );
//! let report = coordinator.run().await?;
//! println!("Downloaded {} videos", report.downloaded);
//! ```

use crate::{
    filter::{self, SyncKey},
    resolver::{DestinationPolicy, DestinationResolver, DownloadDecision},
    timestamp::{destination_file_name, RecordingTimestamp},
    Result, SyncError,
};
use async_trait::async_trait;
use bridge_traits::storage::{FileSystemAccess, RemoteFile, StorageProvider};
use core_runtime::config::{CoreConfig, DEFAULT_REMOTE_FOLDER};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use futures::TryStreamExt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

/// Sync coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Remote folder holding the alarm clips
    pub remote_folder: String,

    /// Local destination root; made absolute when a run starts
    pub destination_root: PathBuf,

    /// Delete the remote source after a successful download
    pub remove_downloaded: bool,

    /// Also delete the remote source when the local copy is already
    /// complete. Has no effect unless `remove_downloaded` is set.
    pub remove_skipped: bool,

    /// Treatment of existing destination files
    pub policy: DestinationPolicy,

    /// One file per event or one file per revision
    pub key: SyncKey,

    /// Ask the provider for media info when listing
    pub include_media_info: bool,
}

impl SyncConfig {
    pub fn new(destination_root: impl Into<PathBuf>) -> Self {
        Self {
            remote_folder: DEFAULT_REMOTE_FOLDER.to_string(),
            destination_root: destination_root.into(),
            remove_downloaded: false,
            remove_skipped: false,
            policy: DestinationPolicy::SizeChecked,
            key: SyncKey::Event,
            include_media_info: true,
        }
    }

    /// Derive the run configuration from validated core settings
    pub fn from_core(config: &CoreConfig) -> Self {
        let base = Self {
            remote_folder: config.remote_folder.clone(),
            remove_downloaded: config.features.remove_downloaded,
            remove_skipped: config.features.remove_skipped,
            ..Self::new(config.video_root.clone())
        };

        if config.features.download_revisions {
            base.by_revision()
        } else {
            base
        }
    }

    /// Download every revision to its own file, replacing stale copies
    pub fn by_revision(mut self) -> Self {
        self.key = SyncKey::Revision;
        self.policy = DestinationPolicy::AlwaysReplace;
        self
    }

    pub fn with_remove_downloaded(mut self, enabled: bool) -> Self {
        self.remove_downloaded = enabled;
        self
    }

    pub fn with_remove_skipped(mut self, enabled: bool) -> Self {
        self.remove_skipped = enabled;
        self
    }
}

/// Counters for a completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub downloaded: u64,
    pub skipped: u64,
    pub repaired: u64,
    pub removed_remote: u64,
    pub bytes: u64,
}

/// Step run on every freshly downloaded file
///
/// Errors abort the run like any other fatal error.
#[async_trait]
pub trait PostDownloadHook: Send + Sync {
    async fn after_download(&self, destination: &Path) -> Result<()>;
}

/// Sync coordinator for one remote folder
pub struct SyncCoordinator {
    config: SyncConfig,
    provider: Arc<dyn StorageProvider>,
    file_system: Arc<dyn FileSystemAccess>,
    resolver: DestinationResolver,
    event_bus: Arc<EventBus>,
    hook: Option<Arc<dyn PostDownloadHook>>,
}

impl SyncCoordinator {
    pub fn new(
        config: SyncConfig,
        provider: Arc<dyn StorageProvider>,
        file_system: Arc<dyn FileSystemAccess>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let resolver = DestinationResolver::new(Arc::clone(&file_system), config.policy);

        Self {
            config,
            provider,
            file_system,
            resolver,
            event_bus,
            hook: None,
        }
    }

    /// Run `hook` after every successful download
    pub fn with_post_download_hook(mut self, hook: Arc<dyn PostDownloadHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Download every new alarm clip
    ///
    /// # Errors
    ///
    /// Returns the first fatal error: a name that does not parse, a
    /// destination conflict or integrity violation, a short transfer, a
    /// provider or filesystem failure, or a failing hook.
    pub async fn run(&self) -> Result<SyncReport> {
        let run_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("sync_run", run_id = %run_id);

        self.run_with_id(run_id).instrument(span).await
    }

    async fn run_with_id(&self, run_id: String) -> Result<SyncReport> {
        let started = Instant::now();
        let outcome = match absolute_root(&self.config.destination_root) {
            Ok(root) => {
                self.emit(SyncEvent::Started {
                    run_id: run_id.clone(),
                    remote_folder: self.config.remote_folder.clone(),
                    destination_root: root.display().to_string(),
                    by_revision: self.config.key == SyncKey::Revision,
                });
                self.sync_folder(&root).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(report) => {
                info!(
                    downloaded = report.downloaded,
                    skipped = report.skipped,
                    repaired = report.repaired,
                    removed_remote = report.removed_remote,
                    bytes = report.bytes,
                    "Download run completed"
                );
                self.emit(SyncEvent::Completed {
                    run_id,
                    downloaded: report.downloaded,
                    skipped: report.skipped,
                    repaired: report.repaired,
                    removed_remote: report.removed_remote,
                    bytes: report.bytes,
                    duration_ms: started.elapsed().as_millis() as u64,
                });
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Download run failed");
                self.emit(SyncEvent::Failed {
                    run_id,
                    message: e.to_string(),
                    path: e.subject(),
                });
                Err(e)
            }
        }
    }

    async fn sync_folder(&self, root: &Path) -> Result<SyncReport> {
        let listing = self
            .provider
            .list_folder(&self.config.remote_folder, self.config.include_media_info)
            .await?;
        debug!(
            folder = %self.config.remote_folder,
            entries = listing.len(),
            "Listed remote folder"
        );

        let mut report = SyncReport::default();
        let mut candidates = filter::candidates(self.provider.as_ref(), listing, self.config.key);

        while let Some(entry) = candidates.try_next().await? {
            self.process_entry(root, &entry, &mut report).await?;
        }

        Ok(report)
    }

    async fn process_entry(
        &self,
        root: &Path,
        entry: &RemoteFile,
        report: &mut SyncReport,
    ) -> Result<()> {
        let timestamp = RecordingTimestamp::parse(&entry.name)?;
        let rev = match self.config.key {
            SyncKey::Event => None,
            SyncKey::Revision => entry.rev.as_deref(),
        };
        let destination = root.join(destination_file_name(&timestamp, rev));

        match self.resolver.resolve(&destination, entry.size).await? {
            DownloadDecision::Skip => {
                info!("Skipping already downloaded file {}", destination.display());
                report.skipped += 1;
                self.emit(SyncEvent::FileSkipped {
                    remote_path: entry.path.clone(),
                    destination: destination.display().to_string(),
                    size: entry.size,
                });

                if self.config.remove_downloaded && self.config.remove_skipped {
                    self.remove_remote(entry, report).await?;
                }
                return Ok(());
            }
            DownloadDecision::RepairAndFetch { local_size } => {
                report.repaired += 1;
                self.emit(SyncEvent::PartialRemoved {
                    destination: destination.display().to_string(),
                    local_size,
                    remote_size: entry.size,
                });
            }
            DownloadDecision::Fetch => {}
        }

        let bytes = self.transfer(entry, &destination).await?;
        report.downloaded += 1;
        report.bytes += bytes;
        self.emit(SyncEvent::Downloaded {
            remote_path: entry.path.clone(),
            destination: destination.display().to_string(),
            bytes,
        });

        if self.config.remove_downloaded {
            self.remove_remote(entry, report).await?;
        }

        if let Some(hook) = &self.hook {
            hook.after_download(&destination).await?;
        }

        Ok(())
    }

    /// Streams the remote content into `destination` and verifies its size.
    ///
    /// A short file is left in place for the next run to repair.
    async fn transfer(&self, entry: &RemoteFile, destination: &Path) -> Result<u64> {
        info!("Downloading file {} into {}", entry.name, destination.display());
        self.emit(SyncEvent::Downloading {
            remote_path: entry.path.clone(),
            rev: entry.rev.clone(),
            destination: destination.display().to_string(),
            size: entry.size,
        });

        if let Some(parent) = destination.parent() {
            self.file_system
                .create_dir_all(parent)
                .await
                .map_err(|e| SyncError::io(parent, e))?;
        }

        // Open the remote side first so a failed request leaves no empty file
        let mut reader = self.provider.download(entry).await?;
        let mut writer = self
            .file_system
            .open_write_stream(destination)
            .await
            .map_err(|e| SyncError::io(destination, e))?;

        let copied = tokio::io::copy(&mut reader, &mut writer).await;
        let closed = writer.shutdown().await;
        let bytes = copied.map_err(|e| SyncError::io(destination, e))?;
        closed.map_err(|e| SyncError::io(destination, e))?;

        if bytes != entry.size {
            return Err(SyncError::IncompleteTransfer {
                path: destination.to_path_buf(),
                expected: entry.size,
                actual: bytes,
            });
        }

        debug!(bytes, "Transfer complete");
        Ok(bytes)
    }

    async fn remove_remote(&self, entry: &RemoteFile, report: &mut SyncReport) -> Result<()> {
        info!("Removing file {} from Dropbox", entry.path);

        match self.provider.delete(&entry.path).await {
            Ok(()) => {
                report.removed_remote += 1;
                self.emit(SyncEvent::RemoteRemoved {
                    remote_path: entry.path.clone(),
                });
                Ok(())
            }
            // Earlier revisions of the same path already removed it
            Err(e) if e.is_not_found() && self.config.key == SyncKey::Revision => {
                debug!(path = %entry.path, "Remote file already removed");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn emit(&self, event: SyncEvent) {
        self.event_bus.emit(CoreEvent::Sync(event)).ok();
    }
}

fn absolute_root(root: &Path) -> Result<PathBuf> {
    let joined = if root.is_absolute() {
        root.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| SyncError::io(root, e))?
            .join(root)
    };

    Ok(joined
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect())
}
