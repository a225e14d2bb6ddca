//! Integration tests for the download run
//!
//! These tests drive `SyncCoordinator` against an in-memory provider and a
//! real temporary destination root:
//! - First download, naming and remote removal
//! - Idempotent re-runs
//! - Partial download repair and short transfers
//! - Fatal integrity and conflict checks
//! - Revision mode
//! - Post-download hook and emitted events

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    storage::{RemoteFile, StorageProvider},
};
use core_runtime::events::{CoreEvent, EventBus, EventStream, SyncEvent};
use core_sync::{PostDownloadHook, SyncConfig, SyncCoordinator, SyncError, SyncReport};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::AsyncRead;
use tokio::sync::Mutex as AsyncMutex;

const FOLDER: &str = "/apps/ipcamera";
const CLIP: &str = "MDalarm_20230615_143022.avi";
const CLIP_LOCAL: &str = "2023-06-15 14-30-22.avi";

// ============================================================================
// Fake Implementations
// ============================================================================

#[derive(Default)]
struct Calls {
    downloads: Vec<(String, Option<String>)>,
    deletes: Vec<String>,
}

/// In-memory provider that records every download and delete
#[derive(Default)]
struct FakeProvider {
    listing: Vec<RemoteFile>,
    revisions: HashMap<String, Vec<RemoteFile>>,
    /// Served bytes keyed by revision, or by path for latest content
    contents: HashMap<String, Vec<u8>>,
    removed: AsyncMutex<HashSet<String>>,
    calls: AsyncMutex<Calls>,
}

impl FakeProvider {
    fn with_clip(mut self, name: &str, size: usize) -> Self {
        let path = remote_path(name);
        self.listing.push(RemoteFile::new(&path, name, size as u64));
        self.contents.insert(path, payload(size));
        self
    }

    fn with_entry(mut self, name: &str, size: u64) -> Self {
        self.listing.push(RemoteFile::new(remote_path(name), name, size));
        self
    }

    fn with_revision(mut self, name: &str, rev: &str, size: usize) -> Self {
        let path = remote_path(name);
        self.revisions
            .entry(path.clone())
            .or_default()
            .push(RemoteFile::new(&path, name, size as u64).with_rev(rev));
        self.contents.insert(rev.to_string(), payload(size));
        self
    }

    fn serving(mut self, key: &str, bytes: Vec<u8>) -> Self {
        self.contents.insert(key.to_string(), bytes);
        self
    }

    async fn downloads(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().await.downloads.clone()
    }

    async fn deletes(&self) -> Vec<String> {
        self.calls.lock().await.deletes.clone()
    }
}

#[async_trait]
impl StorageProvider for FakeProvider {
    async fn list_folder(&self, path: &str, include_media_info: bool) -> BridgeResult<Vec<RemoteFile>> {
        assert_eq!(path, FOLDER);
        assert!(include_media_info);
        Ok(self.listing.clone())
    }

    async fn list_revisions(&self, path: &str) -> BridgeResult<Vec<RemoteFile>> {
        Ok(self.revisions.get(path).cloned().unwrap_or_default())
    }

    async fn download(&self, file: &RemoteFile) -> BridgeResult<Box<dyn AsyncRead + Send + Unpin>> {
        self.calls
            .lock()
            .await
            .downloads
            .push((file.path.clone(), file.rev.clone()));

        let key = file.rev.as_deref().unwrap_or(&file.path);
        let bytes = self
            .contents
            .get(key)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(key.to_string()))?;
        Ok(Box::new(std::io::Cursor::new(bytes)))
    }

    async fn delete(&self, path: &str) -> BridgeResult<()> {
        self.calls.lock().await.deletes.push(path.to_string());
        if self.removed.lock().await.insert(path.to_string()) {
            Ok(())
        } else {
            Err(BridgeError::NotFound(path.to_string()))
        }
    }
}

/// Hook that records the destinations it was called with
#[derive(Default)]
struct RecordingHook {
    seen: AsyncMutex<Vec<PathBuf>>,
    fail: bool,
}

#[async_trait]
impl PostDownloadHook for RecordingHook {
    async fn after_download(&self, destination: &Path) -> core_sync::Result<()> {
        self.seen.lock().await.push(destination.to_path_buf());
        if self.fail {
            return Err(SyncError::Hook("encoder exited with status 1".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn remote_path(name: &str) -> String {
    format!("{}/{}", FOLDER, name.to_lowercase())
}

fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

struct Harness {
    root: TempDir,
    provider: Arc<FakeProvider>,
    event_bus: Arc<EventBus>,
}

impl Harness {
    fn new(provider: FakeProvider) -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
            provider: Arc::new(provider),
            event_bus: Arc::new(EventBus::new(256)),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    fn config(&self) -> SyncConfig {
        SyncConfig::new(self.root.path())
    }

    fn coordinator(&self, config: SyncConfig) -> SyncCoordinator {
        SyncCoordinator::new(
            config,
            self.provider.clone(),
            Arc::new(TokioFileSystem::new()),
            self.event_bus.clone(),
        )
    }

    async fn run(&self, config: SyncConfig) -> core_sync::Result<SyncReport> {
        self.coordinator(config).run().await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_downloads_new_clip_without_removal() {
    let harness = Harness::new(FakeProvider::default().with_clip(CLIP, 1000));

    let report = harness.run(harness.config()).await.unwrap();

    assert_eq!(report.downloaded, 1);
    assert_eq!(report.bytes, 1000);
    assert_eq!(report.removed_remote, 0);
    assert_eq!(std::fs::read(harness.path(CLIP_LOCAL)).unwrap(), payload(1000));
    assert_eq!(
        harness.provider.downloads().await,
        vec![(remote_path(CLIP), None)]
    );
    assert!(harness.provider.deletes().await.is_empty());
}

#[tokio::test]
async fn test_downloads_new_clip_and_removes_remote() {
    let harness = Harness::new(FakeProvider::default().with_clip(CLIP, 1000));

    let report = harness
        .run(harness.config().with_remove_downloaded(true))
        .await
        .unwrap();

    assert_eq!(report.downloaded, 1);
    assert_eq!(report.removed_remote, 1);
    assert!(harness.path(CLIP_LOCAL).is_file());
    assert_eq!(harness.provider.deletes().await, vec![remote_path(CLIP)]);
}

#[tokio::test]
async fn test_second_run_downloads_nothing() {
    let harness = Harness::new(
        FakeProvider::default()
            .with_clip(CLIP, 1000)
            .with_clip("MDalarm_20230616_080000.avi", 2048),
    );

    let first = harness.run(harness.config()).await.unwrap();
    let second = harness.run(harness.config()).await.unwrap();

    assert_eq!(first.downloaded, 2);
    assert_eq!(second.downloaded, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(harness.provider.downloads().await.len(), 2);
}

#[tokio::test]
async fn test_complete_local_file_is_left_alone() {
    let harness = Harness::new(FakeProvider::default().with_clip(CLIP, 1000));
    std::fs::write(harness.path(CLIP_LOCAL), vec![7u8; 1000]).unwrap();

    let report = harness
        .run(harness.config().with_remove_downloaded(true))
        .await
        .unwrap();

    assert_eq!(
        report,
        SyncReport {
            skipped: 1,
            ..SyncReport::default()
        }
    );
    assert!(harness.provider.downloads().await.is_empty());
    assert!(harness.provider.deletes().await.is_empty());
    assert_eq!(std::fs::read(harness.path(CLIP_LOCAL)).unwrap(), vec![7u8; 1000]);
}

#[tokio::test]
async fn test_remove_skipped_cleans_up_previous_downloads() {
    let harness = Harness::new(FakeProvider::default().with_clip(CLIP, 1000));
    std::fs::write(harness.path(CLIP_LOCAL), vec![7u8; 1000]).unwrap();

    // Without remove_downloaded the flag does nothing
    harness
        .run(harness.config().with_remove_skipped(true))
        .await
        .unwrap();
    assert!(harness.provider.deletes().await.is_empty());

    let report = harness
        .run(
            harness
                .config()
                .with_remove_downloaded(true)
                .with_remove_skipped(true),
        )
        .await
        .unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.removed_remote, 1);
    assert!(harness.provider.downloads().await.is_empty());
    assert_eq!(harness.provider.deletes().await, vec![remote_path(CLIP)]);
}

#[tokio::test]
async fn test_partial_file_is_repaired() {
    let harness = Harness::new(FakeProvider::default().with_clip(CLIP, 1000));
    std::fs::write(harness.path(CLIP_LOCAL), vec![0u8; 400]).unwrap();

    let report = harness.run(harness.config()).await.unwrap();

    assert_eq!(report.repaired, 1);
    assert_eq!(report.downloaded, 1);
    assert_eq!(std::fs::read(harness.path(CLIP_LOCAL)).unwrap(), payload(1000));
}

#[tokio::test]
async fn test_oversize_file_aborts_run_untouched() {
    let harness = Harness::new(
        FakeProvider::default()
            .with_clip(CLIP, 1000)
            .with_clip("MDalarm_20230616_080000.avi", 10),
    );
    std::fs::write(harness.path(CLIP_LOCAL), vec![9u8; 1500]).unwrap();

    let err = harness
        .run(harness.config().with_remove_downloaded(true))
        .await
        .unwrap_err();

    match err {
        SyncError::Integrity {
            path,
            local_size,
            remote_size,
        } => {
            assert_eq!(path, harness.path(CLIP_LOCAL));
            assert_eq!(local_size, 1500);
            assert_eq!(remote_size, 1000);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(std::fs::read(harness.path(CLIP_LOCAL)).unwrap(), vec![9u8; 1500]);
    // Later entries are never reached
    assert!(harness.provider.downloads().await.is_empty());
    assert!(!harness.path("2023-06-16 08-00-00.avi").exists());
}

#[tokio::test]
async fn test_directory_at_destination_is_conflict() {
    let harness = Harness::new(FakeProvider::default().with_clip(CLIP, 1000));
    std::fs::create_dir(harness.path(CLIP_LOCAL)).unwrap();

    let err = harness.run(harness.config()).await.unwrap_err();

    assert!(matches!(err, SyncError::Conflict { .. }), "{:?}", err);
    assert!(harness.path(CLIP_LOCAL).is_dir());
    assert!(harness.provider.downloads().await.is_empty());
}

#[tokio::test]
async fn test_short_transfer_is_repaired_next_run() {
    let short = Harness::new(
        FakeProvider::default()
            .with_clip(CLIP, 1000)
            .serving(&remote_path(CLIP), payload(600)),
    );

    let err = short
        .run(short.config().with_remove_downloaded(true))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::IncompleteTransfer {
            expected: 1000,
            actual: 600,
            ..
        }
    ));
    assert_eq!(std::fs::metadata(short.path(CLIP_LOCAL)).unwrap().len(), 600);
    assert!(short.provider.deletes().await.is_empty());

    // Same destination root, healthy provider
    let healthy = SyncCoordinator::new(
        short.config(),
        Arc::new(FakeProvider::default().with_clip(CLIP, 1000)),
        Arc::new(TokioFileSystem::new()),
        short.event_bus.clone(),
    );
    let report = healthy.run().await.unwrap();
    assert_eq!(report.repaired, 1);
    assert_eq!(std::fs::metadata(short.path(CLIP_LOCAL)).unwrap().len(), 1000);
}

#[tokio::test]
async fn test_unparseable_video_name_is_fatal() {
    let harness = Harness::new(
        FakeProvider::default()
            .with_entry("holiday.jpg", 50)
            .with_entry("MDalarm_2023-06-15.avi", 50),
    );

    let err = harness.run(harness.config()).await.unwrap_err();

    match err {
        SyncError::FormatMismatch { name } => assert_eq!(name, "MDalarm_2023-06-15.avi"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_destination_root_is_created() {
    let harness = Harness::new(FakeProvider::default().with_clip(CLIP, 10));
    let nested = harness.path("camera/front");

    harness.run(SyncConfig::new(&nested)).await.unwrap();

    assert!(nested.join(CLIP_LOCAL).is_file());
}

#[tokio::test]
async fn test_revision_mode_downloads_each_revision() {
    let harness = Harness::new(
        FakeProvider::default()
            .with_entry(CLIP, 1000)
            .with_revision(CLIP, "015f0000000a", 1000)
            .with_revision(CLIP, "015f00000009", 700),
    );
    // A stale copy of one revision is replaced even though it is larger
    std::fs::write(harness.path("2023-06-15 14-30-22 015f00000009.avi"), vec![1u8; 900]).unwrap();

    let report = harness
        .run(harness.config().by_revision().with_remove_downloaded(true))
        .await
        .unwrap();

    assert_eq!(report.downloaded, 2);
    assert_eq!(report.repaired, 1);
    assert_eq!(report.removed_remote, 1);
    assert_eq!(
        std::fs::read(harness.path("2023-06-15 14-30-22 015f0000000a.avi")).unwrap(),
        payload(1000)
    );
    assert_eq!(
        std::fs::read(harness.path("2023-06-15 14-30-22 015f00000009.avi")).unwrap(),
        payload(700)
    );
    assert_eq!(
        harness.provider.downloads().await,
        vec![
            (remote_path(CLIP), Some("015f0000000a".to_string())),
            (remote_path(CLIP), Some("015f00000009".to_string())),
        ]
    );
    // Second delete of the same path reports NotFound and is tolerated
    assert_eq!(harness.provider.deletes().await.len(), 2);
}

#[tokio::test]
async fn test_hook_runs_for_downloaded_files_only() {
    let harness = Harness::new(
        FakeProvider::default()
            .with_clip(CLIP, 100)
            .with_clip("MDalarm_20230616_080000.avi", 100),
    );
    std::fs::write(harness.path(CLIP_LOCAL), payload(100)).unwrap();
    let hook = Arc::new(RecordingHook::default());

    harness
        .coordinator(harness.config())
        .with_post_download_hook(hook.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(
        *hook.seen.lock().await,
        vec![harness.path("2023-06-16 08-00-00.avi")]
    );
}

#[tokio::test]
async fn test_failing_hook_aborts_run() {
    let harness = Harness::new(
        FakeProvider::default()
            .with_clip(CLIP, 100)
            .with_clip("MDalarm_20230616_080000.avi", 100),
    );
    let hook = Arc::new(RecordingHook {
        fail: true,
        ..RecordingHook::default()
    });

    let err = harness
        .coordinator(harness.config().with_remove_downloaded(true))
        .with_post_download_hook(hook.clone())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Hook(_)));
    assert_eq!(hook.seen.lock().await.len(), 1);
    // Removal happens before the hook
    assert_eq!(harness.provider.deletes().await, vec![remote_path(CLIP)]);
    assert_eq!(harness.provider.downloads().await.len(), 1);
}

#[tokio::test]
async fn test_run_emits_events_in_order() {
    let harness = Harness::new(FakeProvider::default().with_clip(CLIP, 1000));
    let mut events = EventStream::new(harness.event_bus.subscribe());

    harness
        .run(harness.config().with_remove_downloaded(true))
        .await
        .unwrap();

    let kinds: Vec<&'static str> = events
        .drain()
        .into_iter()
        .map(|event| match event {
            CoreEvent::Sync(SyncEvent::Started { .. }) => "started",
            CoreEvent::Sync(SyncEvent::Downloading { .. }) => "downloading",
            CoreEvent::Sync(SyncEvent::Downloaded { bytes: 1000, .. }) => "downloaded",
            CoreEvent::Sync(SyncEvent::RemoteRemoved { .. }) => "removed",
            CoreEvent::Sync(SyncEvent::Completed { downloaded: 1, .. }) => "completed",
            other => panic!("unexpected event: {:?}", other),
        })
        .collect();

    assert_eq!(
        kinds,
        vec!["started", "downloading", "downloaded", "removed", "completed"]
    );
}

#[tokio::test]
async fn test_failed_run_emits_failure_with_path() {
    let harness = Harness::new(FakeProvider::default().with_clip(CLIP, 1000));
    std::fs::create_dir(harness.path(CLIP_LOCAL)).unwrap();
    let mut events = EventStream::new(harness.event_bus.subscribe())
        .filter(|event| matches!(event, CoreEvent::Sync(SyncEvent::Failed { .. })));

    harness.run(harness.config()).await.unwrap_err();

    match events.drain().as_slice() {
        [CoreEvent::Sync(SyncEvent::Failed { path, .. })] => {
            assert_eq!(
                path.as_deref(),
                Some(harness.path(CLIP_LOCAL).display().to_string().as_str())
            );
        }
        other => panic!("unexpected events: {:?}", other),
    }
}
