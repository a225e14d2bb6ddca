//! Remote listing filter
//!
//! Selects alarm clips out of a raw folder listing and, when downloading by
//! revision, expands every clip into its revision history.

use crate::error::{Result, SyncError};
use bridge_traits::error::BridgeError;
use bridge_traits::storage::{RemoteFile, StorageProvider};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

const ALARM_VIDEO_SUFFIX: &str = ".avi";

/// What identifies one local file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncKey {
    /// One file per alarm event, holding the latest remote content
    #[default]
    Event,
    /// One file per remote revision of each alarm clip
    Revision,
}

/// Case-sensitive `.avi` suffix check
pub fn is_alarm_video(name: &str) -> bool {
    name.ends_with(ALARM_VIDEO_SUFFIX)
}

/// Alarm clips of a listing, in listing order.
///
/// Each call starts a fresh pass over `entries`.
pub fn alarm_videos(entries: &[RemoteFile]) -> impl Iterator<Item = &RemoteFile> + '_ {
    entries.iter().filter(|entry| is_alarm_video(&entry.name))
}

/// Lazily replaces every clip with its revision records.
///
/// Revision histories are fetched one clip at a time, only once the
/// previous clip's revisions have been consumed.
pub fn expand_revisions<'a>(
    provider: &'a dyn StorageProvider,
    videos: Vec<RemoteFile>,
) -> BoxStream<'a, Result<RemoteFile>> {
    stream::iter(videos)
        .then(move |video| async move { provider.list_revisions(&video.path).await })
        .map_ok(|revisions| stream::iter(revisions.into_iter().map(Ok::<_, BridgeError>)))
        .try_flatten()
        .map_err(SyncError::from)
        .boxed()
}

/// Download candidates for a listing under the given key
pub fn candidates<'a>(
    provider: &'a dyn StorageProvider,
    listing: Vec<RemoteFile>,
    key: SyncKey,
) -> BoxStream<'a, Result<RemoteFile>> {
    let videos: Vec<RemoteFile> = alarm_videos(&listing).cloned().collect();

    match key {
        SyncKey::Event => stream::iter(videos.into_iter().map(Ok)).boxed(),
        SyncKey::Revision => expand_revisions(provider, videos),
    }
}
