//! Storage and File System Abstractions
//!
//! Provides platform-agnostic traits for remote cloud storage and local file I/O.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// A file entry returned by a remote listing.
///
/// This is an immutable snapshot taken from a single listing call. `rev` is
/// only populated when the entry comes from a revision history listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Remote path used to address the file (lower-cased on Dropbox)
    pub path: String,
    /// Display name of the file
    pub name: String,
    /// Size in bytes as advertised by the provider
    pub size: u64,
    /// Revision identifier (revision listings only)
    pub rev: Option<String>,
    /// Server-side modification time, if the provider reports one
    pub modified_at: Option<DateTime<Utc>>,
}

impl RemoteFile {
    pub fn new(path: impl Into<String>, name: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            size,
            rev: None,
            modified_at: None,
        }
    }

    pub fn with_rev(mut self, rev: impl Into<String>) -> Self {
        self.rev = Some(rev.into());
        self
    }

    pub fn with_modified_at(mut self, modified_at: DateTime<Utc>) -> Self {
        self.modified_at = Some(modified_at);
        self
    }
}

/// Remote cloud storage capability
///
/// The sync core depends only on this trait, which makes it possible to run
/// the whole download pipeline against an in-memory fake.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::StorageProvider;
///
/// async fn count_videos(provider: &dyn StorageProvider) -> Result<usize> {
///     let entries = provider.list_folder("/apps/ipcamera", true).await?;
///     Ok(entries.iter().filter(|e| e.name.ends_with(".avi")).count())
/// }
/// ```
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// List every file directly under `path`
    ///
    /// Implementations follow pagination until the listing is exhausted and
    /// return entries in the order reported by the provider. Folders are not
    /// included.
    async fn list_folder(&self, path: &str, include_media_info: bool) -> Result<Vec<RemoteFile>>;

    /// List the revision history of the file at `path`
    ///
    /// Every returned entry carries `rev`.
    async fn list_revisions(&self, path: &str) -> Result<Vec<RemoteFile>>;

    /// Open the content of `file` as a byte stream
    ///
    /// When `file.rev` is set the specific revision is downloaded.
    async fn download(&self, file: &RemoteFile) -> Result<Box<dyn AsyncRead + Send + Unpin>>;

    /// Delete the file at `path`
    ///
    /// Returns [`BridgeError::NotFound`](crate::error::BridgeError::NotFound)
    /// when nothing exists at `path`.
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Kind of a local filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Regular file (symlinks to regular files count as files)
    File,
    /// Directory
    Directory,
    /// Anything else: dangling symlink, device, socket, fifo
    Other,
}

/// File metadata information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
    pub kind: FileKind,
}

impl FileMetadata {
    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == FileKind::Directory
    }
}

/// File system access trait
///
/// Abstracts the local file operations needed by the download and transcode
/// pipelines.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn size_of(fs: &dyn FileSystemAccess, path: &Path) -> Result<Option<u64>> {
///     Ok(fs.metadata(path).await?.map(|m| m.size))
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Get metadata for whatever exists at `path`
    ///
    /// Returns `Ok(None)` when nothing exists at the path. A dangling symlink
    /// is reported as [`FileKind::Other`] rather than as missing.
    async fn metadata(&self, path: &Path) -> Result<Option<FileMetadata>>;

    /// Check if anything exists at `path`
    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.metadata(path).await?.is_some())
    }

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Create (or truncate) a file and open it for streaming writes
    async fn open_write_stream(&self, path: &Path) -> Result<Box<dyn AsyncWrite + Send + Unpin>>;
}
