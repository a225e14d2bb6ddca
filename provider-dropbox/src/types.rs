//! Dropbox API v2 request and response types
//!
//! Only the fields the downloader reads are modelled; unknown fields are
//! ignored by serde.

use serde::{Deserialize, Serialize};

/// Argument of `files/list_folder`
///
/// See: https://www.dropbox.com/developers/documentation/http/documentation#files-list_folder
#[derive(Debug, Clone, Serialize)]
pub struct ListFolderArg {
    pub path: String,
    pub recursive: bool,
    pub include_media_info: bool,
    pub include_deleted: bool,
}

/// Argument of `files/list_folder/continue`
#[derive(Debug, Clone, Serialize)]
pub struct ListFolderContinueArg {
    pub cursor: String,
}

/// Result of `files/list_folder` and `files/list_folder/continue`
#[derive(Debug, Deserialize)]
pub struct ListFolderResult {
    pub entries: Vec<Metadata>,
    pub cursor: String,
    pub has_more: bool,
}

/// Metadata union, discriminated by the `.tag` field
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
pub enum Metadata {
    File(FileMetadata),
    Folder(FolderMetadata),
    Deleted(DeletedMetadata),
}

/// File metadata
#[derive(Debug, Clone, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub path_lower: Option<String>,
    #[serde(default)]
    pub path_display: Option<String>,
    pub size: u64,
    pub rev: String,
    /// RFC 3339, always UTC
    #[serde(default)]
    pub server_modified: Option<String>,
    #[serde(default)]
    pub client_modified: Option<String>,
}

/// Folder metadata
#[derive(Debug, Clone, Deserialize)]
pub struct FolderMetadata {
    pub name: String,
    #[serde(default)]
    pub path_lower: Option<String>,
}

/// Deleted entry metadata
#[derive(Debug, Clone, Deserialize)]
pub struct DeletedMetadata {
    pub name: String,
    #[serde(default)]
    pub path_lower: Option<String>,
}

/// Argument of `files/list_revisions`
#[derive(Debug, Clone, Serialize)]
pub struct ListRevisionsArg {
    pub path: String,
    pub mode: &'static str,
    pub limit: u32,
}

/// Result of `files/list_revisions`
#[derive(Debug, Deserialize)]
pub struct ListRevisionsResult {
    pub is_deleted: bool,
    pub entries: Vec<FileMetadata>,
}

/// Argument of `files/download` and `files/delete_v2`
#[derive(Debug, Clone, Serialize)]
pub struct PathArg {
    pub path: String,
}

/// Error body returned with status 409
///
/// `error_summary` is a slash separated tag path such as
/// `path_lookup/not_found/..`.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error_summary: String,
}

impl ApiErrorResponse {
    pub fn is_not_found(&self) -> bool {
        self.error_summary
            .split('/')
            .any(|tag| tag == "not_found")
    }
}
