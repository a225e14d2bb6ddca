//! # Dropbox Provider
//!
//! Implements the `StorageProvider` trait for the Dropbox HTTP API v2.
//!
//! ## Overview
//!
//! This crate provides:
//! - Folder listing with `list_folder/continue` pagination
//! - Revision history listing
//! - Streaming downloads of the current content or a specific revision
//! - Remote deletion
//!
//! Transport retry for 429 and 5xx responses is delegated to the
//! `HttpClient` bridge.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{DropboxConnector, DROPBOX_API_BASE, DROPBOX_CONTENT_BASE};
pub use error::{DropboxError, Result};
