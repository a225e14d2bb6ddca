//! # Host Bridge Traits
//!
//! Capability traits that the core crates depend on and that concrete
//! adapters implement.
//!
//! ## Overview
//!
//! The download and transcode pipelines never talk to the network, the disk
//! or child processes directly. Each of those collaborators is expressed as a
//! trait here so the core logic can be exercised against in-memory fakes.
//!
//! ## Traits
//!
//! ### Remote storage
//! - [`StorageProvider`](storage::StorageProvider) - List, download and delete remote files
//!
//! ### Local host
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Metadata queries, directory creation, streaming writes
//! - [`ProcessRunner`](process::ProcessRunner) - Run an external program with captured output
//! - [`HttpClient`](http::HttpClient) - Async HTTP with retry and streaming bodies
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Mirror structured logs to a host sink
//!
//! ## Implementations
//!
//! | Capability | Implementation |
//! |------------|----------------|
//! | `StorageProvider` | `provider-dropbox` |
//! | `FileSystemAccess`, `HttpClient`, `ProcessRunner` | `bridge-desktop` |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type.
//! Implementations should convert their native errors to `BridgeError` and
//! include enough context (paths, status codes) to diagnose a failure.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! behind `Arc`.

pub mod error;
pub mod http;
pub mod logging;
pub mod process;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpStreamResponse, RetryPolicy};
pub use logging::{LogEntry, LogLevel, LoggerSink};
pub use process::{ProcessOutput, ProcessRunner};
pub use storage::{FileKind, FileMetadata, FileSystemAccess, RemoteFile, StorageProvider};
