//! # Desktop Bridge Implementations
//!
//! Default implementations of the host bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `FileSystemAccess` using `tokio::fs`
//! - `ProcessRunner` using `tokio::process`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, TokioFileSystem, TokioProcessRunner};
//! use std::sync::Arc;
//!
//! let http_client = Arc::new(ReqwestHttpClient::new()?);
//! let fs = Arc::new(TokioFileSystem::new());
//! let runner = Arc::new(TokioProcessRunner::new());
//! ```

mod filesystem;
mod http;
mod process;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use process::TokioProcessRunner;
