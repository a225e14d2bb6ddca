//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the downloader crates:
//! - Configuration loading and validation
//! - Logging and tracing setup
//! - Event bus for observing a run
//!
//! ## Overview
//!
//! Nothing here is global except the tracing subscriber installed by
//! [`logging::init_logging`]. Configuration and the event bus are plain
//! values handed to the pipelines that need them.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
