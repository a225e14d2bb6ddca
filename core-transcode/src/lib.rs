//! # Video Transcoding
//!
//! Converts downloaded `.avi` clips into a sibling file of a more portable
//! container by running an external encoder (`ffmpeg` by default).
//!
//! A conversion is skipped when the output already exists and is at least as
//! new as its source, so re-running over the same clips does no work.

pub mod error;
pub mod transcoder;

pub use error::{Result, TranscodeError};
pub use transcoder::{TranscodeOutcome, Transcoder, DEFAULT_TARGET_EXTENSION};
