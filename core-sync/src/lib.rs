//! # Alarm Video Sync
//!
//! Downloads motion-triggered camera clips from a remote folder into a local
//! destination root.
//!
//! ## Components
//!
//! - **Timestamp codec** (`timestamp`): `MDalarm_YYYYMMDD_HHMMSS.avi` to `YYYY-MM-DD HH-MM-SS.avi`
//! - **Listing filter** (`filter`): selects `.avi` clips, optionally expanded into revisions
//! - **Destination resolver** (`resolver`): skip, repair or fetch decisions against the local filesystem
//! - **Sync coordinator** (`coordinator`): sequential download loop with optional remote removal and post-download hook

pub mod coordinator;
pub mod error;
pub mod filter;
pub mod resolver;
pub mod timestamp;

pub use coordinator::{PostDownloadHook, SyncConfig, SyncCoordinator, SyncReport};
pub use error::{Result, SyncError};
pub use filter::{alarm_videos, candidates, expand_revisions, is_alarm_video, SyncKey};
pub use resolver::{DestinationPolicy, DestinationResolver, DownloadDecision};
pub use timestamp::{destination_file_name, RecordingTimestamp};
