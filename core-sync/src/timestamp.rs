//! Filename timestamp codec
//!
//! Alarm clips are uploaded as `MDalarm_YYYYMMDD_HHMMSS.avi`. The embedded
//! wall-clock time becomes the local file name, rendered as
//! `YYYY-MM-DD HH-MM-SS.avi`.
//!
//! Timestamps are naive: they are taken in whatever zone the camera is set
//! to and written back verbatim. No conversion is ever applied.

use crate::error::{Result, SyncError};
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

const NAME_PREFIX: &str = "MDalarm_";
const VIDEO_SUFFIX: &str = ".avi";
const DESTINATION_FORMAT: &str = "%Y-%m-%d %H-%M-%S";

/// Second-precision recording time parsed from an alarm clip name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordingTimestamp(NaiveDateTime);

impl RecordingTimestamp {
    /// Parses `MDalarm_YYYYMMDD_HHMMSS.avi`.
    ///
    /// The match is exact: fixed-width digit fields, the literal prefix and
    /// the `.avi` suffix are all required and the date must exist on the
    /// calendar.
    pub fn parse(name: &str) -> Result<Self> {
        let mismatch = || SyncError::FormatMismatch {
            name: name.to_string(),
        };

        let stem = name
            .strip_prefix(NAME_PREFIX)
            .and_then(|rest| rest.strip_suffix(VIDEO_SUFFIX))
            .ok_or_else(mismatch)?;

        let (date, time) = stem.split_once('_').ok_or_else(mismatch)?;
        if date.len() != 8 || time.len() != 6 {
            return Err(mismatch());
        }
        if !date.bytes().chain(time.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(mismatch());
        }

        let field = |digits: &str| digits.parse::<u32>().map_err(|_| mismatch());

        let year = date[0..4].parse::<i32>().map_err(|_| mismatch())?;
        if year == 0 {
            return Err(mismatch());
        }
        let timestamp = NaiveDate::from_ymd_opt(year, field(&date[4..6])?, field(&date[6..8])?)
            .and_then(|day| {
                day.and_hms_opt(
                    field(&time[0..2]).ok()?,
                    field(&time[2..4]).ok()?,
                    field(&time[4..6]).ok()?,
                )
            })
            .ok_or_else(mismatch)?;

        Ok(Self(timestamp))
    }

    /// Renders the timestamp as `YYYY-MM-DD HH-MM-SS`
    pub fn format(&self) -> String {
        self.0.format(DESTINATION_FORMAT).to_string()
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }
}

impl From<NaiveDateTime> for RecordingTimestamp {
    fn from(value: NaiveDateTime) -> Self {
        Self(value)
    }
}

impl fmt::Display for RecordingTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// Local file name for a clip, with the revision appended when downloading
/// by revision.
pub fn destination_file_name(timestamp: &RecordingTimestamp, rev: Option<&str>) -> String {
    match rev {
        Some(rev) => format!("{} {}{}", timestamp.format(), rev, VIDEO_SUFFIX),
        None => format!("{}{}", timestamp.format(), VIDEO_SUFFIX),
    }
}
