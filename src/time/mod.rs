//! Capture date resolution
//!
//! A file's date is taken from, in order:
//! 1. The first configured metadata field that is present
//! 2. The file name, through the default or user supplied pattern
//! 3. The file modification time, when enabled
//!
//! When none of them yields a date the file is "unknown" and lands in the
//! default bucket.

pub mod exif;
pub mod filename;

use crate::config::RunConfig;
use crate::metadata::MetadataRecord;
use chrono::{DateTime, FixedOffset, Local, NaiveDateTime};
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Metadata fields checked when no custom list is configured
pub const DEFAULT_DATE_FIELDS: &[&str] = &[
    "SubSecCreateDate",
    "SubSecDateTimeOriginal",
    "CreateDate",
    "DateTimeOriginal",
];

/// Source of the resolved date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    /// Read from a metadata field
    Metadata,
    /// Parsed from the file name
    Filename,
    /// File system modification time
    ModificationTime,
    /// No date could be found
    None,
}

/// A capture timestamp as it was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTime {
    /// Wall-clock date and time, with sub-second precision
    pub datetime: NaiveDateTime,
    /// UTC offset, when the source carried one
    pub offset: Option<FixedOffset>,
    /// Sub-second digits exactly as written in the source
    pub subseconds: Option<String>,
}

impl CaptureTime {
    /// Plain timestamp without offset or sub-second text
    pub fn from_naive(datetime: NaiveDateTime) -> Self {
        Self {
            datetime,
            offset: None,
            subseconds: None,
        }
    }

    /// The timestamp with its offset attached, when one is known
    pub fn with_offset(&self) -> Option<DateTime<FixedOffset>> {
        self.offset
            .and_then(|offset| self.datetime.and_local_timezone(offset).single())
    }
}

/// Result of date resolution for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDate {
    /// The capture time; `None` means unknown
    pub timestamp: Option<CaptureTime>,
    /// Where the timestamp came from
    pub source: DateSource,
}

impl ResolvedDate {
    pub fn unknown() -> Self {
        Self {
            timestamp: None,
            source: DateSource::None,
        }
    }

    fn found(timestamp: CaptureTime, source: DateSource) -> Self {
        Self {
            timestamp: Some(timestamp),
            source,
        }
    }

    pub fn is_known(&self) -> bool {
        self.timestamp.is_some()
    }
}

/// Resolves capture dates following the metadata, file name, modification
/// time chain
#[derive(Debug, Clone)]
pub struct DateResolver<'a> {
    fields: Vec<&'a str>,
    pattern: &'a Regex,
    fallback_to_modtime: bool,
}

impl<'a> DateResolver<'a> {
    pub fn new(
        user_regex: Option<&'a Regex>,
        custom_fields: Option<&'a [String]>,
        fallback_to_modtime: bool,
    ) -> Self {
        let fields = match custom_fields {
            Some(fields) => fields.iter().map(String::as_str).collect(),
            None => DEFAULT_DATE_FIELDS.to_vec(),
        };

        Self {
            fields,
            pattern: user_regex.unwrap_or(filename::default_pattern()),
            fallback_to_modtime,
        }
    }

    pub fn from_config(config: &'a RunConfig) -> Self {
        Self::new(
            config.date_regex.as_ref(),
            config.date_fields.as_deref(),
            config.timestamp_fallback,
        )
    }

    /// Resolve the capture date of a file.
    ///
    /// `path` provides the file name and modification time; without it only
    /// metadata is consulted.
    pub fn resolve(&self, metadata: &MetadataRecord, path: Option<&Path>) -> ResolvedDate {
        if let Some(timestamp) = self.from_metadata(metadata) {
            debug!(?path, datetime = %timestamp.datetime, "Resolved date from metadata");
            return ResolvedDate::found(timestamp, DateSource::Metadata);
        }

        let Some(path) = path else {
            return ResolvedDate::unknown();
        };

        if let Some(name) = path.file_name().and_then(|n| n.to_str())
            && let Some(timestamp) = filename::parse_filename_time(name, self.pattern)
        {
            debug!(?path, datetime = %timestamp.datetime, "Resolved date from file name");
            return ResolvedDate::found(timestamp, DateSource::Filename);
        }

        if self.fallback_to_modtime {
            match modification_time(path) {
                Some(datetime) => {
                    debug!(?path, %datetime, "Resolved date from modification time");
                    return ResolvedDate::found(
                        CaptureTime::from_naive(datetime),
                        DateSource::ModificationTime,
                    );
                }
                None => debug!(?path, "Modification time unavailable"),
            }
        }

        debug!(?path, "No date found");
        ResolvedDate::unknown()
    }

    /// The first present field decides; zero dates and non-strings count as absent
    fn from_metadata(&self, metadata: &MetadataRecord) -> Option<CaptureTime> {
        let (field, value) = self
            .fields
            .iter()
            .find_map(|field| metadata.get(*field).map(|value| (*field, value)))?;

        let raw = value.as_str()?;
        if raw.starts_with("0000") {
            debug!(field, raw, "Ignoring zero date");
            return None;
        }

        let parsed = exif::parse_exif_datetime(raw);
        if parsed.is_none() {
            debug!(field, raw, "Unparseable metadata date");
        }
        parsed
    }
}

fn modification_time(path: &Path) -> Option<NaiveDateTime> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let local: DateTime<Local> = modified.into();
    Some(local.naive_local())
}
