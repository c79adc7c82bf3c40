//! Metadata extraction via exiftool
//!
//! The provider is the boundary to the external tool: failures never travel
//! past it, they turn into an empty record.

use crate::error::{Error, Result};
use regex::Regex;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use tracing::{debug, trace, warn};

/// Metadata field name to value, as reported for a single file
pub type MetadataRecord = Map<String, Value>;

/// Field carrying the MIME type of the file
pub const MIME_TYPE_FIELD: &str = "MIMEType";

static MEDIA_MIME: OnceLock<Regex> = OnceLock::new();

fn media_mime_pattern() -> &'static Regex {
    MEDIA_MIME.get_or_init(|| {
        Regex::new(r"^(image/.+|video/.+|application/vnd\.adobe\.photoshop)$").unwrap()
    })
}

/// Whether the MIME type names a photo or video
pub fn is_image_or_video(mime_type: &str) -> bool {
    media_mime_pattern().is_match(mime_type)
}

/// Whether a record describes something other than a photo or video.
/// Records without a MIME type are given the benefit of the doubt.
pub fn is_non_media(record: &MetadataRecord) -> bool {
    match record.get(MIME_TYPE_FIELD).and_then(Value::as_str) {
        Some(mime_type) => !is_image_or_video(mime_type),
        None => false,
    }
}

/// Source of per-file metadata
pub trait MetadataProvider {
    /// Read the metadata of `path`; an empty record means nothing usable
    fn read(&self, path: &Path) -> MetadataRecord;
}

impl<F> MetadataProvider for F
where
    F: Fn(&Path) -> MetadataRecord,
{
    fn read(&self, path: &Path) -> MetadataRecord {
        self(path)
    }
}

/// Metadata provider backed by the `exiftool` executable
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: PathBuf,
}

impl ExifTool {
    /// Check that the executable runs and return a provider for it
    pub fn locate(program: impl Into<PathBuf>) -> Result<Self> {
        let program = program.into();
        let available = Command::new(&program)
            .arg("-ver")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false);

        if !available {
            return Err(Error::ExifToolNotFound { program });
        }

        debug!(program = %program.display(), "Found exiftool");
        Ok(Self { program })
    }

    fn run(&self, path: &Path) -> Result<MetadataRecord> {
        let output = Command::new(&self.program)
            .args(["-time:all", "-mimetype", "-json"])
            .arg(path)
            .output()?;

        if !output.status.success() {
            return Err(Error::Metadata(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        trace!(?path, "exiftool output: {}", String::from_utf8_lossy(&output.stdout));
        parse_exiftool_output(&output.stdout)
    }
}

impl MetadataProvider for ExifTool {
    fn read(&self, path: &Path) -> MetadataRecord {
        match self.run(path) {
            Ok(record) => {
                debug!(?path, fields = record.len(), "Got metadata");
                record
            }
            Err(e) => {
                debug!(?path, error = %e, "exiftool error");
                warn!(?path, "It was not possible to retrieve metadata from file");
                MetadataRecord::new()
            }
        }
    }
}

/// exiftool prints a JSON array holding exactly one object per file
pub fn parse_exiftool_output(output: &[u8]) -> Result<MetadataRecord> {
    let mut items: Vec<Value> = serde_json::from_slice(output)?;

    if items.len() != 1 {
        return Err(Error::Metadata(format!(
            "expected one metadata object, got {}",
            items.len()
        )));
    }

    match items.pop() {
        Some(Value::Object(record)) => Ok(record),
        _ => Err(Error::Metadata("metadata entry is not an object".into())),
    }
}
