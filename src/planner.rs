//! Target path planning
//!
//! Turns a resolved date into the target directory and file name, and
//! collects the XMP sidecars that have to follow the file.

use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::time::ResolvedDate;
use std::ffi::{OsStr, OsString};
use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extension of sidecar files, always kept literally
pub const SIDECAR_EXTENSION: &str = "xmp";

/// How a sidecar's name relates to its primary file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarKind {
    /// `photo.jpg.xmp`
    WithExtension,
    /// `photo.xmp`
    WithoutExtension,
}

impl SidecarKind {
    /// Sidecar file name for the primary file's final target name
    pub fn target_name(self, primary_target: &OsStr) -> OsString {
        let mut name = match self {
            SidecarKind::WithExtension => primary_target.to_os_string(),
            SidecarKind::WithoutExtension => Path::new(primary_target)
                .file_stem()
                .unwrap_or(primary_target)
                .to_os_string(),
        };
        name.push(".");
        name.push(SIDECAR_EXTENSION);
        name
    }
}

/// A sidecar found next to the source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Companion {
    pub source: PathBuf,
    pub kind: SidecarKind,
}

/// Where a single file should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    pub source: PathBuf,
    pub target_directory: PathBuf,
    pub target_filename: OsString,
    pub companions: Vec<Companion>,
}

impl TransferPlan {
    pub fn target_path(&self) -> PathBuf {
        self.target_directory.join(&self.target_filename)
    }
}

/// Whether the path is a sidecar, which is only ever handled with its primary
pub fn is_sidecar(path: &Path) -> bool {
    path.as_os_str()
        .to_string_lossy()
        .ends_with(&format!(".{}", SIDECAR_EXTENSION))
}

/// Plans target paths for a run
#[derive(Debug, Clone, Copy)]
pub struct Planner<'a> {
    config: &'a RunConfig,
}

impl<'a> Planner<'a> {
    pub fn new(config: &'a RunConfig) -> Self {
        Self { config }
    }

    /// Plan the target of `source` for the given date
    pub fn plan(&self, source: &Path, date: &ResolvedDate) -> TransferPlan {
        TransferPlan {
            source: source.to_path_buf(),
            target_directory: self.target_directory(date),
            target_filename: self.target_filename(source, date),
            companions: self.companions(source),
        }
    }

    /// Sidecars next to `source`, minus excluded names
    fn companions(&self, source: &Path) -> Vec<Companion> {
        find_companions(source)
            .into_iter()
            .filter(|companion| {
                let name = companion
                    .source
                    .file_name()
                    .map(|n| n.to_string_lossy())
                    .unwrap_or_default();
                !self.config.exclusions.is_excluded(&name)
            })
            .collect()
    }

    /// `output/<date formatted with dir_format>`, or the default bucket
    pub fn target_directory(&self, date: &ResolvedDate) -> PathBuf {
        let Some(timestamp) = &date.timestamp else {
            return self.config.output_dir.join(&self.config.default_dir_name);
        };

        let mut formatted = String::new();
        match write!(
            formatted,
            "{}",
            timestamp.datetime.date().format(&self.config.dir_format)
        ) {
            Ok(()) => self.config.output_dir.join(formatted),
            Err(_) => {
                warn!(format = %self.config.dir_format, "Directory format failed, using default directory");
                self.config.output_dir.join(&self.config.default_dir_name)
            }
        }
    }

    /// Renamed after the capture time, or the original name
    pub fn target_filename(&self, source: &Path, date: &ResolvedDate) -> OsString {
        let original = source
            .file_name()
            .map(OsStr::to_os_string)
            .unwrap_or_else(|| source.as_os_str().to_os_string());

        if !self.config.renames() {
            return original;
        }

        let Some(timestamp) = &date.timestamp else {
            debug!(?source, "No date to rename by, keeping original name");
            return original;
        };

        let mut name = String::new();
        if write!(
            name,
            "{}",
            timestamp.datetime.format(&self.config.rename_format)
        )
        .is_err()
        {
            warn!(format = %self.config.rename_format, "Rename format failed, keeping original name");
            return original;
        }

        if let Some(subseconds) = &timestamp.subseconds {
            name.push_str(subseconds);
        }

        let mut name = OsString::from(name);
        if let Some(extension) = source.extension() {
            name.push(".");
            name.push(extension);
        }

        debug!(?source, ?name, "Determined new file name");
        name
    }

    /// Create a target directory. Existing directories are fine; any other
    /// failure aborts the run. Nothing is created in dry-run mode.
    pub fn ensure_directory(&self, directory: &Path) -> Result<()> {
        if self.config.dry_run {
            debug!(?directory, "Dry-run: not creating directory");
            return Ok(());
        }

        match fs::create_dir_all(directory) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists && directory.is_dir() => {
                debug!(?directory, "Directory already exists");
                Ok(())
            }
            Err(source) => Err(Error::CreateDirectory {
                path: directory.to_path_buf(),
                source,
            }),
        }
    }
}

/// `<source>.xmp` and `<source without extension>.xmp`, when present
fn find_companions(source: &Path) -> Vec<Companion> {
    let mut with_extension = source.as_os_str().to_os_string();
    with_extension.push(".");
    with_extension.push(SIDECAR_EXTENSION);
    let with_extension = PathBuf::from(with_extension);
    let without_extension = source.with_extension(SIDECAR_EXTENSION);

    let mut companions = Vec::new();
    if with_extension.is_file() && with_extension != without_extension {
        companions.push(Companion {
            source: with_extension,
            kind: SidecarKind::WithExtension,
        });
    }
    if without_extension.is_file() {
        companions.push(Companion {
            source: without_extension,
            kind: SidecarKind::WithoutExtension,
        });
    }
    companions
}
