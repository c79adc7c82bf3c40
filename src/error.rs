//! Error types for the media sorter

use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for media sorter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code used when a run is aborted by a fatal error
pub const FATAL_EXIT_CODE: u8 = 99;

/// Main error type for the media sorter
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "exiftool not found ({program}). Install it with your package manager \
         (usually perl-image-exiftool) or from https://exiftool.org"
    )]
    ExifToolNotFound { program: PathBuf },

    #[error("No input files or directories were provided")]
    NoInput,

    #[error("There was no valid file on the input")]
    NoValidInput,

    #[error("There was an error when creating directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Gave up finding a free name for {path} after {attempts} attempts")]
    CollisionLimit { path: PathBuf, attempts: u32 },

    #[error("File hash computation failed for {path}: {source}")]
    HashComputation {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Run interrupted")]
    Interrupted,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unreadable exiftool output: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("exiftool error: {0}")]
    Metadata(String),
}

impl Error {
    /// Whether this error aborts the whole run rather than a single file
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ExifToolNotFound { .. }
                | Error::NoInput
                | Error::NoValidInput
                | Error::CreateDirectory { .. }
                | Error::Config(_)
        )
    }
}
