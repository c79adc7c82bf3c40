//! Media Sorter - sort photos and videos by capture date
//!
//! This library provides functionality for organizing photos and videos
//! into a date based directory tree with support for:
//! - Capture dates from exiftool metadata, file names and modification times
//! - Renaming after the capture time, including sub-seconds
//! - SHA-256 based duplicate detection and `name-N.ext` collision suffixes
//! - Copy, move and hard link transfers with XMP sidecars
//! - Name based exclusions and dry runs

pub mod cli;
pub mod config;
pub mod error;
pub mod exclude;
pub mod hash;
pub mod metadata;
pub mod os;
pub mod planner;
pub mod process;
pub mod time;
pub mod transfer;
pub mod walk;

pub use cli::Cli;
pub use config::{Config, ConfigError, RunConfig, TransferMode};
pub use error::{Error, Result};
pub use exclude::ExclusionRules;
pub use metadata::{ExifTool, MetadataProvider, MetadataRecord};
pub use planner::{Planner, TransferPlan};
pub use process::Processor;
pub use time::{DateResolver, ResolvedDate};
pub use transfer::{TransferEngine, TransferOutcome};
