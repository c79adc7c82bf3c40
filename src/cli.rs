//! CLI argument parsing with clap

use crate::config::Config;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::Level;

/// Media Sorter - sort photos and videos into date based directories
///
/// Reads the capture date of every file through exiftool, falling back to
/// the file name and optionally the modification time, then copies, moves
/// or links the file to OUTPUT/YYYY/MM/DD.
#[derive(Parser, Debug)]
#[command(name = "media-sorter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Input files and directories followed by the output directory
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Path to configuration file (TOML format)
    ///
    /// Settings from the config file are used as defaults,
    /// command line arguments override them.
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Move files instead of copying them
    #[arg(short, long = "move", conflicts_with = "link")]
    pub move_files: bool,

    /// Hard link files instead of copying them
    #[arg(short, long)]
    pub link: bool,

    /// Show what would be done without changing anything
    #[arg(short = 'y', long)]
    pub dry_run: bool,

    /// Keep the original file names
    #[arg(short = 'o', long)]
    pub original_names: bool,

    /// strftime format for renamed files (default: %Y%m%d-%H%M%S)
    #[arg(long)]
    pub rename_format: Option<String>,

    /// Use the file modification time when no other date is found
    #[arg(short, long)]
    pub timestamp: bool,

    /// Regex with named groups (year, month, day, hour, minute, second)
    /// to read dates from file names
    #[arg(short, long)]
    pub regex: Option<String>,

    /// Metadata fields to read the date from, space separated, in order
    #[arg(short = 'f', long = "date-field")]
    pub date_field: Option<String>,

    /// Directory format: YYYY, YY, MM, M, m, DDD, DD or strftime
    /// specifiers (default: YYYY/MM/DD)
    #[arg(short = 'd', long = "date")]
    pub date_format: Option<String>,

    /// Directory for files without a date
    #[arg(long)]
    pub default_dir_name: Option<String>,

    /// Skip files whose name matches this regex (repeatable)
    #[arg(long, value_name = "REGEX")]
    pub exclude_regex: Vec<String>,

    /// Skip files whose name matches this shell pattern (repeatable)
    #[arg(long, value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// File with one shell pattern per line to skip
    #[arg(long)]
    pub exclude_file: Option<PathBuf>,

    /// exiftool executable
    #[arg(long)]
    pub exiftool: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Warning, ignore_case = true)]
    pub log: LogLevel,

    /// Also write the log to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Write the log file as JSON
    #[arg(long, requires = "log_file")]
    pub json_log: bool,

    /// Print a sample configuration file and exit
    #[arg(long)]
    pub sample_config: bool,
}

/// Console log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    #[value(alias = "warn")]
    Warning,
    Error,
}

impl LogLevel {
    pub fn level(self) -> Level {
        match self {
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warning => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl Cli {
    /// Positional paths split into inputs and the output directory.
    /// A single path is taken as the output.
    pub fn split_paths(&self) -> Option<(&[PathBuf], &PathBuf)> {
        self.paths
            .split_last()
            .map(|(output, inputs)| (inputs, output))
    }

    /// Merge CLI arguments with config from file
    /// CLI arguments take precedence over config file settings
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if let Some((inputs, output)) = self.split_paths() {
            if !inputs.is_empty() {
                config.input_paths = inputs.to_vec();
            }
            config.output_dir = output.clone();
        }
        if self.move_files {
            config.move_files = true;
            config.link_files = false;
        }
        if self.link {
            config.link_files = true;
            config.move_files = false;
        }
        if self.dry_run {
            config.dry_run = true;
        }
        if self.original_names {
            config.original_names = true;
        }
        if let Some(ref rename_format) = self.rename_format {
            config.rename_format = rename_format.clone();
        }
        if self.timestamp {
            config.timestamp_fallback = true;
        }
        if let Some(ref regex) = self.regex {
            config.date_regex = Some(regex.clone());
        }
        if let Some(ref fields) = self.date_field {
            config.date_fields = Some(fields.clone());
        }
        if let Some(ref format) = self.date_format {
            config.dir_format = format.clone();
        }
        if let Some(ref name) = self.default_dir_name {
            config.default_dir_name = name.clone();
        }
        if !self.exclude_regex.is_empty() {
            config.exclude_regex = Some(self.exclude_regex.clone());
        }
        if !self.exclude.is_empty() {
            config.exclude = Some(self.exclude.clone());
        }
        if let Some(ref exclude_file) = self.exclude_file {
            config.exclude_file = Some(exclude_file.clone());
        }
        if let Some(ref exiftool) = self.exiftool {
            config.exiftool = exiftool.clone();
        }

        config
    }

    /// Convert CLI arguments to Config (when no config file is used)
    pub fn to_config(&self) -> Config {
        self.merge_with_config(Config::default())
    }
}
