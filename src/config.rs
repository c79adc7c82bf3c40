//! Configuration types for the media sorter
//!
//! [`Config`] is the raw, serde-friendly set of options that can come from a
//! TOML file and the command line. [`Config::validate`] turns it into the
//! immutable [`RunConfig`] that every component of a run reads from.

use crate::exclude::ExclusionRules;
use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Component, MAIN_SEPARATOR, Path, PathBuf};

/// Default directory layout: year/month/day
pub const DEFAULT_DIR_FORMAT: &str = "%Y/%m/%d";

/// Default rename format: 20170101-010101
pub const DEFAULT_RENAME_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Bucket for files without a resolvable date
pub const DEFAULT_DIR_NAME: &str = "unknown";

/// Platform housekeeping files, as regexes
pub const DEFAULT_EXCLUDE_REGEX: &[&str] = &[r"\.DS_Store", r"Thumbs\.db"];

/// Platform housekeeping files, as shell patterns
pub const DEFAULT_EXCLUDE_GLOBS: &[&str] = &[".DS_Store", "Thumbs.db"];

/// User-facing directory format tokens and their strftime equivalents.
/// Longer tokens come first so `YYYY` wins over `YY`.
const DIR_FORMAT_TOKENS: &[(&str, &str)] = &[
    ("YYYY", "%Y"),
    ("YY", "%y"),
    ("MM", "%m"),
    ("M", "%B"),
    ("m", "%b"),
    ("DDD", "%j"),
    ("DD", "%d"),
];

/// How a file reaches its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Copy files, preserving permissions and timestamps
    #[default]
    Copy,
    /// Move files out of the input
    Move,
    /// Create hard links to the input files
    Link,
}

/// Raw configuration, as read from a config file and the command line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input files and directories
    pub input_paths: Vec<PathBuf>,

    /// Root of the dated output tree
    pub output_dir: PathBuf,

    /// Directory layout, as tokens (`YYYY/MM/DD`) or strftime (`%Y/%m/%d`)
    pub dir_format: String,

    /// Move instead of copy
    #[serde(rename = "move")]
    pub move_files: bool,

    /// Hard link instead of copy
    #[serde(rename = "link")]
    pub link_files: bool,

    /// Keep original file names instead of renaming by date
    pub original_names: bool,

    /// strftime format for renamed files
    pub rename_format: String,

    /// Fall back to the file modification time when no other date is found
    pub timestamp_fallback: bool,

    /// Regex with named groups (year, month, day, hour, minute, second)
    /// used to read dates from file names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_regex: Option<String>,

    /// Whitespace separated metadata fields to read the date from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_fields: Option<String>,

    /// Directory for files without a date
    pub default_dir_name: String,

    /// Only show what would be done
    pub dry_run: bool,

    /// Exclusion regexes; replaces the defaults when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_regex: Option<Vec<String>>,

    /// Exclusion shell patterns; replaces the defaults when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,

    /// File with one exclusion shell pattern per line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_file: Option<PathBuf>,

    /// exiftool executable
    pub exiftool: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_paths: vec![],
            output_dir: PathBuf::from("output"),
            dir_format: DEFAULT_DIR_FORMAT.to_string(),
            move_files: false,
            link_files: false,
            original_names: false,
            rename_format: DEFAULT_RENAME_FORMAT.to_string(),
            timestamp_fallback: false,
            date_regex: None,
            date_fields: None,
            default_dir_name: DEFAULT_DIR_NAME.to_string(),
            dry_run: false,
            exclude_regex: None,
            exclude: None,
            exclude_file: None,
            exiftool: PathBuf::from("exiftool"),
        }
    }
}

/// Validated, immutable configuration shared by every component of a run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub output_dir: PathBuf,
    /// strftime format with platform path separators
    pub dir_format: String,
    pub rename_format: String,
    pub original_names: bool,
    pub mode: TransferMode,
    pub timestamp_fallback: bool,
    pub date_regex: Option<Regex>,
    pub date_fields: Option<Vec<String>>,
    pub default_dir_name: String,
    pub dry_run: bool,
    pub exclusions: ExclusionRules,
}

impl RunConfig {
    /// Whether target files are renamed after their capture date
    pub fn renames(&self) -> bool {
        !self.original_names
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Check every option once and build the run configuration
    pub fn validate(&self) -> Result<RunConfig, ConfigError> {
        let mode = match (self.move_files, self.link_files) {
            (true, true) => return Err(ConfigError::ConflictingModes),
            (true, false) => TransferMode::Move,
            (false, true) => TransferMode::Link,
            (false, false) => TransferMode::Copy,
        };

        let dir_format = relative_to_output(&translate_dir_format(&self.dir_format))
            .filter(|format| formats_date(format))
            .ok_or_else(|| ConfigError::InvalidFormat {
                option: "dir_format",
                format: self.dir_format.clone(),
            })?;

        if !self.original_names && !formats_datetime(&self.rename_format) {
            return Err(ConfigError::InvalidFormat {
                option: "rename_format",
                format: self.rename_format.clone(),
            });
        }

        let date_regex = self
            .date_regex
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegex {
                    pattern: pattern.to_string(),
                    source: e,
                })
            })
            .transpose()?;

        let date_fields = self
            .date_fields
            .as_deref()
            .map(|fields| {
                fields
                    .split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|fields| !fields.is_empty());

        let default_dir_name = relative_to_output(self.default_dir_name.trim()).ok_or_else(|| {
            ConfigError::InvalidFormat {
                option: "default_dir_name",
                format: self.default_dir_name.clone(),
            }
        })?;

        let regexes: Vec<String> = match &self.exclude_regex {
            Some(patterns) => patterns.clone(),
            None => DEFAULT_EXCLUDE_REGEX.iter().map(|s| s.to_string()).collect(),
        };
        let globs: Vec<String> = match &self.exclude {
            Some(patterns) => patterns.clone(),
            None => DEFAULT_EXCLUDE_GLOBS.iter().map(|s| s.to_string()).collect(),
        };
        let exclusions = ExclusionRules::new(&regexes, &globs, self.exclude_file.as_deref())?;

        Ok(RunConfig {
            output_dir: expand_home(&self.output_dir),
            dir_format,
            rename_format: self.rename_format.clone(),
            original_names: self.original_names,
            mode,
            timestamp_fallback: self.timestamp_fallback,
            date_regex,
            date_fields,
            default_dir_name,
            dry_run: self.dry_run,
            exclusions,
        })
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"# Media Sorter Configuration File
# This file uses TOML format (https://toml.io)

# Input files and directories
input_paths = [
    "~/Pictures/camera",
]

# Root of the sorted tree
output_dir = "~/Pictures/sorted"

# Directory layout. Tokens: YYYY, YY, MM, M (July), m (Jul), DDD (day of year), DD
# Raw strftime specifiers such as %Y/%m/%d work as well.
dir_format = "YYYY/MM/DD"

# Move or hard link instead of copying (at most one of them)
move = false
link = false

# Keep original file names instead of renaming them after the capture date
original_names = false
rename_format = "%Y%m%d-%H%M%S"

# Use the file modification time when no date is found in metadata or file name
timestamp_fallback = false

# Read dates from file names like IMG_27.01.2015-19.20.00.jpg
# date_regex = '(?P<day>\d{2})\.(?P<month>\d{2})\.(?P<year>\d{4})[_-]?(?P<hour>\d{2})\.(?P<minute>\d{2})\.(?P<second>\d{2})'

# Metadata fields to try, in order
# date_fields = "SubSecCreateDate SubSecDateTimeOriginal CreateDate DateTimeOriginal"

# Directory for files without any date
default_dir_name = "unknown"

# Show what would be done without touching the file system
dry_run = false

# Exclusions. Setting a list replaces its defaults.
exclude_regex = ['\.DS_Store', 'Thumbs\.db']
exclude = [".DS_Store", "Thumbs.db"]
# exclude_file = "~/.config/media-sorter/ignore"

exiftool = "exiftool"
"#
        .to_string()
    }
}

/// Convert the user-facing directory format into a strftime format with
/// platform path separators. Raw `%` specifiers pass through untouched.
pub fn translate_dir_format(format: &str) -> String {
    let mut out = String::with_capacity(format.len() * 2);
    let mut chars = format.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if c == '%' {
            out.push('%');
            // padding/width modifiers, then the specifier itself
            while let Some(&(_, m)) = chars.peek() {
                if "-_0#.:123456789".contains(m) {
                    out.push(m);
                    chars.next();
                } else {
                    break;
                }
            }
            if let Some((_, spec)) = chars.next() {
                out.push(spec);
            }
            continue;
        }

        let rest = &format[idx..];
        if let Some((token, spec)) = DIR_FORMAT_TOKENS
            .iter()
            .find(|(token, _)| rest.starts_with(token))
        {
            out.push_str(spec);
            for _ in 1..token.len() {
                chars.next();
            }
            continue;
        }

        match c {
            '/' | '\\' => out.push(MAIN_SEPARATOR),
            other => out.push(other),
        }
    }

    out
}

/// Strip leading separators so the result joins below the output root.
/// `None` when nothing is left or the path could still climb out of it.
fn relative_to_output(format: &str) -> Option<String> {
    let relative = format.trim_start_matches(['/', '\\', MAIN_SEPARATOR]);
    let stays_inside = Path::new(relative)
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));

    (!relative.is_empty() && stays_inside).then(|| relative.to_string())
}

fn is_valid_strftime(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

/// Whether `format` can render a plain date (directory formats)
fn formats_date(format: &str) -> bool {
    let mut buf = String::new();
    is_valid_strftime(format) && write!(buf, "{}", NaiveDate::default().format(format)).is_ok()
}

/// Whether `format` can render a date and time (rename formats)
fn formats_datetime(format: &str) -> bool {
    let mut buf = String::new();
    is_valid_strftime(format)
        && write!(buf, "{}", NaiveDateTime::default().format(format)).is_ok()
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match directories::UserDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => path.to_path_buf(),
    }
}

/// Errors that can occur when loading or validating configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse configuration file
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Move and link were both requested
    ConflictingModes,
    /// A date format string cannot be rendered
    InvalidFormat {
        option: &'static str,
        format: String,
    },
    /// A regex failed to compile
    InvalidRegex {
        pattern: String,
        source: regex::Error,
    },
    /// A shell pattern failed to compile
    InvalidGlob {
        pattern: String,
        source: globset::Error,
    },
    /// The exclusion pattern file could not be read
    ExcludeFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
            ConfigError::ConflictingModes => {
                write!(f, "Move and link are mutually exclusive")
            }
            ConfigError::InvalidFormat { option, format } => {
                write!(f, "Invalid value for {}: '{}'", option, format)
            }
            ConfigError::InvalidRegex { pattern, source } => {
                write!(f, "Invalid regex '{}': {}", pattern, source)
            }
            ConfigError::InvalidGlob { pattern, source } => {
                write!(f, "Invalid pattern '{}': {}", pattern, source)
            }
            ConfigError::ExcludeFile { path, source } => {
                write!(f, "Failed to read exclusion file '{}': {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::InvalidRegex { source, .. } => Some(source),
            ConfigError::InvalidGlob { source, .. } => Some(source),
            ConfigError::ExcludeFile { source, .. } => Some(source),
            ConfigError::ConflictingModes | ConfigError::InvalidFormat { .. } => None,
        }
    }
}
