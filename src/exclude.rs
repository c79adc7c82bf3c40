//! File name exclusion rules
//!
//! A file is skipped when its name matches any exclusion regex (searched,
//! not anchored), any shell pattern (case-sensitive), or any pattern listed
//! in the exclusion file.

use crate::config::ConfigError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::RegexSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Compiled exclusion rules, immutable for a run
#[derive(Debug, Clone)]
pub struct ExclusionRules {
    regexes: RegexSet,
    globs: GlobSet,
    file_patterns: GlobSet,
    exclude_file: Option<PathBuf>,
}

impl ExclusionRules {
    /// Compile the rules. The exclusion file is read once, here.
    pub fn new(
        regexes: &[String],
        globs: &[String],
        exclude_file: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let regex_set = RegexSet::new(regexes).map_err(|e| ConfigError::InvalidRegex {
            pattern: regexes.join(", "),
            source: e,
        })?;

        let glob_set = build_glob_set(globs.iter().map(String::as_str))?;

        let file_patterns = match exclude_file {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| ConfigError::ExcludeFile {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                build_glob_set(
                    content
                        .lines()
                        .map(|line| line.trim_end_matches('\r'))
                        .filter(|line| !line.is_empty()),
                )?
            }
            None => GlobSet::empty(),
        };

        Ok(Self {
            regexes: regex_set,
            globs: glob_set,
            file_patterns,
            exclude_file: exclude_file.map(Path::to_path_buf),
        })
    }

    /// Rules that exclude nothing
    pub fn none() -> Self {
        Self {
            regexes: RegexSet::empty(),
            globs: GlobSet::empty(),
            file_patterns: GlobSet::empty(),
            exclude_file: None,
        }
    }

    /// Whether the given file name must be skipped
    pub fn is_excluded(&self, filename: &str) -> bool {
        if self.regexes.is_match(filename) {
            debug!(filename, "File matched exclusion regex, excluding");
            return true;
        }

        if self.globs.is_match(filename) {
            debug!(filename, "File matched exclusion pattern, excluding");
            return true;
        }

        if self.file_patterns.is_match(filename) {
            debug!(
                filename,
                exclude_file = ?self.exclude_file,
                "File matched a pattern in the exclusion file, excluding"
            );
            return true;
        }

        false
    }
}

fn build_glob_set<'a>(patterns: impl Iterator<Item = &'a str>) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ConfigError::InvalidGlob {
            pattern: pattern.to_string(),
            source: e,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ConfigError::InvalidGlob {
        pattern: String::new(),
        source: e,
    })
}
