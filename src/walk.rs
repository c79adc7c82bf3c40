//! Input directory traversal

use crate::exclude::ExclusionRules;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};
use walkdir::{DirEntry, WalkDir};

/// Files below `root`, depth-first. Within a directory its files come before
/// its subdirectories, both in name order. Directory symlinks are not
/// followed, unreadable entries are logged and skipped, and excluded names
/// never leave the walker.
pub fn walk<'a>(root: &Path, exclusions: &'a ExclusionRules) -> impl Iterator<Item = PathBuf> + 'a {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by(|a, b| {
            a.file_type()
                .is_dir()
                .cmp(&b.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Could not read directory entry, continuing");
                None
            }
        })
        .filter(is_regular_file)
        .filter(move |entry| !exclusions.is_excluded(&entry.file_name().to_string_lossy()))
        .map(|entry| {
            trace!(path = ?entry.path(), "Found file");
            entry.into_path()
        })
}

/// Plain files and symlinks that resolve to one
fn is_regular_file(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())
}
