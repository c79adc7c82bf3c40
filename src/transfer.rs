//! Collision resolution and file transfer
//!
//! A target that already exists is compared by content hash: identical
//! content means the file is already sorted, anything else moves on to the
//! next `name-N.ext` candidate. Symlinks and other non-file entries
//! simply occupy their name.
//!
//! A dry run writes nothing, so the engine remembers which source each
//! target was handed to. Later files of the same run then collide with those
//! targets exactly as they would in a live run.

use crate::config::{RunConfig, TransferMode};
use crate::error::{Error, Result};
use crate::hash::compute_file_hash;
use crate::planner::TransferPlan;
use filetime::FileTime;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Highest suffix tried before giving up on a target name
pub const MAX_COLLISION_SUFFIX: u32 = 10_000;

/// What happened to a planned transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The file (and its sidecars) reached the target, or would have in dry-run mode
    Transferred {
        target: PathBuf,
        sidecars: Vec<PathBuf>,
    },
    /// Identical content already sits at `existing`
    Duplicate { existing: PathBuf },
    /// The source disappeared before it could be transferred
    SourceMissing,
}

/// `name.ext` with suffix 2 becomes `name-2.ext`
pub fn suffixed_name(filename: &OsStr, suffix: u32) -> OsString {
    let path = Path::new(filename);
    let mut name = path.file_stem().unwrap_or(filename).to_os_string();
    name.push(format!("-{}", suffix));
    if let Some(extension) = path.extension() {
        name.push(".");
        name.push(extension);
    }
    name
}

/// Copies, moves or links planned files into place
#[derive(Debug, Clone)]
pub struct TransferEngine {
    mode: TransferMode,
    dry_run: bool,
    /// Dry-run only: target path -> source that would have been written there
    claimed: HashMap<PathBuf, PathBuf>,
}

impl TransferEngine {
    pub fn new(mode: TransferMode, dry_run: bool) -> Self {
        Self {
            mode,
            dry_run,
            claimed: HashMap::new(),
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.mode, config.dry_run)
    }

    /// Transfer a planned file, resolving name collisions on the way
    pub fn transfer(&mut self, plan: &TransferPlan) -> Result<TransferOutcome> {
        let mut source_hash: Option<String> = None;
        let mut suffix = 1;

        let (target, filename) = loop {
            let filename = if suffix == 1 {
                plan.target_filename.clone()
            } else {
                suffixed_name(&plan.target_filename, suffix)
            };
            let candidate = plan.target_directory.join(&filename);

            // file whose content sits under the candidate name, if any
            let content = match self.claimed.get(&candidate) {
                Some(claimed_source) => Some(claimed_source.clone()),
                None => match fs::symlink_metadata(&candidate) {
                    Err(e) if e.kind() == io::ErrorKind::NotFound => break (candidate, filename),
                    Err(e) => return Err(e.into()),
                    Ok(meta) if meta.is_file() => Some(candidate.clone()),
                    Ok(_) => {
                        debug!(?candidate, "Name taken by a non-file entry");
                        None
                    }
                },
            };

            if let Some(content) = content {
                if source_hash.is_none() {
                    source_hash = match compute_file_hash(&plan.source) {
                        Ok(hash) => Some(hash),
                        Err(Error::HashComputation { source, .. })
                            if source.kind() == io::ErrorKind::NotFound =>
                        {
                            warn!(source = ?plan.source, "Source disappeared, skipping");
                            return Ok(TransferOutcome::SourceMissing);
                        }
                        Err(e) => return Err(e),
                    };
                }

                if source_hash.as_deref() == Some(compute_file_hash(&content)?.as_str()) {
                    warn!(
                        "{} => skipped, duplicated file {}",
                        plan.source.display(),
                        candidate.display()
                    );
                    return Ok(TransferOutcome::Duplicate {
                        existing: candidate,
                    });
                }
                debug!(?candidate, "Name taken by different content");
            }

            suffix += 1;
            if suffix > MAX_COLLISION_SUFFIX {
                return Err(Error::CollisionLimit {
                    path: plan.target_path(),
                    attempts: MAX_COLLISION_SUFFIX,
                });
            }
        };

        if let Err(e) = self.perform(&plan.source, &target) {
            if e.kind() == io::ErrorKind::NotFound && !plan.source.exists() {
                warn!(source = ?plan.source, "Source disappeared, skipping");
                return Ok(TransferOutcome::SourceMissing);
            }
            return Err(e.into());
        }
        info!("{} => {}", plan.source.display(), target.display());
        if self.dry_run {
            self.claimed.insert(target.clone(), plan.source.clone());
        }

        let sidecars = self.transfer_sidecars(plan, &filename);
        Ok(TransferOutcome::Transferred { target, sidecars })
    }

    /// Sidecars follow the primary file's final name. Failures only warn.
    fn transfer_sidecars(&self, plan: &TransferPlan, final_filename: &OsStr) -> Vec<PathBuf> {
        let mut transferred = Vec::new();

        for companion in &plan.companions {
            if !companion.source.is_file() {
                debug!(sidecar = ?companion.source, "Sidecar vanished");
                continue;
            }

            let target = plan
                .target_directory
                .join(companion.kind.target_name(final_filename));
            match self.perform(&companion.source, &target) {
                Ok(()) => {
                    info!("{} => {}", companion.source.display(), target.display());
                    transferred.push(target);
                }
                Err(e) => warn!(
                    sidecar = ?companion.source,
                    error = %e,
                    "Failed to transfer sidecar"
                ),
            }
        }

        transferred
    }

    fn perform(&self, source: &Path, target: &Path) -> io::Result<()> {
        if self.dry_run {
            debug!(?source, ?target, "Dry-run: not touching files");
            return Ok(());
        }

        match self.mode {
            TransferMode::Copy => copy_preserving(source, target),
            TransferMode::Move => match fs::rename(source, target) {
                Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                    copy_preserving(source, target)?;
                    if let Err(e) = fs::remove_file(source) {
                        // the source stays, so the copy goes
                        if let Err(cleanup) = fs::remove_file(target) {
                            warn!(?target, error = %cleanup, "Could not remove copied file");
                        }
                        return Err(e);
                    }
                    Ok(())
                }
                result => result,
            },
            TransferMode::Link => fs::hard_link(source, target),
        }
    }
}

/// Copy content and permissions, then carry over access and modification times
fn copy_preserving(source: &Path, target: &Path) -> io::Result<()> {
    fs::copy(source, target)?;

    let metadata = fs::metadata(source)?;
    if let Err(e) = filetime::set_file_times(
        target,
        FileTime::from_last_access_time(&metadata),
        FileTime::from_last_modification_time(&metadata),
    ) {
        debug!(?target, error = %e, "Could not preserve file times");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{Companion, SidecarKind};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        input: PathBuf,
        output: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        let output = dir.path().join("output");
        fs::create_dir_all(&input).unwrap();
        fs::create_dir_all(&output).unwrap();
        Fixture {
            _dir: dir,
            input,
            output,
        }
    }

    fn plan(source: &Path, output: &Path, name: &str) -> TransferPlan {
        TransferPlan {
            source: source.to_path_buf(),
            target_directory: output.to_path_buf(),
            target_filename: OsString::from(name),
            companions: Vec::new(),
        }
    }

    fn copy_engine() -> TransferEngine {
        TransferEngine::new(TransferMode::Copy, false)
    }

    #[test]
    fn test_suffixed_name() {
        assert_eq!(suffixed_name(OsStr::new("photo.jpg"), 2), OsString::from("photo-2.jpg"));
        assert_eq!(suffixed_name(OsStr::new("archive.tar.gz"), 3), OsString::from("archive.tar-3.gz"));
        assert_eq!(suffixed_name(OsStr::new("README"), 2), OsString::from("README-2"));
    }

    #[test]
    fn test_copy_preserves_source_and_mtime() {
        let fx = fixture();
        let source = fx.input.join("a.jpg");
        fs::write(&source, b"aaa").unwrap();
        filetime::set_file_mtime(&source, FileTime::from_unix_time(1_500_000_000, 0)).unwrap();

        let outcome = copy_engine().transfer(&plan(&source, &fx.output, "x.jpg")).unwrap();
        let target = fx.output.join("x.jpg");
        assert_eq!(
            outcome,
            TransferOutcome::Transferred {
                target: target.clone(),
                sidecars: vec![]
            }
        );
        assert!(source.exists());
        assert_eq!(fs::read(&target).unwrap(), b"aaa");

        let meta = fs::metadata(&target).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta).unix_seconds(), 1_500_000_000);
    }

    #[test]
    fn test_identical_content_is_duplicate() {
        let fx = fixture();
        let source = fx.input.join("a.jpg");
        fs::write(&source, b"same").unwrap();
        fs::write(fx.output.join("x.jpg"), b"same").unwrap();

        let outcome = copy_engine().transfer(&plan(&source, &fx.output, "x.jpg")).unwrap();
        assert_eq!(
            outcome,
            TransferOutcome::Duplicate {
                existing: fx.output.join("x.jpg")
            }
        );
        assert!(!fx.output.join("x-2.jpg").exists());
    }

    #[test]
    fn test_different_content_gets_suffix() {
        let fx = fixture();
        let source = fx.input.join("a.jpg");
        fs::write(&source, b"new").unwrap();
        fs::write(fx.output.join("x.jpg"), b"old").unwrap();
        fs::write(fx.output.join("x-2.jpg"), b"older").unwrap();

        let outcome = copy_engine().transfer(&plan(&source, &fx.output, "x.jpg")).unwrap();
        let target = fx.output.join("x-3.jpg");
        assert!(matches!(outcome, TransferOutcome::Transferred { target: ref t, .. } if *t == target));
        assert_eq!(fs::read(&target).unwrap(), b"new");
        assert_eq!(fs::read(fx.output.join("x.jpg")).unwrap(), b"old");
    }

    #[test]
    fn test_duplicate_found_under_suffix() {
        let fx = fixture();
        let source = fx.input.join("a.jpg");
        fs::write(&source, b"new").unwrap();
        fs::write(fx.output.join("x.jpg"), b"old").unwrap();
        fs::write(fx.output.join("x-2.jpg"), b"new").unwrap();

        let outcome = copy_engine().transfer(&plan(&source, &fx.output, "x.jpg")).unwrap();
        assert!(matches!(outcome, TransferOutcome::Duplicate { .. }));
        assert!(!fx.output.join("x-3.jpg").exists());
    }

    #[test]
    fn test_move() {
        let fx = fixture();
        let source = fx.input.join("a.jpg");
        fs::write(&source, b"move me").unwrap();

        let mut engine = TransferEngine::new(TransferMode::Move, false);
        engine.transfer(&plan(&source, &fx.output, "x.jpg")).unwrap();
        assert!(!source.exists());
        assert_eq!(fs::read(fx.output.join("x.jpg")).unwrap(), b"move me");
    }

    #[cfg(unix)]
    #[test]
    fn test_link() {
        use std::os::unix::fs::MetadataExt;

        let fx = fixture();
        let source = fx.input.join("a.jpg");
        fs::write(&source, b"link me").unwrap();

        let mut engine = TransferEngine::new(TransferMode::Link, false);
        engine.transfer(&plan(&source, &fx.output, "x.jpg")).unwrap();
        let target = fx.output.join("x.jpg");
        assert!(source.exists());
        assert_eq!(
            fs::metadata(&source).unwrap().ino(),
            fs::metadata(&target).unwrap().ino()
        );
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let fx = fixture();
        let source = fx.input.join("a.jpg");
        fs::write(&source, b"content").unwrap();
        fs::write(fx.output.join("x.jpg"), b"other").unwrap();

        let mut engine = TransferEngine::new(TransferMode::Move, true);
        let outcome = engine.transfer(&plan(&source, &fx.output, "x.jpg")).unwrap();
        assert!(matches!(outcome, TransferOutcome::Transferred { target: ref t, .. } if *t == fx.output.join("x-2.jpg")));
        assert!(source.exists());
        assert!(!fx.output.join("x-2.jpg").exists());
    }

    #[test]
    fn test_dry_run_remembers_claimed_targets() {
        let fx = fixture();
        let first = fx.input.join("a.jpg");
        let same = fx.input.join("b.jpg");
        let different = fx.input.join("c.jpg");
        fs::write(&first, b"same").unwrap();
        fs::write(&same, b"same").unwrap();
        fs::write(&different, b"different").unwrap();

        let mut engine = TransferEngine::new(TransferMode::Copy, true);
        let target = fx.output.join("x.jpg");
        assert!(matches!(
            engine.transfer(&plan(&first, &fx.output, "x.jpg")).unwrap(),
            TransferOutcome::Transferred { target: ref t, .. } if *t == target
        ));
        assert_eq!(
            engine.transfer(&plan(&same, &fx.output, "x.jpg")).unwrap(),
            TransferOutcome::Duplicate { existing: target.clone() }
        );
        assert!(matches!(
            engine.transfer(&plan(&different, &fx.output, "x.jpg")).unwrap(),
            TransferOutcome::Transferred { target: ref t, .. } if *t == fx.output.join("x-2.jpg")
        ));
        assert!(!target.exists());

        // a fresh engine starts from what is on disk
        let mut fresh = TransferEngine::new(TransferMode::Copy, true);
        assert!(matches!(
            fresh.transfer(&plan(&same, &fx.output, "x.jpg")).unwrap(),
            TransferOutcome::Transferred { target: ref t, .. } if *t == target
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_occupies_name() {
        let fx = fixture();
        let source = fx.input.join("a.jpg");
        fs::write(&source, b"content").unwrap();
        let outside = fx.input.join("outside.jpg");
        std::os::unix::fs::symlink(&outside, fx.output.join("x.jpg")).unwrap();

        let outcome = copy_engine().transfer(&plan(&source, &fx.output, "x.jpg")).unwrap();
        assert!(matches!(outcome, TransferOutcome::Transferred { target: ref t, .. } if *t == fx.output.join("x-2.jpg")));
        assert!(!outside.exists());
        assert!(fs::symlink_metadata(fx.output.join("x.jpg")).unwrap().file_type().is_symlink());

        // a link to identical content is still not a duplicate
        fs::write(&outside, b"content").unwrap();
        let outcome = copy_engine().transfer(&plan(&source, &fx.output, "x.jpg")).unwrap();
        assert!(matches!(outcome, TransferOutcome::Duplicate { existing } if existing == fx.output.join("x-2.jpg")));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_move_keeps_single_copy() {
        use std::os::unix::fs::PermissionsExt;

        let fx = fixture();
        let locked = fx.input.join("locked");
        fs::create_dir_all(&locked).unwrap();
        let source = locked.join("a.jpg");
        fs::write(&source, b"move me").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        let mut engine = TransferEngine::new(TransferMode::Move, false);
        let result = engine.transfer(&plan(&source, &fx.output, "x.jpg"));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let target = fx.output.join("x.jpg");
        // privileged users can still move out of a read-only directory
        match result {
            Ok(_) => assert!(!source.exists() && target.exists()),
            Err(_) => assert!(source.exists() && !target.exists()),
        }
    }

    #[test]
    fn test_missing_source() {
        let fx = fixture();
        let source = fx.input.join("gone.jpg");

        let outcome = copy_engine().transfer(&plan(&source, &fx.output, "x.jpg")).unwrap();
        assert_eq!(outcome, TransferOutcome::SourceMissing);

        // missing source noticed while comparing against an occupied name
        fs::write(fx.output.join("x.jpg"), b"x").unwrap();
        let outcome = copy_engine().transfer(&plan(&source, &fx.output, "x.jpg")).unwrap();
        assert_eq!(outcome, TransferOutcome::SourceMissing);
    }

    #[test]
    fn test_sidecars_follow_final_name() {
        let fx = fixture();
        let source = fx.input.join("a.jpg");
        fs::write(&source, b"new").unwrap();
        let with_ext = fx.input.join("a.jpg.xmp");
        let without_ext = fx.input.join("a.xmp");
        fs::write(&with_ext, b"<xmp 1/>").unwrap();
        fs::write(&without_ext, b"<xmp 2/>").unwrap();
        fs::write(fx.output.join("x.jpg"), b"old").unwrap();

        let mut plan = plan(&source, &fx.output, "x.jpg");
        plan.companions = vec![
            Companion {
                source: with_ext,
                kind: SidecarKind::WithExtension,
            },
            Companion {
                source: without_ext,
                kind: SidecarKind::WithoutExtension,
            },
        ];

        let outcome = copy_engine().transfer(&plan).unwrap();
        let TransferOutcome::Transferred { target, sidecars } = outcome else {
            panic!("expected a transfer");
        };
        assert_eq!(target, fx.output.join("x-2.jpg"));
        assert_eq!(
            sidecars,
            vec![fx.output.join("x-2.jpg.xmp"), fx.output.join("x-2.xmp")]
        );
        assert_eq!(fs::read(fx.output.join("x-2.xmp")).unwrap(), b"<xmp 2/>");
    }

    #[test]
    fn test_duplicate_leaves_sidecars_alone() {
        let fx = fixture();
        let source = fx.input.join("a.jpg");
        fs::write(&source, b"same").unwrap();
        let sidecar = fx.input.join("a.xmp");
        fs::write(&sidecar, b"<xmp/>").unwrap();
        fs::write(fx.output.join("x.jpg"), b"same").unwrap();

        let mut plan = plan(&source, &fx.output, "x.jpg");
        plan.companions = vec![Companion {
            source: sidecar,
            kind: SidecarKind::WithoutExtension,
        }];

        let outcome = copy_engine().transfer(&plan).unwrap();
        assert!(matches!(outcome, TransferOutcome::Duplicate { .. }));
        assert!(!fx.output.join("x.xmp").exists());
    }
}
