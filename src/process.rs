//! Main file processor
//!
//! Handles the core logic of:
//! - Checking the inputs and ensuring the output root
//! - Walking input directories
//! - Resolving capture dates from metadata
//! - Planning target paths and transferring files
//!
//! Files are handled one at a time, in walk order.

use crate::config::{RunConfig, expand_home};
use crate::error::{Error, Result};
use crate::metadata::{MetadataProvider, is_non_media};
use crate::planner::{Planner, is_sidecar};
use crate::time::{DateResolver, ResolvedDate};
use crate::transfer::{TransferEngine, TransferOutcome};
use crate::walk::walk;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Level, debug, error, info, span, warn};

/// Result of processing a single file
#[derive(Debug, Clone)]
pub struct FileResult {
    /// Source file path
    pub source: PathBuf,
    /// Where the file went, or already sits for duplicates
    pub destination: Option<PathBuf>,
    /// Sidecars transferred along with the file
    pub sidecars: Vec<PathBuf>,
    /// Resolved capture date
    pub date: Option<ResolvedDate>,
    /// Processing status
    pub status: ProcessingStatus,
    /// Error message (if failed)
    pub error: Option<String>,
}

impl FileResult {
    fn new(source: &Path, status: ProcessingStatus) -> Self {
        Self {
            source: source.to_path_buf(),
            destination: None,
            sidecars: Vec::new(),
            date: None,
            status,
            error: None,
        }
    }
}

/// Status of file processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    /// File reached its target
    Success,
    /// Dry run - would have been transferred
    DryRun,
    /// Identical content already present at the target
    Duplicate,
    /// Not processed: a sidecar, an excluded name or a vanished source
    Skipped,
    /// Processing failed
    Failed,
}

/// Processing statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    pub total_files: usize,
    pub processed: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub failed: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, status: ProcessingStatus) {
        self.total_files += 1;
        match status {
            ProcessingStatus::Success | ProcessingStatus::DryRun => self.processed += 1,
            ProcessingStatus::Duplicate => self.duplicates += 1,
            ProcessingStatus::Skipped => self.skipped += 1,
            ProcessingStatus::Failed => self.failed += 1,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Total: {}, Processed: {}, Skipped: {}, Duplicates: {}, Failed: {}",
            self.total_files, self.processed, self.skipped, self.duplicates, self.failed
        )
    }
}

/// Main processor for sorting media files
pub struct Processor<P> {
    config: RunConfig,
    provider: P,
    stats: ProcessingStats,
    interrupt: Option<&'static AtomicBool>,
}

impl<P: MetadataProvider> Processor<P> {
    /// Create a new processor with the given configuration
    pub fn new(config: RunConfig, provider: P) -> Self {
        Self {
            config,
            provider,
            stats: ProcessingStats::new(),
            interrupt: None,
        }
    }

    /// Stop the run once `flag` is raised
    pub fn with_interrupt(mut self, flag: &'static AtomicBool) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Statistics of the files handled so far
    pub fn stats(&self) -> &ProcessingStats {
        &self.stats
    }

    /// Run the processing pipeline over the given input files and directories
    pub fn run(&mut self, inputs: &[PathBuf]) -> Result<Vec<FileResult>> {
        let _span = span!(Level::INFO, "processor_run").entered();

        let inputs: Vec<PathBuf> = inputs.iter().map(|input| expand_home(input)).collect();
        check_inputs(&inputs)?;

        let mut pipeline = Pipeline::new(&self.config, &self.provider);
        pipeline.ensure_output_root()?;

        let interrupt = self.interrupt;
        let stats = &mut self.stats;
        let mut results = Vec::new();

        for input in &inputs {
            if input.is_dir() {
                info!(input = %input.display(), "Walking directory");
                for path in walk(input, &self.config.exclusions) {
                    check_interrupt(interrupt)?;
                    let result = pipeline.process(&path, interrupt)?;
                    stats.record(result.status);
                    results.push(result);
                }
            } else if input.is_file() {
                check_interrupt(interrupt)?;
                let result = match input.file_name() {
                    Some(name) if self.config.exclusions.is_excluded(&name.to_string_lossy()) => {
                        FileResult::new(input, ProcessingStatus::Skipped)
                    }
                    _ => pipeline.process(input, interrupt)?,
                };
                stats.record(result.status);
                results.push(result);
            } else {
                warn!(
                    "Input file '{}' is not regular file or directory, continuing",
                    input.display()
                );
            }
        }

        info!(summary = %stats.summary(), "Processing complete");
        Ok(results)
    }
}

/// Per-run collaborators, borrowed from the processor
struct Pipeline<'a, P> {
    config: &'a RunConfig,
    provider: &'a P,
    resolver: DateResolver<'a>,
    planner: Planner<'a>,
    engine: TransferEngine,
}

impl<'a, P: MetadataProvider> Pipeline<'a, P> {
    fn new(config: &'a RunConfig, provider: &'a P) -> Self {
        Self {
            config,
            provider,
            resolver: DateResolver::from_config(config),
            planner: Planner::new(config),
            engine: TransferEngine::from_config(config),
        }
    }

    fn ensure_output_root(&self) -> Result<()> {
        let output = &self.config.output_dir;
        if output.is_dir() {
            info!(
                "Output directory already exist: {}. Using existing directory.",
                output.display()
            );
            return Ok(());
        }

        self.planner.ensure_directory(output)?;
        info!("Output directory was created: {}", output.display());
        Ok(())
    }

    /// Process one file. Only fatal errors and interruption leave as `Err`.
    fn process(&mut self, path: &Path, interrupt: Option<&AtomicBool>) -> Result<FileResult> {
        let _span = span!(Level::DEBUG, "process_file", ?path).entered();

        if is_sidecar(path) {
            debug!("Sidecar file, handled with its primary");
            return Ok(FileResult::new(path, ProcessingStatus::Skipped));
        }

        let metadata = self.provider.read(path);
        check_interrupt(interrupt)?;

        let date = if is_non_media(&metadata) {
            info!(?path, "Not a photo or video, using default directory");
            ResolvedDate::unknown()
        } else {
            self.resolver.resolve(&metadata, Some(path))
        };

        let plan = self.planner.plan(path, &date);
        self.planner.ensure_directory(&plan.target_directory)?;

        let mut result = FileResult::new(path, ProcessingStatus::Failed);
        result.date = Some(date);

        match self.engine.transfer(&plan) {
            Ok(TransferOutcome::Transferred { target, sidecars }) => {
                result.status = if self.config.dry_run {
                    ProcessingStatus::DryRun
                } else {
                    ProcessingStatus::Success
                };
                result.destination = Some(target);
                result.sidecars = sidecars;
            }
            Ok(TransferOutcome::Duplicate { existing }) => {
                result.status = ProcessingStatus::Duplicate;
                result.destination = Some(existing);
            }
            Ok(TransferOutcome::SourceMissing) => {
                result.status = ProcessingStatus::Skipped;
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(?path, error = %e, "Failed to process file");
                result.error = Some(e.to_string());
            }
        }

        Ok(result)
    }
}

/// At least one input must exist; missing ones are only warned about
fn check_inputs(inputs: &[PathBuf]) -> Result<()> {
    debug!("Checking input files and directories");
    if inputs.is_empty() {
        return Err(Error::NoInput);
    }

    let mut any_valid = false;
    for input in inputs {
        if input.exists() {
            any_valid = true;
        } else {
            warn!(
                "Input file/directory does not exist or cannot be accessed: {}, continuing",
                input.display()
            );
        }
    }

    if any_valid {
        Ok(())
    } else {
        Err(Error::NoValidInput)
    }
}

fn check_interrupt(flag: Option<&AtomicBool>) -> Result<()> {
    match flag {
        Some(flag) if flag.load(Ordering::SeqCst) => Err(Error::Interrupted),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::metadata::MetadataRecord;
    use serde_json::json;
    use std::collections::HashMap;
    use std::fs;
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
        Fixture {
            _dir: dir,
            input,
            output,
        }
    }

    fn run_config(output: &Path, tweak: impl FnOnce(&mut Config)) -> RunConfig {
        let mut config = Config {
            output_dir: output.to_path_buf(),
            ..Config::default()
        };
        tweak(&mut config);
        config.validate().unwrap()
    }

    /// Fake exiftool answering from a file name to record table
    fn fake_exiftool(
        table: &[(&str, serde_json::Value)],
    ) -> impl Fn(&Path) -> MetadataRecord + use<> {
        let table: HashMap<String, MetadataRecord> = table
            .iter()
            .map(|(name, value)| match value {
                serde_json::Value::Object(map) => (name.to_string(), map.clone()),
                _ => panic!("expected an object"),
            })
            .collect();
        move |path: &Path| {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            table.get(&name).cloned().unwrap_or_default()
        }
    }

    fn no_metadata() -> impl Fn(&Path) -> MetadataRecord {
        |_: &Path| MetadataRecord::new()
    }

    fn dated() -> serde_json::Value {
        json!({"MIMEType": "image/jpeg", "CreateDate": "2017:01:01 01:01:01"})
    }

    #[test]
    fn test_sorts_into_date_directories() {
        let fx = fixture();
        fs::write(fx.input.join("photo.jpg"), b"photo").unwrap();
        fs::write(fx.input.join("Foo.jpg"), b"foo").unwrap();

        let config = run_config(&fx.output, |_| {});
        let mut processor = Processor::new(config, fake_exiftool(&[("photo.jpg", dated())]));
        let results = processor.run(&[fx.input.clone()]).unwrap();

        assert_eq!(results.len(), 2);
        assert!(fx.output.join("2017/01/01/20170101-010101.jpg").is_file());
        assert!(fx.output.join("unknown/Foo.jpg").is_file());
        assert!(fx.input.join("photo.jpg").exists());
        assert_eq!(processor.stats().processed, 2);
    }

    #[test]
    fn test_filename_date_and_modtime_fallback() {
        let fx = fixture();
        fs::write(fx.input.join("IMG_20170101_010101.jpg"), b"a").unwrap();
        fs::write(fx.input.join("Foo.jpg"), b"b").unwrap();

        let config = run_config(&fx.output, |c| c.timestamp_fallback = true);
        let mut processor = Processor::new(config, no_metadata());
        let results = processor.run(&[fx.input.clone()]).unwrap();

        assert!(fx.output.join("2017/01/01/20170101-010101.jpg").is_file());
        assert!(results.iter().all(|r| r.status == ProcessingStatus::Success));
        assert!(!fx.output.join("unknown").exists());
    }

    #[test]
    fn test_non_media_goes_to_default_bucket() {
        let fx = fixture();
        fs::write(fx.input.join("notes.txt"), b"text").unwrap();

        let config = run_config(&fx.output, |c| c.timestamp_fallback = true);
        let provider = fake_exiftool(&[(
            "notes.txt",
            json!({"MIMEType": "text/plain", "CreateDate": "2017:01:01 01:01:01"}),
        )]);
        Processor::new(config, provider).run(&[fx.input.clone()]).unwrap();

        assert!(fx.output.join("unknown/notes.txt").is_file());
    }

    #[test]
    fn test_dry_run_creates_nothing() {
        let fx = fixture();
        fs::write(fx.input.join("photo.jpg"), b"photo").unwrap();

        let config = run_config(&fx.output, |c| {
            c.dry_run = true;
            c.move_files = true;
        });
        let mut processor = Processor::new(config, fake_exiftool(&[("photo.jpg", dated())]));
        let results = processor.run(&[fx.input.clone()]).unwrap();

        assert_eq!(results[0].status, ProcessingStatus::DryRun);
        assert_eq!(
            results[0].destination.as_deref(),
            Some(fx.output.join("2017/01/01/20170101-010101.jpg").as_path())
        );
        assert!(!fx.output.exists());
        assert!(fx.input.join("photo.jpg").exists());
    }

    #[test]
    fn test_duplicates_and_suffixes() {
        let fx = fixture();
        fs::create_dir_all(fx.input.join("a")).unwrap();
        fs::create_dir_all(fx.input.join("b")).unwrap();
        fs::create_dir_all(fx.input.join("c")).unwrap();
        fs::write(fx.input.join("a/one.jpg"), b"same").unwrap();
        fs::write(fx.input.join("b/two.jpg"), b"same").unwrap();
        fs::write(fx.input.join("c/three.jpg"), b"different").unwrap();

        let config = run_config(&fx.output, |_| {});
        let provider = fake_exiftool(&[
            ("one.jpg", dated()),
            ("two.jpg", dated()),
            ("three.jpg", dated()),
        ]);
        let mut processor = Processor::new(config, provider);
        let results = processor.run(&[fx.input.clone()]).unwrap();

        let statuses: Vec<_> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                ProcessingStatus::Success,
                ProcessingStatus::Duplicate,
                ProcessingStatus::Success
            ]
        );
        let day = fx.output.join("2017/01/01");
        assert_eq!(fs::read(day.join("20170101-010101.jpg")).unwrap(), b"same");
        assert_eq!(fs::read(day.join("20170101-010101-2.jpg")).unwrap(), b"different");
        assert_eq!(processor.stats().duplicates, 1);
    }

    #[test]
    fn test_dry_run_matches_live_decisions() {
        fn sort(dry_run: bool) -> Vec<(ProcessingStatus, PathBuf)> {
            let fx = fixture();
            for (dir, name, content) in [
                ("a", "one.jpg", "same"),
                ("b", "two.jpg", "same"),
                ("c", "three.jpg", "diff"),
            ] {
                fs::create_dir_all(fx.input.join(dir)).unwrap();
                fs::write(fx.input.join(dir).join(name), content).unwrap();
            }

            let config = run_config(&fx.output, |c| c.dry_run = dry_run);
            let provider = fake_exiftool(&[
                ("one.jpg", dated()),
                ("two.jpg", dated()),
                ("three.jpg", dated()),
            ]);
            Processor::new(config, provider)
                .run(&[fx.input.clone()])
                .unwrap()
                .into_iter()
                .map(|r| {
                    let destination = r.destination.unwrap();
                    let relative = destination.strip_prefix(&fx.output).unwrap().to_path_buf();
                    (r.status, relative)
                })
                .collect()
        }

        let day = Path::new("2017").join("01").join("01");
        let live = sort(false);
        assert_eq!(
            live,
            vec![
                (ProcessingStatus::Success, day.join("20170101-010101.jpg")),
                (ProcessingStatus::Duplicate, day.join("20170101-010101.jpg")),
                (ProcessingStatus::Success, day.join("20170101-010101-2.jpg")),
            ]
        );

        let expected: Vec<_> = live
            .into_iter()
            .map(|(status, path)| match status {
                ProcessingStatus::Success => (ProcessingStatus::DryRun, path),
                other => (other, path),
            })
            .collect();
        assert_eq!(sort(true), expected);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let fx = fixture();
        fs::write(fx.input.join("photo.jpg"), b"photo").unwrap();

        let config = run_config(&fx.output, |_| {});
        let mut processor = Processor::new(config, fake_exiftool(&[("photo.jpg", dated())]));
        processor.run(&[fx.input.clone()]).unwrap();
        let results = processor.run(&[fx.input.clone()]).unwrap();

        assert_eq!(results[0].status, ProcessingStatus::Duplicate);
        assert_eq!(fs::read_dir(fx.output.join("2017/01/01")).unwrap().count(), 1);
    }

    #[test]
    fn test_exclusions_and_sidecars() {
        let fx = fixture();
        fs::write(fx.input.join("photo.jpg"), b"photo").unwrap();
        fs::write(fx.input.join("photo.xmp"), b"<xmp/>").unwrap();
        fs::write(fx.input.join(".DS_Store"), b"junk").unwrap();

        let config = run_config(&fx.output, |_| {});
        let mut processor = Processor::new(config, fake_exiftool(&[("photo.jpg", dated())]));
        let results = processor.run(&[fx.input.clone()]).unwrap();

        let day = fx.output.join("2017/01/01");
        assert!(day.join("20170101-010101.jpg").is_file());
        assert_eq!(fs::read(day.join("20170101-010101.xmp")).unwrap(), b"<xmp/>");
        assert!(!fx.output.join("unknown").exists());

        let photo = results.iter().find(|r| r.source.ends_with("photo.jpg")).unwrap();
        assert_eq!(photo.sidecars, vec![day.join("20170101-010101.xmp")]);
        let sidecar = results.iter().find(|r| r.source.ends_with("photo.xmp")).unwrap();
        assert_eq!(sidecar.status, ProcessingStatus::Skipped);
    }

    #[test]
    fn test_direct_file_input() {
        let fx = fixture();
        let photo = fx.input.join("photo.jpg");
        fs::write(&photo, b"photo").unwrap();

        let config = run_config(&fx.output, |c| c.original_names = true);
        let mut processor = Processor::new(config, fake_exiftool(&[("photo.jpg", dated())]));
        processor.run(&[photo]).unwrap();

        assert!(fx.output.join("2017/01/01/photo.jpg").is_file());
    }

    #[test]
    fn test_move_mode() {
        let fx = fixture();
        fs::write(fx.input.join("photo.jpg"), b"photo").unwrap();

        let config = run_config(&fx.output, |c| c.move_files = true);
        Processor::new(config, fake_exiftool(&[("photo.jpg", dated())]))
            .run(&[fx.input.clone()])
            .unwrap();

        assert!(!fx.input.join("photo.jpg").exists());
        assert!(fx.output.join("2017/01/01/20170101-010101.jpg").is_file());
    }

    #[test]
    fn test_input_checks() {
        let fx = fixture();
        let config = run_config(&fx.output, |_| {});
        let mut processor = Processor::new(config, no_metadata());

        assert!(matches!(processor.run(&[]), Err(Error::NoInput)));
        assert!(matches!(
            processor.run(&[fx.input.join("missing")]),
            Err(Error::NoValidInput)
        ));
        assert!(!fx.output.exists());

        // one valid input is enough
        let results = processor
            .run(&[fx.input.join("missing"), fx.input.clone()])
            .unwrap();
        assert!(results.is_empty());
        assert!(fx.output.is_dir());
    }

    #[test]
    fn test_unwritable_target_is_fatal() {
        let fx = fixture();
        fs::write(fx.input.join("photo.jpg"), b"photo").unwrap();
        fs::create_dir_all(&fx.output).unwrap();
        // a file where the year directory should go
        fs::write(fx.output.join("2017"), b"in the way").unwrap();

        let config = run_config(&fx.output, |_| {});
        let mut processor = Processor::new(config, fake_exiftool(&[("photo.jpg", dated())]));
        let result = processor.run(&[fx.input.clone()]);

        assert!(matches!(result, Err(Error::CreateDirectory { .. })));
    }

    #[test]
    fn test_blocked_default_bucket_is_fatal() {
        let fx = fixture();
        fs::write(fx.input.join("Foo.jpg"), b"foo").unwrap();
        fs::create_dir_all(&fx.output).unwrap();
        fs::write(fx.output.join("unknown"), b"not a directory").unwrap();

        let config = run_config(&fx.output, |_| {});
        let mut processor = Processor::new(config, no_metadata());
        let result = processor.run(&[fx.input.clone()]);

        assert!(matches!(result, Err(Error::CreateDirectory { .. })));
        assert_eq!(fs::read(fx.output.join("unknown")).unwrap(), b"not a directory");
    }

    #[test]
    fn test_interrupt_stops_run() {
        static RAISED: AtomicBool = AtomicBool::new(true);

        let fx = fixture();
        fs::write(fx.input.join("photo.jpg"), b"photo").unwrap();

        let config = run_config(&fx.output, |_| {});
        let mut processor = Processor::new(config, no_metadata()).with_interrupt(&RAISED);
        let result = processor.run(&[fx.input.clone()]);

        assert!(matches!(result, Err(Error::Interrupted)));
        assert!(!fx.output.join("unknown").exists());
    }

    #[test]
    fn test_stats_summary() {
        let mut stats = ProcessingStats::new();
        stats.record(ProcessingStatus::Success);
        stats.record(ProcessingStatus::Duplicate);
        stats.record(ProcessingStatus::Failed);
        assert_eq!(
            stats.summary(),
            "Total: 3, Processed: 1, Skipped: 0, Duplicates: 1, Failed: 1"
        );
    }
}
