//! Media Sorter - sort photos and videos into date based directories
//!
//! A CLI tool that reads capture dates through exiftool and copies, moves
//! or links media files into a `YYYY/MM/DD` tree.

use anyhow::{Context, Result};
use clap::Parser;
use media_sorter::cli::LogLevel;
use media_sorter::error::FATAL_EXIT_CODE;
use media_sorter::process::{FileResult, ProcessingStats, ProcessingStatus};
use media_sorter::{Cli, Config, Error, ExifTool, Processor, os};
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// CLI Output Module
mod cli_output {
    //! Colour and layout helpers for the run summary

    use crossterm::{
        ExecutableCommand,
        style::{Color, Print, Stylize, style},
    };
    use std::io::stdout;

    /// CLI theme colours
    pub struct CliTheme;

    impl CliTheme {
        pub const SUCCESS: Color = Color::Green;
        pub const WARNING: Color = Color::Yellow;
        pub const ERROR: Color = Color::Red;
        pub const HINT: Color = Color::DarkGrey;
        pub const ACCENT: Color = Color::Cyan;
    }

    pub fn print_separator() {
        let _ = stdout().execute(Print(&format!("{}\n", "─".repeat(60))));
    }

    pub fn print_title(title: &str) {
        let padding = 60usize.saturating_sub(title.len()) / 2;
        let _ = stdout().execute(Print(" ".repeat(padding)));
        let _ = stdout().execute(Print(title.bold()));
        let _ = stdout().execute(Print("\n"));
    }

    pub fn print_warning(msg: &str) {
        let _ = stdout().execute(Print(style("⚠ ").with(CliTheme::WARNING).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    /// Print a statistic line
    pub fn print_stat(key: &str, value: &str, color: Color) {
        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(style(key).with(CliTheme::HINT)));
        let _ = stdout().execute(Print(": "));
        let _ = stdout().execute(Print(style(value).with(color).bold()));
        let _ = stdout().execute(Print("\n"));
    }

    /// Print one processed file
    pub fn print_result(status_icon: &str, status_color: Color, source: &str, dest_or_msg: &str) {
        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(style(status_icon).with(status_color).bold()));
        let _ = stdout().execute(Print(" "));
        let _ = stdout().execute(Print(style(source).italic()));
        let _ = stdout().execute(Print(" "));
        let _ = stdout().execute(Print(style(dest_or_msg).with(CliTheme::HINT)));
        let _ = stdout().execute(Print("\n"));
    }

    pub fn print_blank() {
        let _ = stdout().execute(Print("\n"));
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.sample_config {
        print!("{}", Config::sample_config());
        return ExitCode::SUCCESS;
    }

    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(FATAL_EXIT_CODE);
        }
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if matches!(e.downcast_ref::<Error>(), Some(Error::Interrupted)) => {
            warn!("Received interrupt. Shutting down...");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "Media Sorter starting");

    let config = load_config(cli)?;
    let run_config = config.validate().context("Invalid configuration")?;

    if run_config.dry_run {
        warn!("Dry-run: no files or directories will be changed");
    }

    let exiftool = ExifTool::locate(&config.exiftool)?;

    if let Err(e) = os::install_interrupt_handler() {
        warn!(error = %e, "Could not install interrupt handler");
    }

    let mut processor = Processor::new(run_config, exiftool).with_interrupt(os::interrupt_flag());
    let outcome = processor.run(&config.input_paths);

    print_summary(
        processor.stats(),
        outcome.as_deref().unwrap_or_default(),
        cli.log,
        processor.config().dry_run,
    );

    outcome?;
    Ok(())
}

/// Load configuration from file or CLI arguments
fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(config_path) => {
            info!(config_file = %config_path.display(), "Loading configuration from file");
            let file_config = Config::load_from_file(config_path)?;
            cli.merge_with_config(file_config)
        }
        None => cli.to_config(),
    };

    Ok(config)
}

fn print_summary(stats: &ProcessingStats, results: &[FileResult], log: LogLevel, dry_run: bool) {
    use cli_output::*;

    if stats.total_files == 0 {
        return;
    }

    print_separator();
    print_title("Processing complete");
    print_separator();

    print_blank();
    print_stat("Processed", &stats.processed.to_string(), CliTheme::SUCCESS);
    print_stat("Skipped", &stats.skipped.to_string(), CliTheme::WARNING);
    print_stat("Duplicates", &stats.duplicates.to_string(), CliTheme::ACCENT);
    print_stat("Failed", &stats.failed.to_string(), CliTheme::ERROR);
    print_blank();

    let detailed = log <= LogLevel::Info || dry_run;
    for result in results {
        let source = result.source.display().to_string();
        let destination = result
            .destination
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        match result.status {
            ProcessingStatus::Failed => print_result(
                "✗",
                CliTheme::ERROR,
                &source,
                result.error.as_deref().unwrap_or("unknown error"),
            ),
            _ if !detailed => {}
            ProcessingStatus::Success => {
                print_result("✓", CliTheme::SUCCESS, &source, &format!("→ {}", destination))
            }
            ProcessingStatus::DryRun => {
                print_result("~", CliTheme::ACCENT, &source, &format!("→ {}", destination))
            }
            ProcessingStatus::Duplicate => print_result(
                "≡",
                CliTheme::ACCENT,
                &source,
                &format!("duplicate of {}", destination),
            ),
            ProcessingStatus::Skipped => print_result("⊘", CliTheme::WARNING, &source, "skipped"),
        }
    }

    if dry_run {
        print_separator();
        print_warning("Dry run: nothing was changed");
    }
}

/// Setup logging: console on stderr, plus an optional log file
fn setup_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(cli.log.level().into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr));

    let Some(log_path) = &cli.log_file else {
        subscriber.init();
        return Ok(None);
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(open_log_file(log_path)?);

    if cli.json_log {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .init();
    }

    Ok(Some(guard))
}

fn open_log_file(log_path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = log_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create log directory {}", parent.display()))?;
    }

    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Cannot open log file {}", log_path.display()))
}
