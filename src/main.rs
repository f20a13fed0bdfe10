mod cli;
mod compare;
mod config;
mod enumerate;
mod error;
mod ffmpeg;
mod ffprobe;
mod filtergraph;
mod planner;

use crate::cli::CliArgs;
use crate::compare::{Comparator, RunSummary};
use crate::error::Result;
use chrono::Local;
use log::{LevelFilter, debug, error, info};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

fn main() -> ExitCode {
    let start_time = Instant::now();
    let args = cli::parse_args();

    if !args.hide_banner && !args.quiet {
        cli::print_banner();
    }

    if let Err(e) = setup_logging(&args) {
        eprintln!("Error setting up logging: {}", e);
        return ExitCode::FAILURE;
    }
    debug!("Arguments: {:?}", args);

    match run(args) {
        Ok(summary) => {
            let duration = start_time.elapsed();
            info!(
                "Compared {} file(s), {} failed, in {:.2?}",
                summary.compared.len(),
                summary.failed.len(),
                duration
            );
            if summary.is_success() {
                ExitCode::SUCCESS
            } else {
                for (path, reason) in &summary.failed {
                    error!("Failed: {}: {}", path.display(), reason);
                }
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            let duration = start_time.elapsed();
            error!("Run aborted after {:.2?}: {}", duration, e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up logging to console and optionally to a file.
fn setup_logging(args: &CliArgs) -> std::result::Result<(), fern::InitError> {
    let level = if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };

    let base_config = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(LevelFilter::Warn)
        .level_for("vmafcmp", level);

    let console_config = fern::Dispatch::new().chain(std::io::stdout());

    let mut logger = base_config.chain(console_config);

    let mut log_path = None;
    if args.log {
        let log_filename = format!("vmafcmp_{}.log", Local::now().format("%Y%m%d_%H%M%S"));
        let path = args
            .log_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(log_filename);
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        logger = logger.chain(fern::Dispatch::new().chain(fern::log_file(&path)?));
        log_path = Some(path);
    }

    logger.apply()?;
    if let Some(path) = log_path {
        info!("Logging to file: {}", path.display());
    }
    Ok(())
}

/// Probes the reference, expands the candidates and compares each of them.
fn run(args: CliArgs) -> Result<RunSummary> {
    let config = args.into_config();
    info!("Reference: {}", config.reference.display());

    let comparator = Comparator::new(&config)?;
    let candidates = enumerate::expand_candidates(&config.candidates)?;
    info!(
        "{} candidate file(s) to compare against {}",
        candidates.len(),
        comparator.reference().path.display()
    );

    let summary = comparator.run(&candidates);
    if !config.quiet {
        for (candidate, log_path) in &summary.compared {
            println!("{} -> {}", candidate.display(), log_path.display());
        }
    }
    Ok(summary)
}
