// src/compare.rs

use crate::config::ComparisonConfig;
use crate::error::{Result, VmafCmpError};
use crate::ffmpeg;
use crate::ffprobe::{self, MediaDescription};
use crate::planner;
use log::{debug, error, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of a whole run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Candidates that were scored, with the log file written for each.
    pub compared: Vec<(PathBuf, PathBuf)>,
    /// Candidates that could not be scored, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Compares candidates against one reference, one FFmpeg process at a time.
pub struct Comparator<'a> {
    config: &'a ComparisonConfig,
    reference: MediaDescription,
}

impl<'a> Comparator<'a> {
    /// Validates the configuration and probes the reference file. Any failure
    /// here aborts the run.
    pub fn new(config: &'a ComparisonConfig) -> Result<Self> {
        config.validate()?;

        info!("Loading reference file '{}'...", config.reference.display());
        let reference = ffprobe::probe(&config.ffprobe, &config.reference)?;
        if reference.primary_video().is_none() {
            return Err(VmafCmpError::probe(
                &config.reference,
                "reference file contains no video tracks",
            ));
        }
        Ok(Comparator { config, reference })
    }

    pub fn reference(&self) -> &MediaDescription {
        &self.reference
    }

    /// Compares every candidate in order. A failing candidate is logged and
    /// skipped; it never stops the run.
    pub fn run(&self, candidates: &[PathBuf]) -> RunSummary {
        let mut summary = RunSummary::default();
        for (i, candidate) in candidates.iter().enumerate() {
            info!("[{}/{}] '{}' Comparing...", i + 1, candidates.len(), candidate.display());
            match self.compare(candidate) {
                Ok(log_path) => {
                    info!("'{}' Done, log written to {}", candidate.display(), log_path.display());
                    summary.compared.push((candidate.clone(), log_path));
                }
                Err(e) => {
                    error!("'{}' {}", candidate.display(), e);
                    summary.failed.push((candidate.clone(), e.to_string()));
                }
            }
        }
        summary
    }

    /// Scores a single candidate and returns the path of its log file.
    pub fn compare(&self, candidate: &Path) -> Result<PathBuf> {
        let description = ffprobe::probe(&self.config.ffprobe, candidate)?;
        if description.primary_video().is_none() {
            return Err(VmafCmpError::probe(candidate, "missing video track"));
        }

        let plan = planner::plan(&self.reference, &description, self.config)?;
        let log_path = PathBuf::from(&plan.metric.log_path);
        if let Some(dir) = log_path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                info!("Creating output directory: {}", dir.display());
                fs::create_dir_all(dir)?;
            }
        }

        let args = ffmpeg::build_args(
            &self.config.reference,
            candidate,
            &plan.filter_complex(),
            self.config.threads,
        );
        let output = ffmpeg::run_ffmpeg(&self.config.ffmpeg, &args, !self.config.quiet, candidate)?;
        debug!(
            "'{}' {} ({} bytes stdout, {} bytes stderr)",
            candidate.display(),
            output.status,
            output.stdout.len(),
            output.stderr.len()
        );
        Ok(log_path)
    }
}
