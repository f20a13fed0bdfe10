// src/config.rs

use crate::error::{Result, VmafCmpError};
use std::path::PathBuf;

/// Log file next to the candidate, named after it: `clip.mp4` -> `clip.mp4.json`.
pub const DEFAULT_OUTPUT_TEMPLATE: &str = "${path}/${file}${ext}.json";

/// libvmaf model used when none is given.
pub const DEFAULT_MODEL: &str = "version=vmaf_v0.6.1";

/// Explicit format overrides. A set field forces the corresponding conversion
/// stage on both inputs, whatever was probed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub frame_rate: Option<String>,
    pub color_space: Option<String>,
    pub color_primaries: Option<String>,
    pub color_transfer: Option<String>,
    pub color_range: Option<String>,
    pub pixel_format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Overrides {
    pub fn has_color(&self) -> bool {
        self.color_space.is_some()
            || self.color_primaries.is_some()
            || self.color_transfer.is_some()
            || self.color_range.is_some()
    }

    pub fn has_size(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }
}

/// Run-wide settings. Built once from the command line and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    /// Standalone vmaf binary; not supported yet.
    pub vmaf: Option<PathBuf>,
    pub reference: PathBuf,
    pub candidates: Vec<PathBuf>,
    pub output_template: String,
    /// Convert towards the candidate instead of the reference.
    pub flip: bool,
    pub overrides: Overrides,
    pub features: Vec<String>,
    pub models: Vec<String>,
    pub threads: usize,
    pub quiet: bool,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        ComparisonConfig {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            vmaf: None,
            reference: PathBuf::new(),
            candidates: Vec::new(),
            output_template: DEFAULT_OUTPUT_TEMPLATE.to_string(),
            flip: false,
            overrides: Overrides::default(),
            features: Vec::new(),
            models: vec![DEFAULT_MODEL.to_string()],
            threads: default_threads(),
            quiet: false,
        }
    }
}

impl ComparisonConfig {
    /// Rejects settings that cannot be run. Called before anything is probed.
    pub fn validate(&self) -> Result<()> {
        if let Some(vmaf) = &self.vmaf {
            return Err(VmafCmpError::UnsupportedConfiguration(format!(
                "standalone VMAF binary mode ({}) is not supported, omit --vmaf to use FFmpeg's libvmaf filter",
                vmaf.display()
            )));
        }
        if self.threads == 0 {
            return Err(VmafCmpError::Input("thread count must be at least 1".to_string()));
        }
        if self.output_template.trim().is_empty() {
            return Err(VmafCmpError::Input("output template must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Two thirds of the logical CPUs, rounded, at least one.
pub fn default_threads() -> usize {
    threads_for_cpus(num_cpus::get())
}

fn threads_for_cpus(cpus: usize) -> usize {
    ((cpus as f64 / 3.0 * 2.0).round() as usize).max(1)
}
