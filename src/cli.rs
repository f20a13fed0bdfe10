// src/cli.rs

use crate::config::{self, ComparisonConfig, Overrides};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorRange {
    Tv,
    Pc,
    Mpeg,
    Jpeg,
}

impl ColorRange {
    pub fn as_str(self) -> &'static str {
        match self {
            ColorRange::Tv => "tv",
            ColorRange::Pc => "pc",
            ColorRange::Mpeg => "mpeg",
            ColorRange::Jpeg => "jpeg",
        }
    }
}

/// Compare one or more videos against a reference using VMAF.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the FFmpeg binary to use (must be built with libvmaf)
    #[arg(long, value_name = "PATH")]
    pub ffmpeg: PathBuf,

    /// Path to the FFprobe binary to use
    #[arg(long, value_name = "PATH")]
    pub ffprobe: PathBuf,

    /// Path to a standalone VMAF binary (not supported yet)
    #[arg(long, value_name = "PATH")]
    pub vmaf: Option<PathBuf>,

    /// Reference file
    #[arg(short, long, value_name = "FILE")]
    pub reference: PathBuf,

    /// Log file name; ${path}, ${file} and ${ext} expand to the distorted file's
    /// directory, name without extension and extension
    #[arg(short, long, value_name = "TEMPLATE", default_value = config::DEFAULT_OUTPUT_TEMPLATE)]
    pub output: String,

    /// Scale, convert and resample to the distorted file instead of the reference
    #[arg(long)]
    pub flip: bool,

    /// Color space to compare in
    #[arg(long, value_name = "SPACE")]
    pub color_space: Option<String>,

    /// Color primaries to compare in
    #[arg(long, value_name = "PRIMARIES")]
    pub color_primaries: Option<String>,

    /// Color transfer characteristics to compare in
    #[arg(long, value_name = "TRC")]
    pub color_trc: Option<String>,

    /// Color range to compare in
    #[arg(long, value_enum)]
    pub color_range: Option<ColorRange>,

    /// Pixel format to compare in
    #[arg(short = 'p', long, value_name = "PIX_FMT")]
    pub format: Option<String>,

    /// Width to compare at (height follows the aspect ratio unless given)
    #[arg(short, long)]
    pub width: Option<u32>,

    /// Height to compare at (width follows the aspect ratio unless given)
    #[arg(short = 'H', long)]
    pub height: Option<u32>,

    /// Frame rate to compare at, e.g. 24000/1001
    #[arg(long, value_name = "RATE")]
    pub fps: Option<String>,

    /// Enable (and configure) a libvmaf feature, may be repeated
    #[arg(short, long = "feature", value_name = "FEATURE")]
    pub features: Vec<String>,

    /// Enable (and configure) a libvmaf model, may be repeated [default: version=vmaf_v0.6.1]
    #[arg(short, long = "model", value_name = "MODEL")]
    pub models: Vec<String>,

    /// Number of threads to use
    #[arg(short, long, default_value_t = config::default_threads())]
    pub threads: usize,

    /// Only print warnings and errors, do not relay FFmpeg output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print debug output, including every command that is run
    #[arg(short, long)]
    pub verbose: bool,

    /// Do not print the license banner
    #[arg(long)]
    pub hide_banner: bool,

    /// Enable logging to file (e.g., vmafcmp_YYYYMMDD_HHMMSS.log)
    #[arg(long)]
    pub log: bool,

    /// Directory for the log file (default: current directory)
    #[arg(long, value_name = "DIR", requires = "log")]
    pub log_dir: Option<PathBuf>,

    /// One or more distorted files, or directories containing distorted files
    #[arg(required = true, value_name = "PATH")]
    pub distorted: Vec<PathBuf>,
}

impl CliArgs {
    pub fn into_config(self) -> ComparisonConfig {
        ComparisonConfig {
            ffmpeg: self.ffmpeg,
            ffprobe: self.ffprobe,
            vmaf: self.vmaf,
            reference: self.reference,
            candidates: self.distorted,
            output_template: self.output,
            flip: self.flip,
            overrides: Overrides {
                frame_rate: self.fps,
                color_space: self.color_space,
                color_primaries: self.color_primaries,
                color_transfer: self.color_trc,
                color_range: self.color_range.map(|r| r.as_str().to_string()),
                pixel_format: self.format,
                width: self.width,
                height: self.height,
            },
            features: self.features,
            models: if self.models.is_empty() {
                vec![config::DEFAULT_MODEL.to_string()]
            } else {
                self.models
            },
            threads: self.threads,
            quiet: self.quiet,
        }
    }
}

pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

const LICENSE_NOTICE: &str = "\
Copyright 2022 Michael Fabian 'Xaymar' Dirks <info@xaymar.com>

Redistribution and use in source and binary forms, with or without modification, are permitted provided that the following conditions are met:
1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following disclaimer.
2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the following disclaimer in the documentation and/or other materials provided with the distribution.
3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote products derived from this software without specific prior written permission.

THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS \"AS IS\" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.
";

/// The BSD-3-Clause notice shown at startup, headed by name and version.
pub fn banner() -> String {
    format!(
        "{} {}\n\n{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        LICENSE_NOTICE
    )
}

pub fn print_banner() {
    println!("{}", banner());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(
            ["vmafcmp", "--ffmpeg", "ffmpeg", "--ffprobe", "ffprobe", "-r", "ref.mkv"]
                .iter()
                .chain(args),
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["enc/"]).into_config();
        assert_eq!(config.reference, PathBuf::from("ref.mkv"));
        assert_eq!(config.candidates, vec![PathBuf::from("enc/")]);
        assert_eq!(config.output_template, "${path}/${file}${ext}.json");
        assert_eq!(config.models, vec!["version=vmaf_v0.6.1".to_string()]);
        assert!(config.features.is_empty());
        assert_eq!(config.overrides, Overrides::default());
        assert!(config.threads >= 1);
        assert!(!config.flip);
    }

    #[test]
    fn test_overrides_and_repeated_options() {
        let config = parse(&[
            "--flip",
            "--color-range", "pc",
            "--color-trc", "smpte2084",
            "-p", "yuv420p10le",
            "-w", "1920",
            "--fps", "24000/1001",
            "-m", "version=vmaf_4k_v0.6.1",
            "-f", "name=psnr",
            "-f", "name=psnr",
            "-t", "3",
            "a.mkv", "b.mkv",
        ])
        .into_config();
        assert!(config.flip);
        assert_eq!(config.overrides.color_range.as_deref(), Some("pc"));
        assert_eq!(config.overrides.color_transfer.as_deref(), Some("smpte2084"));
        assert_eq!(config.overrides.pixel_format.as_deref(), Some("yuv420p10le"));
        assert_eq!(config.overrides.width, Some(1920));
        assert_eq!(config.overrides.height, None);
        assert_eq!(config.overrides.frame_rate.as_deref(), Some("24000/1001"));
        assert_eq!(config.models, vec!["version=vmaf_4k_v0.6.1".to_string()]);
        assert_eq!(config.features, vec!["name=psnr".to_string(), "name=psnr".to_string()]);
        assert_eq!(config.threads, 3);
        assert_eq!(config.candidates.len(), 2);
    }

    #[test]
    fn test_color_range_is_restricted() {
        let result = CliArgs::try_parse_from([
            "vmafcmp", "--ffmpeg", "ffmpeg", "--ffprobe", "ffprobe", "-r", "ref.mkv",
            "--color-range", "full", "a.mkv",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_banner_carries_license_notice() {
        let text = banner();
        assert!(text.starts_with(&format!("vmafcmp {}", env!("CARGO_PKG_VERSION"))));
        assert!(text.contains("Copyright 2022"));
        assert!(text.contains("Redistribution and use in source and binary forms"));
        assert!(text.contains("\"AS IS\""));
        assert!(text.contains("EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE."));
    }

    #[test]
    fn test_distorted_path_required() {
        let result = CliArgs::try_parse_from([
            "vmafcmp", "--ffmpeg", "ffmpeg", "--ffprobe", "ffprobe", "-r", "ref.mkv",
        ]);
        assert!(result.is_err());
    }
}
