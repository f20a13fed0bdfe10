// src/ffprobe.rs

use crate::error::{Result, VmafCmpError};
use log::{debug, info};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// A probed frame rate, as reported in `r_frame_rate` (or given as a decimal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameRate {
    /// Reduced rational, e.g. 30000/1001.
    Ratio { num: u64, den: u64 },
    Decimal(String),
}

impl FrameRate {
    /// Parses "num/den" or a plain decimal. Returns `None` for unknown rates
    /// such as "0/0" and for anything unparsable.
    pub fn parse(fps_str: &str) -> Option<FrameRate> {
        let fps_str = fps_str.trim();
        if let Some((num, den)) = fps_str.split_once('/') {
            let num = num.trim().parse::<u64>().ok()?;
            let den = den.trim().parse::<u64>().ok()?;
            if num == 0 || den == 0 {
                return None;
            }
            let divisor = gcd(num, den);
            Some(FrameRate::Ratio {
                num: num / divisor,
                den: den / divisor,
            })
        } else {
            let value = fps_str.parse::<f64>().ok()?;
            if value > 0.0 && value.is_finite() {
                Some(FrameRate::Decimal(fps_str.to_string()))
            } else {
                None
            }
        }
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameRate::Ratio { num, den } => write!(f, "{}/{}", num, den),
            FrameRate::Decimal(value) => f.write_str(value),
        }
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoStreamInfo {
    /// Position among the file's video streams.
    pub index: usize,
    pub codec_name: Option<String>,
    /// Already normalized, see [`normalize_pixel_format`].
    pub pixel_format: Option<String>,
    pub frame_rate: Option<FrameRate>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub color_space: Option<String>,
    pub color_primaries: Option<String>,
    pub color_transfer: Option<String>,
    pub color_range: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioStreamInfo {
    pub index: usize,
    pub codec_name: Option<String>,
    pub channels: Option<u32>,
    pub sample_rate: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtitleStreamInfo {
    pub index: usize,
    pub codec_name: Option<String>,
    pub language: Option<String>,
}

/// Data, attachment and untyped streams.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OtherStreamInfo {
    pub index: usize,
    pub codec_type: String,
    pub codec_name: Option<String>,
}

/// Everything the comparison needs to know about one media file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaDescription {
    pub path: PathBuf,
    pub video_streams: Vec<VideoStreamInfo>,
    pub audio_streams: Vec<AudioStreamInfo>,
    pub subtitle_streams: Vec<SubtitleStreamInfo>,
    pub other_streams: Vec<OtherStreamInfo>,
}

impl MediaDescription {
    /// The stream that represents this file in a comparison.
    pub fn primary_video(&self) -> Option<&VideoStreamInfo> {
        self.video_streams.first()
    }
}

// --- Raw ffprobe JSON ---

#[derive(Deserialize, Debug)]
struct RawProbe {
    #[serde(default)]
    streams: Vec<RawStream>,
}

#[derive(Deserialize, Debug, Default)]
struct RawStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    pix_fmt: Option<String>,
    r_frame_rate: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    color_space: Option<String>,
    color_primaries: Option<String>,
    color_transfer: Option<String>,
    color_range: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
    #[serde(default)]
    tags: RawTags,
}

#[derive(Deserialize, Debug, Default)]
struct RawTags {
    language: Option<String>,
}

/// Collapses the JPEG full-range pixel format aliases to the formats FFmpeg's
/// colorspace filter expects. Anything else is returned untouched.
pub fn normalize_pixel_format(format: &str) -> &str {
    match format {
        "yuvj420p" => "yuv420p",
        "yuvj422p" => "yuv422p",
        "yuvj444p" => "yuv444p",
        other => other,
    }
}

/// Runs ffprobe on `video_path` and returns its grouped stream description.
pub fn probe(ffprobe: &Path, video_path: &Path) -> Result<MediaDescription> {
    info!("Probing media file: {}", video_path.display());
    if !video_path.exists() {
        return Err(VmafCmpError::probe(video_path, "file not found"));
    }

    let mut command = Command::new(ffprobe);
    command
        .args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_format",
            "-show_streams",
            "-show_programs",
            "-show_chapters",
            "-show_private_data",
            "-bitexact",
        ])
        .arg(video_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    debug!("Running: {:?}", command);

    let output = command
        .output()
        .map_err(|e| VmafCmpError::probe(video_path, format!("could not run {}: {}", ffprobe.display(), e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("ffprobe failed for {}: {}", video_path.display(), stderr.trim());
        return Err(VmafCmpError::probe(
            video_path,
            format!("ffprobe exited with {}: {}", output.status, stderr.trim()),
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let description = parse_probe_output(video_path, &stdout)?;

    if let Some(video) = description.primary_video() {
        info!(
            "Detected Info for {}: {}x{} @ {} fps, {}, space={} primaries={} trc={} range={}",
            video_path.display(),
            display_opt(&video.width),
            display_opt(&video.height),
            display_opt(&video.frame_rate),
            display_opt(&video.pixel_format),
            display_opt(&video.color_space),
            display_opt(&video.color_primaries),
            display_opt(&video.color_transfer),
            display_opt(&video.color_range),
        );
    }
    Ok(description)
}

fn display_opt<T: fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map_or_else(|| "?".to_string(), |v| v.to_string())
}

/// Parses ffprobe's JSON document and groups its streams by type, in order.
pub fn parse_probe_output(video_path: &Path, json: &str) -> Result<MediaDescription> {
    let raw: RawProbe = serde_json::from_str(json)
        .map_err(|e| VmafCmpError::probe(video_path, format!("unparsable ffprobe output: {}", e)))?;

    let mut description = MediaDescription {
        path: video_path.to_path_buf(),
        ..Default::default()
    };

    for stream in raw.streams {
        match stream.codec_type.as_deref() {
            Some("video") => {
                let index = description.video_streams.len();
                description.video_streams.push(VideoStreamInfo {
                    index,
                    pixel_format: stream
                        .pix_fmt
                        .as_deref()
                        .map(|f| normalize_pixel_format(f).to_string()),
                    frame_rate: stream.r_frame_rate.as_deref().and_then(FrameRate::parse),
                    codec_name: stream.codec_name,
                    width: stream.width,
                    height: stream.height,
                    color_space: stream.color_space,
                    color_primaries: stream.color_primaries,
                    color_transfer: stream.color_transfer,
                    color_range: stream.color_range,
                });
            }
            Some("audio") => {
                let index = description.audio_streams.len();
                description.audio_streams.push(AudioStreamInfo {
                    index,
                    codec_name: stream.codec_name,
                    channels: stream.channels,
                    sample_rate: stream.sample_rate.and_then(|s| s.parse().ok()),
                });
            }
            Some("subtitle") => {
                let index = description.subtitle_streams.len();
                description.subtitle_streams.push(SubtitleStreamInfo {
                    index,
                    codec_name: stream.codec_name,
                    language: stream.tags.language,
                });
            }
            other => {
                let index = description.other_streams.len();
                description.other_streams.push(OtherStreamInfo {
                    index,
                    codec_type: other.unwrap_or("unknown").to_string(),
                    codec_name: stream.codec_name,
                });
            }
        }
    }

    for audio in &description.audio_streams {
        debug!(
            "audio #{}: {} {}ch {}Hz",
            audio.index,
            display_opt(&audio.codec_name),
            display_opt(&audio.channels),
            display_opt(&audio.sample_rate)
        );
    }
    for subtitle in &description.subtitle_streams {
        debug!(
            "subtitle #{}: {} [{}]",
            subtitle.index,
            display_opt(&subtitle.codec_name),
            display_opt(&subtitle.language)
        );
    }
    for other in &description.other_streams {
        debug!("{} #{}: {}", other.codec_type, other.index, display_opt(&other.codec_name));
    }
    debug!(
        "{}: {} video, {} audio, {} subtitle, {} other stream(s)",
        video_path.display(),
        description.video_streams.len(),
        description.audio_streams.len(),
        description.subtitle_streams.len(),
        description.other_streams.len()
    );
    Ok(description)
}
