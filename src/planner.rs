// src/planner.rs

//! Derives the filter graph that makes a candidate comparable to a reference.
//!
//! One of the two files is the *target*: its frame rate, color description and
//! resolution define what both streams are converted to. By default that is the
//! reference; with `flip` it is the candidate. Both inputs go through the same
//! [`convert_stream`] routine, which only emits the stages that are needed.

use crate::config::{ComparisonConfig, DEFAULT_MODEL, Overrides};
use crate::error::{Result, VmafCmpError};
use crate::ffprobe::{MediaDescription, VideoStreamInfo};
use crate::filtergraph::{self, Filter, FilterChain, FilterGraph};
use log::{debug, warn};
use std::path::Path;

const BASELINE_COLOR: &str = "bt709";
const BASELINE_RANGE: &str = "tv";
const BASELINE_PIXEL_FORMAT: &str = "yuv420p";

/// Scale dimension that keeps the aspect ratio of the other one.
pub const AUTO_DIMENSION: i64 = -1;

const SCALE_FLAGS: &str = "bicubic+full_chroma_inp+full_chroma_int";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorProperties {
    pub space: String,
    pub primaries: String,
    pub transfer: String,
    pub range: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorConversion {
    pub input: ColorProperties,
    pub output: ColorProperties,
    pub format: String,
}

/// One conversion step in a per-input chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Rebase presentation timestamps to zero.
    ResetTimestamps,
    FrameRate(String),
    ColorConvert(ColorConversion),
    Scale { width: i64, height: i64 },
}

impl Stage {
    pub fn to_filter(&self) -> Filter {
        match self {
            Stage::ResetTimestamps => Filter::new("setpts").arg("PTS-STARTPTS"),
            Stage::FrameRate(rate) => Filter::new("fps").arg(rate.clone()),
            Stage::ColorConvert(conv) => Filter::new("colorspace")
                .option("dither", "fsb")
                .option("ispace", &conv.input.space)
                .option("iprimaries", &conv.input.primaries)
                .option("itrc", &conv.input.transfer)
                .option("irange", &conv.input.range)
                .option("space", &conv.output.space)
                .option("primaries", &conv.output.primaries)
                .option("trc", &conv.output.transfer)
                .option("range", &conv.output.range)
                .option("format", &conv.format),
            Stage::Scale { width, height } => Filter::new("scale")
                .option("w", width)
                .option("h", height)
                .option("flags", SCALE_FLAGS)
                .option("force_original_aspect_ratio", 0),
        }
    }
}

/// Which side of the conversion a stream is on. Decides the output pad label
/// that the metric filter reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Target,
    Source,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::Target => "ref",
            Role::Source => "dst",
        }
    }
}

/// The prepared chain for one literal input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChain {
    /// Input pad, e.g. `0:v:0`.
    pub input: String,
    pub role: Role,
    pub stages: Vec<Stage>,
}

impl StreamChain {
    pub fn to_filter_chain(&self) -> FilterChain {
        self.stages
            .iter()
            .fold(FilterChain::new([self.input.as_str()]), |chain, stage| {
                chain.filter(stage.to_filter())
            })
            .output(self.role.label())
    }
}

/// The final libvmaf invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricStage {
    /// Resolved, unescaped log path.
    pub log_path: String,
    pub log_format: String,
    pub models: Vec<String>,
    pub features: Vec<String>,
    pub threads: usize,
}

impl MetricStage {
    pub fn to_filter_chain(&self) -> FilterChain {
        let mut libvmaf = Filter::new("libvmaf")
            .option("log_path", filtergraph::escape_path(&self.log_path))
            .option("log_fmt", &self.log_format);
        if let Some(models) = filtergraph::escape_option_list(&self.models) {
            libvmaf = libvmaf.option("model", models);
        }
        if let Some(features) = filtergraph::escape_option_list(&self.features) {
            libvmaf = libvmaf.option("feature", features);
        }
        libvmaf = libvmaf.option("n_threads", self.threads);

        FilterChain::new([Role::Target.label(), Role::Source.label()]).filter(libvmaf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPlan {
    /// Chain fed by the reference file (input 0).
    pub reference: StreamChain,
    /// Chain fed by the candidate file (input 1).
    pub candidate: StreamChain,
    pub metric: MetricStage,
}

impl FilterPlan {
    pub fn to_graph(&self) -> FilterGraph {
        FilterGraph::new()
            .chain(self.reference.to_filter_chain())
            .chain(self.candidate.to_filter_chain())
            .chain(self.metric.to_filter_chain())
    }

    /// The `-filter_complex` argument.
    pub fn filter_complex(&self) -> String {
        self.to_graph().to_string()
    }
}

/// Plans the comparison of `candidate` against `reference`.
///
/// Both descriptions must have at least one video stream; the orchestrator
/// checks this before planning, so a violation is reported as
/// [`VmafCmpError::PlanningAssertion`].
pub fn plan(
    reference: &MediaDescription,
    candidate: &MediaDescription,
    config: &ComparisonConfig,
) -> Result<FilterPlan> {
    let ref_video = first_video(reference)?;
    let cand_video = first_video(candidate)?;

    let (target, reference_role, candidate_role) = if config.flip {
        (cand_video, Role::Source, Role::Target)
    } else {
        (ref_video, Role::Target, Role::Source)
    };

    let reference_chain = StreamChain {
        input: "0:v:0".to_string(),
        role: reference_role,
        stages: convert_stream(ref_video, target, &config.overrides),
    };
    let candidate_chain = StreamChain {
        input: "1:v:0".to_string(),
        role: candidate_role,
        stages: convert_stream(cand_video, target, &config.overrides),
    };

    let log_path = resolve_output_path(&config.output_template, &candidate.path);
    let log_format = log_format(&log_path);
    if log_format.is_empty() {
        warn!("Output path '{}' has no extension, libvmaf cannot infer a log format", log_path);
    }
    let models = if config.models.is_empty() {
        vec![DEFAULT_MODEL.to_string()]
    } else {
        config.models.clone()
    };

    let plan = FilterPlan {
        reference: reference_chain,
        candidate: candidate_chain,
        metric: MetricStage {
            log_path,
            log_format,
            models,
            features: config.features.clone(),
            threads: config.threads,
        },
    };
    debug!("Planned filter graph: {}", plan.filter_complex());
    Ok(plan)
}

fn first_video(description: &MediaDescription) -> Result<&VideoStreamInfo> {
    description.primary_video().ok_or_else(|| {
        VmafCmpError::PlanningAssertion(format!(
            "'{}' has no video stream",
            description.path.display()
        ))
    })
}

/// Builds the stages that bring `input` to the format of `target`.
pub fn convert_stream(
    input: &VideoStreamInfo,
    target: &VideoStreamInfo,
    overrides: &Overrides,
) -> Vec<Stage> {
    let mut stages = vec![Stage::ResetTimestamps];

    if overrides.frame_rate.is_some() || input.frame_rate != target.frame_rate {
        let rate = overrides
            .frame_rate
            .clone()
            .or_else(|| target.frame_rate.as_ref().map(ToString::to_string));
        match rate {
            Some(rate) => stages.push(Stage::FrameRate(rate)),
            None => debug!("Target frame rate unknown, leaving frame rate unchanged"),
        }
    }

    if overrides.has_color()
        || input.pixel_format != target.pixel_format
        || input.color_space != target.color_space
        || input.color_primaries != target.color_primaries
        || input.color_transfer != target.color_transfer
        || input.color_range != target.color_range
    {
        stages.push(Stage::ColorConvert(ColorConversion {
            input: ColorProperties {
                space: or_baseline(None, input.color_space.as_ref(), BASELINE_COLOR),
                primaries: or_baseline(None, input.color_primaries.as_ref(), BASELINE_COLOR),
                transfer: or_baseline(None, input.color_transfer.as_ref(), BASELINE_COLOR),
                range: or_baseline(None, input.color_range.as_ref(), BASELINE_RANGE),
            },
            output: ColorProperties {
                space: or_baseline(
                    overrides.color_space.as_ref(),
                    target.color_space.as_ref(),
                    BASELINE_COLOR,
                ),
                primaries: or_baseline(
                    overrides.color_primaries.as_ref(),
                    target.color_primaries.as_ref(),
                    BASELINE_COLOR,
                ),
                transfer: or_baseline(
                    overrides.color_transfer.as_ref(),
                    target.color_transfer.as_ref(),
                    BASELINE_COLOR,
                ),
                range: or_baseline(
                    overrides.color_range.as_ref(),
                    target.color_range.as_ref(),
                    BASELINE_RANGE,
                ),
            },
            format: or_baseline(
                overrides.pixel_format.as_ref(),
                target.pixel_format.as_ref(),
                BASELINE_PIXEL_FORMAT,
            ),
        }));
    }

    if overrides.has_size() {
        stages.push(Stage::Scale {
            width: overrides.width.map_or(AUTO_DIMENSION, i64::from),
            height: overrides.height.map_or(AUTO_DIMENSION, i64::from),
        });
    } else if input.width != target.width || input.height != target.height {
        stages.push(Stage::Scale {
            width: target.width.or(input.width).map_or(AUTO_DIMENSION, i64::from),
            height: target.height.or(input.height).map_or(AUTO_DIMENSION, i64::from),
        });
    }

    stages
}

fn or_baseline(explicit: Option<&String>, probed: Option<&String>, baseline: &str) -> String {
    explicit
        .or(probed)
        .map_or_else(|| baseline.to_string(), Clone::clone)
}

/// Substitutes `${path}`, `${file}` and `${ext}` in `template` with the
/// candidate's directory, stem and dotted extension.
pub fn resolve_output_path(template: &str, candidate: &Path) -> String {
    let dir = match candidate.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_string_lossy().into_owned(),
        _ => ".".to_string(),
    };
    let file = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = candidate
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    template
        .replace("${path}", &dir)
        .replace("${file}", &file)
        .replace("${ext}", &ext)
}

/// The log format libvmaf should write, taken from the path's extension.
pub fn log_format(log_path: &str) -> String {
    Path::new(log_path)
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffprobe::FrameRate;
    use std::path::PathBuf;

    fn video(rate: &str, width: u32, height: u32) -> VideoStreamInfo {
        VideoStreamInfo {
            index: 0,
            codec_name: Some("h264".to_string()),
            pixel_format: Some("yuv420p".to_string()),
            frame_rate: FrameRate::parse(rate),
            width: Some(width),
            height: Some(height),
            color_space: Some("bt709".to_string()),
            color_primaries: Some("bt709".to_string()),
            color_transfer: Some("bt709".to_string()),
            color_range: Some("tv".to_string()),
        }
    }

    fn media(path: &str, stream: VideoStreamInfo) -> MediaDescription {
        MediaDescription {
            path: PathBuf::from(path),
            video_streams: vec![stream],
            ..Default::default()
        }
    }

    fn config() -> ComparisonConfig {
        ComparisonConfig {
            threads: 4,
            ..Default::default()
        }
    }

    fn has_frame_rate(stages: &[Stage]) -> bool {
        stages.iter().any(|s| matches!(s, Stage::FrameRate(_)))
    }

    fn color_stage(stages: &[Stage]) -> Option<&ColorConversion> {
        stages.iter().find_map(|s| match s {
            Stage::ColorConvert(c) => Some(c),
            _ => None,
        })
    }

    #[test]
    fn test_matching_inputs_only_reset_timestamps() {
        let reference = media("/ref.mkv", video("24/1", 1920, 1080));
        let candidate = media("/enc/a.mkv", video("24/1", 1920, 1080));
        let plan = plan(&reference, &candidate, &config()).unwrap();
        assert_eq!(plan.reference.stages, vec![Stage::ResetTimestamps]);
        assert_eq!(plan.candidate.stages, vec![Stage::ResetTimestamps]);
    }

    #[test]
    fn test_frame_rate_mismatch_converts_candidate_only() {
        let reference = media("/ref.mkv", video("30000/1001", 1920, 1080));
        let candidate = media("/enc/a.mkv", video("24000/1001", 1920, 1080));
        let plan = plan(&reference, &candidate, &config()).unwrap();
        assert!(!has_frame_rate(&plan.reference.stages));
        assert_eq!(
            plan.candidate.stages,
            vec![Stage::ResetTimestamps, Stage::FrameRate("30000/1001".to_string())]
        );
    }

    #[test]
    fn test_frame_rate_override_applies_to_both() {
        let reference = media("/ref.mkv", video("24/1", 1920, 1080));
        let candidate = media("/enc/a.mkv", video("24/1", 1920, 1080));
        let mut cfg = config();
        cfg.overrides.frame_rate = Some("60".to_string());
        let plan = plan(&reference, &candidate, &cfg).unwrap();
        assert_eq!(plan.reference.stages[1], Stage::FrameRate("60".to_string()));
        assert_eq!(plan.candidate.stages[1], Stage::FrameRate("60".to_string()));
    }

    #[test]
    fn test_flip_converts_reference_towards_candidate() {
        let mut ref_video = video("24/1", 1920, 1080);
        ref_video.color_range = Some("pc".to_string());
        let reference = media("/ref.mkv", ref_video);
        let candidate = media("/enc/a.mkv", video("24/1", 1920, 1080));
        let cfg = ComparisonConfig {
            flip: true,
            ..config()
        };
        let plan = plan(&reference, &candidate, &cfg).unwrap();

        assert_eq!(plan.reference.role, Role::Source);
        assert_eq!(plan.candidate.role, Role::Target);
        let conv = color_stage(&plan.reference.stages).expect("reference needs color conversion");
        assert_eq!(conv.input.range, "pc");
        assert_eq!(conv.output.range, "tv");
        assert!(color_stage(&plan.candidate.stages).is_none());
    }

    #[test]
    fn test_flip_swaps_pad_labels() {
        let reference = media("/ref.mkv", video("24/1", 1920, 1080));
        let candidate = media("/enc/a.mkv", video("24/1", 1920, 1080));
        let cfg = ComparisonConfig {
            flip: true,
            ..config()
        };
        let graph = plan(&reference, &candidate, &cfg).unwrap().filter_complex();
        assert!(graph.starts_with("[0:v:0]setpts=PTS-STARTPTS[dst];[1:v:0]setpts=PTS-STARTPTS[ref];"));
    }

    #[test]
    fn test_color_defaults_for_unknown_values() {
        let mut ref_video = video("24/1", 1920, 1080);
        ref_video.color_space = None;
        ref_video.color_primaries = None;
        ref_video.color_transfer = None;
        ref_video.color_range = None;
        ref_video.pixel_format = None;
        let mut cand_video = video("24/1", 1920, 1080);
        cand_video.color_space = Some("bt470bg".to_string());
        cand_video.color_range = None;

        let stages = convert_stream(&cand_video, &ref_video, &Overrides::default());
        let conv = color_stage(&stages).unwrap();
        assert_eq!(conv.input.space, "bt470bg");
        assert_eq!(conv.input.range, "tv");
        assert_eq!(conv.output.space, "bt709");
        assert_eq!(conv.output.primaries, "bt709");
        assert_eq!(conv.output.transfer, "bt709");
        assert_eq!(conv.output.range, "tv");
        assert_eq!(conv.format, "yuv420p");
    }

    #[test]
    fn test_color_override_wins_over_target() {
        let target = video("24/1", 1920, 1080);
        let overrides = Overrides {
            color_primaries: Some("bt2020".to_string()),
            pixel_format: Some("yuv444p".to_string()),
            ..Default::default()
        };
        let stages = convert_stream(&target.clone(), &target, &overrides);
        let conv = color_stage(&stages).unwrap();
        assert_eq!(conv.output.primaries, "bt2020");
        assert_eq!(conv.output.space, "bt709");
        assert_eq!(conv.format, "yuv444p");
    }

    #[test]
    fn test_pixel_format_override_alone_does_not_force_color_stage() {
        let target = video("24/1", 1920, 1080);
        let overrides = Overrides {
            pixel_format: Some("yuv444p".to_string()),
            ..Default::default()
        };
        assert_eq!(
            convert_stream(&target.clone(), &target, &overrides),
            vec![Stage::ResetTimestamps]
        );
    }

    #[test]
    fn test_width_override_derives_height() {
        for (own, target) in [
            (video("24/1", 1920, 1080), video("24/1", 1920, 1080)),
            (video("24/1", 1280, 720), video("24/1", 1920, 1080)),
        ] {
            let overrides = Overrides {
                width: Some(960),
                ..Default::default()
            };
            let stages = convert_stream(&own, &target, &overrides);
            assert_eq!(stages.last(), Some(&Stage::Scale { width: 960, height: AUTO_DIMENSION }));
        }
    }

    #[test]
    fn test_height_override_derives_width() {
        for (own, target) in [
            (video("24/1", 1920, 1080), video("24/1", 1920, 1080)),
            (video("24/1", 3840, 2160), video("24/1", 1920, 1080)),
        ] {
            let overrides = Overrides {
                height: Some(540),
                ..Default::default()
            };
            let stages = convert_stream(&own, &target, &overrides);
            assert_eq!(stages.last(), Some(&Stage::Scale { width: AUTO_DIMENSION, height: 540 }));
        }
    }

    #[test]
    fn test_resolution_mismatch_scales_to_target() {
        let target = video("24/1", 1920, 1080);
        let own = video("24/1", 1280, 720);
        let stages = convert_stream(&own, &target, &Overrides::default());
        assert_eq!(stages, vec![Stage::ResetTimestamps, Stage::Scale { width: 1920, height: 1080 }]);
    }

    #[test]
    fn test_unknown_target_dimension_falls_back_to_own() {
        let mut target = video("24/1", 1920, 1080);
        target.height = None;
        let own = video("24/1", 1280, 720);
        let stages = convert_stream(&own, &target, &Overrides::default());
        assert_eq!(stages.last(), Some(&Stage::Scale { width: 1920, height: 720 }));
    }

    #[test]
    fn test_plan_is_pure() {
        let reference = media("/ref.mkv", video("30000/1001", 1920, 1080));
        let mut cand_video = video("24000/1001", 1280, 720);
        cand_video.color_range = Some("pc".to_string());
        let candidate = media("/enc/a.mkv", cand_video);
        let cfg = config();
        assert_eq!(
            plan(&reference, &candidate, &cfg).unwrap(),
            plan(&reference, &candidate, &cfg).unwrap()
        );
    }

    #[test]
    fn test_missing_video_is_planning_assertion() {
        let reference = media("/ref.mkv", video("24/1", 1920, 1080));
        let candidate = MediaDescription {
            path: PathBuf::from("/enc/audio_only.m4a"),
            ..Default::default()
        };
        assert!(matches!(
            plan(&reference, &candidate, &config()),
            Err(VmafCmpError::PlanningAssertion(_))
        ));
    }

    #[test]
    fn test_resolve_output_path() {
        let log = resolve_output_path("${path}/${file}${ext}.json", Path::new("/videos/clip.mp4"));
        assert_eq!(log, "/videos/clip.mp4.json");
        assert_eq!(log_format(&log), "json");

        assert_eq!(
            resolve_output_path("/logs/${file}.xml", Path::new("/videos/clip.mp4")),
            "/logs/clip.xml"
        );
        assert_eq!(
            resolve_output_path("${path}/${file}${ext}.csv", Path::new("clip")),
            "./clip.csv"
        );
    }

    #[test]
    fn test_metric_stage_defaults_and_order() {
        let reference = media("/ref.mkv", video("24/1", 1920, 1080));
        let candidate = media("/videos/clip.mp4", video("24/1", 1920, 1080));

        let mut cfg = config();
        cfg.models.clear();
        let metric = plan(&reference, &candidate, &cfg).unwrap().metric;
        assert_eq!(metric.models, vec![DEFAULT_MODEL.to_string()]);
        assert_eq!(metric.log_path, "/videos/clip.mp4.json");
        assert_eq!(metric.log_format, "json");
        assert_eq!(metric.threads, 4);

        cfg.models = vec!["version=vmaf_4k_v0.6.1".to_string(), "version=vmaf_v0.6.1neg".to_string()];
        cfg.features = vec!["name=psnr".to_string(), "name=psnr".to_string()];
        let metric = plan(&reference, &candidate, &cfg).unwrap().metric;
        assert_eq!(metric.models, cfg.models);
        assert_eq!(metric.features, cfg.features);
    }

    #[test]
    fn test_full_filter_complex() {
        let reference = media("/ref.mkv", video("24/1", 1920, 1080));
        let candidate = media("/videos/clip.mp4", video("24/1", 1280, 720));
        let mut cfg = config();
        cfg.features = vec!["name=float_ssim:enable_db=true".to_string()];
        let graph = plan(&reference, &candidate, &cfg).unwrap().filter_complex();
        assert_eq!(
            graph,
            "[0:v:0]setpts=PTS-STARTPTS[ref];\
             [1:v:0]setpts=PTS-STARTPTS,scale=w=1920:h=1080:flags=bicubic+full_chroma_inp+full_chroma_int:force_original_aspect_ratio=0[dst];\
             [ref][dst]libvmaf=log_path=/videos/clip.mp4.json:log_fmt=json:model=version=vmaf_v0.6.1:feature=name=float_ssim\\\\:enable_db=true:n_threads=4"
        );
    }

    #[test]
    fn test_color_stage_serialization() {
        let target = video("24/1", 1920, 1080);
        let mut own = video("24/1", 1920, 1080);
        own.color_range = Some("pc".to_string());
        let stages = convert_stream(&own, &target, &Overrides::default());
        assert_eq!(
            stages[1].to_filter().to_string(),
            "colorspace=dither=fsb:ispace=bt709:iprimaries=bt709:itrc=bt709:irange=pc\
             :space=bt709:primaries=bt709:trc=bt709:range=tv:format=yuv420p"
        );
    }
}
