use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// File suffixes considered video files by the scanner (without the dot).
pub const VIDEO_SUFFIXES: &[&str] = &[
    "mkv", "mp4", "avi", "mpg", "mpeg", "m4v", "mov", "wmv", "flv",
];

/// Canonical container extension for converted output.
pub const CANONICAL_EXTENSION: &str = "mkv";

/// Codecs that do not need re-encoding in the replace workflow.
pub const ACCEPTABLE_CODECS_DEFAULT: &[&str] = &["hevc"];

/// Declarative description of the target encode.
///
/// The video codec name is validated against the ffmpeg encoder registry at
/// command-build time, not here, since the set of available encoders depends on
/// the ffmpeg build and hardware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Target video codec name, e.g. "hevc_nvenc".
    pub video_codec: String,
    /// Ordered codec-specific parameter pairs, rendered as `-name value`.
    pub video_params: Vec<(String, String)>,
    /// Target audio codec, "copy" to remux without re-encoding.
    pub audio_codec: String,
    /// Extra raw audio arguments appended after the audio codec.
    pub audio_params: Vec<String>,
    /// Audio languages to keep; empty keeps all audio streams present.
    pub audio_languages: Vec<String>,
    /// Subtitle languages to keep; empty keeps all subtitle streams present.
    pub subtitle_languages: Vec<String>,
    /// Rescale video down to this width when the source is wider.
    pub maximum_width: Option<u32>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            video_codec: "hevc_nvenc".to_string(),
            video_params: vec![
                ("preset".to_string(), "p5".to_string()),
                ("cq".to_string(), "30".to_string()),
                ("rc".to_string(), "vbr".to_string()),
                ("rc_lookahead".to_string(), "15".to_string()),
            ],
            audio_codec: "copy".to_string(),
            audio_params: Vec::new(),
            audio_languages: Vec::new(),
            subtitle_languages: Vec::new(),
            maximum_width: None,
        }
    }
}

/// Batch-level options shared by the replace and sort workflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Log commands instead of executing them.
    pub dry_run: bool,
    /// Skip files whose destination already exists.
    pub resume: bool,
    /// Scan and report candidates without converting.
    pub check_only: bool,
    /// Re-encode even when the source is already at an acceptable/target codec.
    pub force_reencode: bool,
    /// Codecs the replace workflow leaves alone.
    pub acceptable_codecs: Vec<String>,
    /// Relative duration tolerance for verification, e.g. 0.05 for 5%.
    pub duration_tolerance: f64,
    /// Absolute duration-difference floor in seconds; differences at or below
    /// this are always accepted regardless of the relative tolerance.
    pub min_duration_diff_secs: f64,
    /// File suffixes to scan for (without the dot, lowercase).
    pub suffixes: Vec<String>,
    pub ffmpeg_bin: PathBuf,
    pub ffprobe_bin: PathBuf,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            resume: false,
            check_only: false,
            force_reencode: false,
            acceptable_codecs: ACCEPTABLE_CODECS_DEFAULT
                .iter()
                .map(|s| s.to_string())
                .collect(),
            duration_tolerance: 0.05,
            min_duration_diff_secs: 5.0,
            suffixes: VIDEO_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
        }
    }
}

/// Full pipeline configuration as loaded from a config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub batch: BatchOptions,
}

impl PipelineConfig {
    /// Load configuration from a file, or return defaults if path is None or
    /// the file doesn't exist. TOML or JSON, decided by extension.
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path).with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    config = toml::from_str(&content).with_context(|| {
                        format!("Failed to parse TOML config: {}", config_path.display())
                    })?;
                } else {
                    config = serde_json::from_str(&content).with_context(|| {
                        format!("Failed to parse JSON config: {}", config_path.display())
                    })?;
                }
            }
        }

        Ok(config)
    }
}
