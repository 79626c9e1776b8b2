use std::path::{Path, PathBuf};
use log::debug;
use tokio::process::Command;

use crate::config::MediaConfig;
use crate::error::ConvertError;
use crate::ffprobe::MediaInfo;
use crate::select::StreamSelection;

/// One file's conversion work order: source, destination (possibly a temp
/// path), the encode configuration and the probed source metadata.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub source: PathBuf,
    pub output: PathBuf,
    pub config: MediaConfig,
    pub media: MediaInfo,
    pub dry_run: bool,
}

/// Video encoders reported by the ffmpeg build in use.
///
/// Queried once per batch; encoder availability varies by build and hardware,
/// so this is a runtime capability check rather than a compiled-in list.
#[derive(Debug, Clone)]
pub struct EncoderRegistry {
    names: Vec<String>,
}

impl EncoderRegistry {
    /// Query `ffmpeg -encoders` and collect the video encoder names.
    pub async fn detect(ffmpeg_bin: &Path) -> Result<Self, ConvertError> {
        let output = Command::new(ffmpeg_bin)
            .arg("-hide_banner")
            .arg("-encoders")
            .output()
            .await
            .map_err(|e| {
                ConvertError::execution(format!("failed to query ffmpeg encoders: {}", e), None)
            })?;

        if !output.status.success() {
            return Err(ConvertError::execution(
                format!(
                    "ffmpeg encoder query failed (exit code {})",
                    output.status.code().unwrap_or(-1)
                ),
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let registry = Self::parse_encoder_table(&stdout);
        debug!("Detected {} video encoders", registry.names.len());
        Ok(registry)
    }

    /// Build a registry from known names, for tests and offline use.
    pub fn from_names(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Parse the `ffmpeg -encoders` table, keeping video encoders only.
    ///
    /// Table rows look like ` V....D libx264  H.264 / AVC ...`; the first
    /// column is a capability flag string starting with the stream type.
    fn parse_encoder_table(stdout: &str) -> Self {
        let names = stdout
            .lines()
            .skip_while(|line| !line.trim_start().starts_with("------"))
            .skip(1)
            .filter_map(|line| {
                let mut parts = line.split_whitespace();
                let flags = parts.next()?;
                let name = parts.next()?;
                if flags.starts_with('V') {
                    Some(name.to_string())
                } else {
                    None
                }
            })
            .collect();
        Self { names }
    }

    pub fn supports(&self, codec: &str) -> bool {
        self.names.iter().any(|n| n == codec)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Fully-computed ffmpeg invocation for one conversion.
///
/// Built once per job and never mutated by the executor.
#[derive(Debug, Clone)]
pub struct TranscodeSpec {
    pub input: PathBuf,
    pub output: PathBuf,
    args: Vec<String>,
}

impl TranscodeSpec {
    /// The complete argv, including input and output paths.
    pub fn to_args(&self) -> &[String] {
        &self.args
    }

    /// Loggable single-line rendering of the command, for dry runs.
    pub fn render_command_line(&self, ffmpeg_bin: &Path) -> String {
        let mut line = ffmpeg_bin.display().to_string();
        for arg in &self.args {
            line.push(' ');
            if arg.contains(' ') {
                line.push('\'');
                line.push_str(arg);
                line.push('\'');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// Assemble the full transcode specification for one job.
///
/// Fails with a configuration error (batch-fatal) when the requested video
/// codec is unknown to the running ffmpeg build; the error carries the list of
/// available encoders for diagnosability.
pub fn build(
    job: &ConversionJob,
    selection: &StreamSelection,
    registry: &EncoderRegistry,
) -> Result<TranscodeSpec, ConvertError> {
    if !registry.supports(&job.config.video_codec) {
        return Err(ConvertError::Config {
            requested: job.config.video_codec.clone(),
            available: registry.names().to_vec(),
        });
    }

    let mut args: Vec<String> = Vec::new();
    let arg = |args: &mut Vec<String>, s: &str| args.push(s.to_string());

    arg(&mut args, "-hide_banner");
    arg(&mut args, "-y");
    arg(&mut args, "-i");
    args.push(job.source.to_string_lossy().to_string());

    // Stream maps. The sole selected video stream always comes first.
    arg(&mut args, "-map");
    arg(&mut args, "0:v:0");

    if selection.all_audio {
        arg(&mut args, "-map");
        arg(&mut args, "0:a?");
    } else {
        for index in selection.audio_indices() {
            arg(&mut args, "-map");
            args.push(format!("0:a:{}", index));
        }
    }

    if selection.all_subtitles {
        arg(&mut args, "-map");
        arg(&mut args, "0:s?");
    } else {
        for index in selection.subtitle_indices() {
            arg(&mut args, "-map");
            args.push(format!("0:s:{}", index));
        }
    }

    if let Some(scale) = selection.rescale {
        arg(&mut args, "-vf");
        args.push(format!("scale={}:{}", scale.width, scale.height));
    }

    arg(&mut args, "-c:v");
    args.push(job.config.video_codec.clone());
    for (name, value) in &job.config.video_params {
        args.push(format!("-{}", name));
        args.push(value.clone());
    }

    arg(&mut args, "-c:a");
    args.push(job.config.audio_codec.clone());
    for extra in &job.config.audio_params {
        args.push(extra.clone());
    }

    arg(&mut args, "-c:s");
    arg(&mut args, "copy");

    // Clear any default-subtitle disposition so players don't auto-select a
    // subtitle track, and tag the video stream for broad device compatibility.
    arg(&mut args, "-disposition:s");
    arg(&mut args, "0");
    arg(&mut args, "-tag:v");
    arg(&mut args, "hvc1");

    args.push(job.output.to_string_lossy().to_string());

    Ok(TranscodeSpec {
        input: job.source.clone(),
        output: job.output.clone(),
        args,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::select;

    const ENCODER_TABLE: &str = "Encoders:
 V..... = Video
 A..... = Audio
 S..... = Subtitle
 .F.... = Frame-level multithreading
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC
 V....D libx265              libx265 H.265 / HEVC
 V....D hevc_nvenc           NVIDIA NVENC hevc encoder
 A....D aac                  AAC (Advanced Audio Coding)
 S..... srt                  SubRip subtitle
";

    fn registry() -> EncoderRegistry {
        EncoderRegistry::from_names(vec![
            "libx264".to_string(),
            "libx265".to_string(),
            "hevc_nvenc".to_string(),
        ])
    }

    fn media_info(audio: &[&str], subs: &[&str], width: u32) -> MediaInfo {
        MediaInfo {
            path: PathBuf::from("/films/in.mp4"),
            width,
            height: width * 9 / 16,
            codec: "h264".to_string(),
            audio_languages: audio.iter().map(|s| s.to_string()).collect(),
            subtitle_languages: subs.iter().map(|s| s.to_string()).collect(),
            duration: 600.0,
        }
    }

    fn job(config: MediaConfig, media: MediaInfo) -> ConversionJob {
        ConversionJob {
            source: PathBuf::from("/films/in.mp4"),
            output: PathBuf::from("/tmp/out.mkv"),
            config,
            media,
            dry_run: false,
        }
    }

    fn windows_contain(args: &[String], pair: (&str, &str)) -> bool {
        args.windows(2).any(|w| w[0] == pair.0 && w[1] == pair.1)
    }

    #[test]
    fn encoder_table_parsing_keeps_video_encoders_only() {
        let registry = EncoderRegistry::parse_encoder_table(ENCODER_TABLE);
        assert!(registry.supports("libx264"));
        assert!(registry.supports("hevc_nvenc"));
        assert!(!registry.supports("aac"));
        assert!(!registry.supports("srt"));
        assert_eq!(registry.names().len(), 3);
    }

    #[test]
    fn unknown_codec_is_a_config_error_listing_alternatives() {
        let mut config = MediaConfig::default();
        config.video_codec = "av1_qsv".to_string();
        let media = media_info(&["eng"], &[], 1920);
        let selection = select(&config, &media);

        let err = build(&job(config, media), &selection, &registry()).unwrap_err();
        match &err {
            ConvertError::Config {
                requested,
                available,
            } => {
                assert_eq!(requested, "av1_qsv");
                assert!(available.contains(&"libx265".to_string()));
            }
            other => panic!("expected Config error, got {:?}", other),
        }
        assert!(err.is_batch_fatal());
    }

    #[test]
    fn spec_contains_codec_params_and_mux_directives() {
        let media = media_info(&["eng"], &["eng"], 1920);
        let config = MediaConfig::default();
        let selection = select(&config, &media);
        let spec = build(&job(config, media), &selection, &registry()).unwrap();
        let args = spec.to_args();

        assert!(windows_contain(args, ("-c:v", "hevc_nvenc")));
        assert!(windows_contain(args, ("-preset", "p5")));
        assert!(windows_contain(args, ("-cq", "30")));
        assert!(windows_contain(args, ("-c:a", "copy")));
        assert!(windows_contain(args, ("-c:s", "copy")));
        assert!(windows_contain(args, ("-disposition:s", "0")));
        assert!(windows_contain(args, ("-tag:v", "hvc1")));
        assert!(args.contains(&"-y".to_string()));
        assert_eq!(args.last().unwrap(), "/tmp/out.mkv");
    }

    #[test]
    fn keep_all_streams_uses_optional_maps() {
        let media = media_info(&["eng", "ger"], &["eng"], 1920);
        let config = MediaConfig::default();
        let selection = select(&config, &media);
        let spec = build(&job(config, media), &selection, &registry()).unwrap();
        let args = spec.to_args();

        assert!(windows_contain(args, ("-map", "0:v:0")));
        assert!(windows_contain(args, ("-map", "0:a?")));
        assert!(windows_contain(args, ("-map", "0:s?")));
    }

    #[test]
    fn language_filtered_streams_map_by_index() {
        let media = media_info(&["ger", "eng"], &["ger", "eng"], 1920);
        let mut config = MediaConfig::default();
        config.audio_languages = vec!["eng".to_string()];
        config.subtitle_languages = vec!["eng".to_string()];
        let selection = select(&config, &media);
        let spec = build(&job(config, media), &selection, &registry()).unwrap();
        let args = spec.to_args();

        assert!(windows_contain(args, ("-map", "0:a:1")));
        assert!(windows_contain(args, ("-map", "0:s:1")));
        assert!(!windows_contain(args, ("-map", "0:a?")));
        assert!(!windows_contain(args, ("-map", "0:a:0")));
    }

    #[test]
    fn rescale_adds_scale_filter_with_even_height() {
        let media = media_info(&[], &[], 3840);
        let mut config = MediaConfig::default();
        config.maximum_width = Some(1920);
        let selection = select(&config, &media);
        let spec = build(&job(config, media), &selection, &registry()).unwrap();

        assert!(windows_contain(spec.to_args(), ("-vf", "scale=1920:1080")));
    }

    #[test]
    fn command_line_rendering_quotes_spaced_paths() {
        let media = media_info(&[], &[], 1280);
        let config = MediaConfig::default();
        let selection = select(&config, &media);
        let mut j = job(config, media);
        j.source = PathBuf::from("/films/My Movie.mp4");
        let spec = build(&j, &selection, &registry()).unwrap();

        let line = spec.render_command_line(Path::new("ffmpeg"));
        assert!(line.starts_with("ffmpeg "));
        assert!(line.contains("'/films/My Movie.mp4'"));
    }
}
