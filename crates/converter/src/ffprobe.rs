use std::collections::HashMap;
use std::path::{Path, PathBuf};
use log::warn;
use serde::Deserialize;
use tokio::process::Command;

use crate::error::ConvertError;

/// Complete ffprobe output structure
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeData {
    pub streams: Vec<FFProbeStream>,
    pub format: FFProbeFormat,
}

/// Format-level metadata from ffprobe
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeFormat {
    #[serde(rename = "format_name")]
    pub format_name: Option<String>,
    /// Container duration in seconds, as a decimal string. Stream-level
    /// duration is unreliable for some codecs, so this is the only duration
    /// source the pipeline uses.
    pub duration: Option<String>,
}

/// Stream-level metadata from ffprobe
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeStream {
    pub index: i32,
    #[serde(rename = "codec_type")]
    pub codec_type: Option<String>,
    #[serde(rename = "codec_name")]
    pub codec_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub tags: Option<HashMap<String, String>>,
}

impl FFProbeStream {
    fn is_type(&self, kind: &str) -> bool {
        self.codec_type.as_deref() == Some(kind)
    }
}

/// Language tag of an audio or subtitle stream, or "unk" when absent.
pub fn get_language(stream: &FFProbeStream) -> String {
    stream
        .tags
        .as_ref()
        .and_then(|tags| tags.get("language"))
        .cloned()
        .unwrap_or_else(|| "unk".to_string())
}

/// Run ffprobe and parse the JSON output
pub async fn probe_file(ffprobe_bin: &Path, file_path: &Path) -> Result<FFProbeData, ConvertError> {
    if !file_path.exists() {
        return Err(ConvertError::probe(file_path, "file does not exist"));
    }

    let output = Command::new(ffprobe_bin)
        .arg("-v")
        .arg("error")
        .arg("-print_format")
        .arg("json")
        .arg("-show_streams")
        .arg("-show_format")
        .arg(file_path)
        .output()
        .await
        .map_err(|e| {
            ConvertError::probe(file_path, format!("failed to execute ffprobe: {}", e))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);
        return Err(ConvertError::probe(
            file_path,
            format!("ffprobe exit code {}: {}", exit_code, stderr.trim()),
        ));
    }

    let json_str = String::from_utf8(output.stdout)
        .map_err(|_| ConvertError::probe(file_path, "ffprobe output is not valid UTF-8"))?;

    serde_json::from_str(&json_str)
        .map_err(|e| ConvertError::probe(file_path, format!("failed to parse ffprobe JSON: {}", e)))
}

/// Structural metadata of one media file, derived from a probe.
///
/// Immutable once computed; the probe cache hands out clones of this for both
/// source-file decisions and post-conversion verification.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Video codec name of the first video stream.
    pub codec: String,
    /// Language tags of the audio streams, in stream order.
    pub audio_languages: Vec<String>,
    /// Language tags of the subtitle streams, in stream order.
    pub subtitle_languages: Vec<String>,
    /// Container duration in seconds.
    pub duration: f64,
}

impl MediaInfo {
    /// Extract the pipeline's view of a file from raw ffprobe output.
    ///
    /// Uses the first video stream when several are present (with a warning)
    /// and defaults missing audio/subtitle language tags to "unk".
    pub fn from_probe(path: &Path, data: &FFProbeData) -> Result<Self, ConvertError> {
        let video_streams: Vec<&FFProbeStream> =
            data.streams.iter().filter(|s| s.is_type("video")).collect();

        let video = match video_streams.first() {
            Some(v) => *v,
            None => return Err(ConvertError::probe(path, "no video stream found")),
        };
        if video_streams.len() > 1 {
            warn!(
                "Multiple video streams found in {}, using the first one",
                path.display()
            );
        }

        let width = video
            .width
            .ok_or_else(|| ConvertError::probe(path, "video stream has no width"))?;
        let height = video
            .height
            .ok_or_else(|| ConvertError::probe(path, "video stream has no height"))?;
        let codec = video
            .codec_name
            .clone()
            .ok_or_else(|| ConvertError::probe(path, "video stream has no codec name"))?;

        let duration = data
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .ok_or_else(|| ConvertError::probe(path, "container has no parseable duration"))?;

        Ok(MediaInfo {
            path: path.to_path_buf(),
            width,
            height,
            codec,
            audio_languages: data
                .streams
                .iter()
                .filter(|s| s.is_type("audio"))
                .map(get_language)
                .collect(),
            subtitle_languages: data
                .streams
                .iter()
                .filter(|s| s.is_type("subtitle"))
                .map(get_language)
                .collect(),
            duration,
        })
    }
}
