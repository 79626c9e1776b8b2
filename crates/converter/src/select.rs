use crate::config::MediaConfig;
use crate::ffprobe::MediaInfo;

/// Stream category inside the source container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
}

/// Reference to one stream: kind plus zero-based index within that kind,
/// matching ffmpeg's `0:a:<index>` addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRef {
    pub kind: StreamKind,
    pub index: usize,
}

/// Rescale target with precomputed even height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleTarget {
    pub width: u32,
    pub height: u32,
}

/// Which streams to mux into the output, in order, plus an optional rescale.
///
/// `all_audio` / `all_subtitles` mark the keep-everything case, rendered as the
/// optional-map form (`0:a?`) instead of enumerated indices.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSelection {
    pub streams: Vec<StreamRef>,
    pub all_audio: bool,
    pub all_subtitles: bool,
    pub rescale: Option<ScaleTarget>,
}

impl StreamSelection {
    pub fn audio_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.streams
            .iter()
            .filter(|s| s.kind == StreamKind::Audio)
            .map(|s| s.index)
    }

    pub fn subtitle_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.streams
            .iter()
            .filter(|s| s.kind == StreamKind::Subtitle)
            .map(|s| s.index)
    }
}

/// Decide which streams of a probed file to keep and whether to rescale.
///
/// Pure function of its inputs: identical config and metadata always yield an
/// identical selection.
pub fn select(config: &MediaConfig, media: &MediaInfo) -> StreamSelection {
    let mut streams = vec![StreamRef {
        kind: StreamKind::Video,
        index: 0,
    }];

    let rescale = match config.maximum_width {
        Some(max_width) if media.width > max_width => Some(ScaleTarget {
            width: max_width,
            height: even_scaled_height(media.width, media.height, max_width),
        }),
        _ => None,
    };

    let mut all_audio = false;
    if config.audio_languages.is_empty() {
        all_audio = !media.audio_languages.is_empty();
    } else {
        for (index, lang) in media.audio_languages.iter().enumerate() {
            if config.audio_languages.contains(lang) {
                streams.push(StreamRef {
                    kind: StreamKind::Audio,
                    index,
                });
            }
        }
    }

    let mut all_subtitles = false;
    if config.subtitle_languages.is_empty() {
        all_subtitles = !media.subtitle_languages.is_empty();
    } else {
        for (index, lang) in media.subtitle_languages.iter().enumerate() {
            if config.subtitle_languages.contains(lang) {
                streams.push(StreamRef {
                    kind: StreamKind::Subtitle,
                    index,
                });
            }
        }
    }

    StreamSelection {
        streams,
        all_audio,
        all_subtitles,
        rescale,
    }
}

/// Aspect-preserving height for a target width, rounded to the nearest even
/// value (chroma subsampling requires even dimensions).
fn even_scaled_height(src_width: u32, src_height: u32, target_width: u32) -> u32 {
    let exact = src_height as f64 * target_width as f64 / src_width as f64;
    let rounded = exact.round() as u32;
    if rounded % 2 == 0 {
        rounded
    } else {
        // Pick whichever neighboring even value is closer to the exact height.
        let lower = rounded - 1;
        let upper = rounded + 1;
        if (exact - lower as f64).abs() <= (upper as f64 - exact).abs() {
            lower
        } else {
            upper
        }
    }
}
