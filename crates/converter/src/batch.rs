use std::path::{Path, PathBuf};
use log::{error, info, warn};
use uuid::Uuid;

use crate::cache::ProbeCache;
use crate::command::{build, ConversionJob, EncoderRegistry};
use crate::config::{BatchOptions, MediaConfig, CANONICAL_EXTENSION};
use crate::error::ConvertError;
use crate::exec::execute;
use crate::ffprobe::MediaInfo;
use crate::scan::find_video_files;
use crate::season::season_folder;
use crate::verify::{verify_and_commit, CommitMode};

/// How destination paths are derived, and with them the commit behavior.
///
/// The replace and sort workflows share one per-file pipeline; only the
/// destination resolution and the final commit differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationStrategy {
    /// Convert next to the source and replace it in place.
    InPlace,
    /// Place converted files into season subfolders under a target root,
    /// parsed from the file name ("S01".."S99", "Unknown").
    SeasonFolders { target: PathBuf },
    /// Mirror the source folder layout under a target root.
    Mirror { target: PathBuf },
}

/// One planned conversion: where the file is and where it will end up.
#[derive(Debug, Clone)]
pub struct PlannedConversion {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Outcome summary of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Source → destination pairs that entered the convert map.
    pub planned: Vec<PlannedConversion>,
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Final destination for a source file under the given strategy.
///
/// Sort strategies rewrite "264" to "265" in the stem and normalize the
/// extension to the canonical container; in-place replacement only normalizes
/// the extension (of the source itself, at commit time).
pub fn destination_for(
    strategy: &DestinationStrategy,
    source_root: &Path,
    source: &Path,
) -> PathBuf {
    match strategy {
        DestinationStrategy::InPlace => source.with_extension(CANONICAL_EXTENSION),
        DestinationStrategy::SeasonFolders { target } => {
            let file_name = source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let season = season_folder(&file_name);
            rewrite_output_name(&target.join(season).join(file_name))
        }
        DestinationStrategy::Mirror { target } => {
            let relative = source.strip_prefix(source_root).unwrap_or(source);
            rewrite_output_name(&target.join(relative))
        }
    }
}

/// "264" → "265" stem rewrite plus canonical extension.
fn rewrite_output_name(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().replace("264", "265"))
        .unwrap_or_default();
    path.with_file_name(stem)
        .with_extension(CANONICAL_EXTENSION)
}

/// Whether a probed codec already satisfies the target codec, so the sort
/// workflow can skip the file. Probed names are decoder families ("hevc")
/// while targets may be encoder implementations ("hevc_nvenc").
pub fn already_target_codec(probed: &str, target: &str) -> bool {
    probed == target || target.starts_with(&format!("{}_", probed))
}

/// Codec-based pre-filter: false means the file can be skipped outright.
pub fn codec_filter_passes(
    strategy: &DestinationStrategy,
    probed_codec: &str,
    config: &MediaConfig,
    options: &BatchOptions,
) -> bool {
    if options.force_reencode {
        return true;
    }
    match strategy {
        DestinationStrategy::InPlace => !options
            .acceptable_codecs
            .iter()
            .any(|c| c == probed_codec),
        DestinationStrategy::SeasonFolders { .. } | DestinationStrategy::Mirror { .. } => {
            !already_target_codec(probed_codec, &config.video_codec)
        }
    }
}

/// Resume-mode skip: the destination already exists from a prior run.
///
/// In-place replacement is exempt when the destination equals the source
/// itself (a .mkv source trivially "exists" at its own destination).
fn resume_skip(resume: bool, source: &Path, destination: &Path) -> bool {
    resume && destination != source && destination.exists()
}

/// Temporary output path for one conversion, unique per run so the probe
/// cache can never return a stale entry for a reused temp name.
fn temp_output_path(destination: &Path) -> PathBuf {
    let dir = destination.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!(
        ".vconvert-{}.{}",
        Uuid::new_v4(),
        CANONICAL_EXTENSION
    ))
}

/// Run the whole batch: scan, plan, convert, verify, commit, clean up.
///
/// Per-file errors are logged and skipped; the returned error is reserved for
/// batch-fatal conditions (unknown codec, unreachable ffmpeg) detected before
/// or during the first command build.
pub async fn run_batch(
    source_root: &Path,
    strategy: DestinationStrategy,
    config: &MediaConfig,
    options: &BatchOptions,
) -> Result<BatchReport, ConvertError> {
    let mut report = BatchReport::default();
    let mut cache = ProbeCache::new(&options.ffprobe_bin);

    let video_files = find_video_files(source_root, &options.suffixes);
    info!(
        "Found {} video files in {}",
        video_files.len(),
        source_root.display()
    );

    // Build the full convert map before any conversion runs, so resume
    // decisions and source/destination pairing are fixed up front.
    let mut convert_map: Vec<(PathBuf, PathBuf, MediaInfo)> = Vec::new();
    for source in video_files {
        let media = match cache.get_or_probe(&source).await {
            Ok(media) => media,
            Err(e) => {
                warn!("Skipping {} due to probe error: {}", source.display(), e);
                report.skipped += 1;
                continue;
            }
        };

        info!(
            "{}: {}x{} {} {:.0}s audio={:?} subs={:?}",
            source.display(),
            media.width,
            media.height,
            media.codec,
            media.duration,
            media.audio_languages,
            media.subtitle_languages
        );

        if !codec_filter_passes(&strategy, &media.codec, config, options) {
            info!(
                "Skipping {}: codec {} needs no conversion",
                source.display(),
                media.codec
            );
            report.skipped += 1;
            continue;
        }

        let destination = destination_for(&strategy, source_root, &source);
        if resume_skip(options.resume, &source, &destination) {
            warn!(
                "Skipping {}: destination {} already exists",
                source.display(),
                destination.display()
            );
            report.skipped += 1;
            continue;
        }

        convert_map.push((source, destination, media));
    }

    info!("{} files to convert", convert_map.len());
    report.planned = convert_map
        .iter()
        .map(|(source, destination, _)| PlannedConversion {
            source: source.clone(),
            destination: destination.clone(),
        })
        .collect();

    if options.check_only {
        for planned in &report.planned {
            info!(
                "Would convert {} -> {}",
                planned.source.display(),
                planned.destination.display()
            );
        }
        return Ok(report);
    }

    if convert_map.is_empty() {
        return Ok(report);
    }

    // One capability query per batch; encoder availability does not change
    // while the batch runs.
    let registry = EncoderRegistry::detect(&options.ffmpeg_bin).await?;

    let mut temp_files: Vec<PathBuf> = Vec::new();
    for (source, destination, media) in convert_map {
        let temp_output = temp_output_path(&destination);
        if let Some(parent) = temp_output.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                error!(
                    "Skipping {}: cannot create {}: {}",
                    source.display(),
                    parent.display(),
                    e
                );
                report.failed += 1;
                continue;
            }
        }
        temp_files.push(temp_output.clone());

        let job = ConversionJob {
            source: source.clone(),
            output: temp_output.clone(),
            config: config.clone(),
            media: media.clone(),
            dry_run: options.dry_run,
        };

        let selection = crate::select::select(config, &media);
        let spec = match build(&job, &selection, &registry) {
            Ok(spec) => spec,
            Err(e) if e.is_batch_fatal() => {
                error!("Aborting batch: {}", e);
                return Err(e);
            }
            Err(e) => {
                error!("Skipping {}: {}", source.display(), e);
                report.failed += 1;
                continue;
            }
        };

        if let Err(e) = execute(&options.ffmpeg_bin, &spec, job.dry_run).await {
            error!("Conversion failed for {}: {}", source.display(), e);
            report.failed += 1;
            continue;
        }

        if job.dry_run {
            info!(
                "Dry run enabled, skipping verification for {}",
                source.display()
            );
            continue;
        }

        let mode = match &strategy {
            DestinationStrategy::InPlace => CommitMode::ReplaceSource,
            DestinationStrategy::SeasonFolders { .. } | DestinationStrategy::Mirror { .. } => {
                CommitMode::MoveToDestination(destination.clone())
            }
        };

        match verify_and_commit(
            &source,
            &temp_output,
            &media,
            &mut cache,
            options.duration_tolerance,
            options.min_duration_diff_secs,
            mode,
        )
        .await
        {
            Ok(committed) => {
                info!(
                    "Converted {} -> {}",
                    source.display(),
                    committed.display()
                );
                report.converted += 1;
            }
            Err(e) => {
                error!("Verification failed for {}: {}", source.display(), e);
                report.failed += 1;
            }
        }
    }

    // Committed temp files are gone by now; anything left is an artifact of a
    // failed or dry-run conversion.
    for temp in temp_files {
        if temp.exists() {
            if let Err(e) = std::fs::remove_file(&temp) {
                warn!("Could not remove temp file {}: {}", temp.display(), e);
            }
        }
    }

    info!(
        "Batch complete: {} converted, {} skipped, {} failed",
        report.converted, report.skipped, report.failed
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn season_strategy(target: &Path) -> DestinationStrategy {
        DestinationStrategy::SeasonFolders {
            target: target.to_path_buf(),
        }
    }

    #[test]
    fn in_place_destination_is_the_canonical_source_path() {
        let dest = destination_for(
            &DestinationStrategy::InPlace,
            Path::new("/films"),
            Path::new("/films/movie.avi"),
        );
        assert_eq!(dest, PathBuf::from("/films/movie.mkv"));
    }

    #[test]
    fn season_destination_sorts_into_parsed_folder() {
        let dest = destination_for(
            &season_strategy(Path::new("/sorted")),
            Path::new("/incoming"),
            Path::new("/incoming/Show.S01E01.x264.mp4"),
        );
        assert_eq!(dest, PathBuf::from("/sorted/S01/Show.S01E01.x265.mkv"));
    }

    #[test]
    fn unparseable_names_land_in_unknown() {
        let dest = destination_for(
            &season_strategy(Path::new("/sorted")),
            Path::new("/incoming"),
            Path::new("/incoming/RandomVideo.mkv"),
        );
        assert_eq!(dest, PathBuf::from("/sorted/Unknown/RandomVideo.mkv"));
    }

    #[test]
    fn mirror_destination_preserves_relative_layout() {
        let dest = destination_for(
            &DestinationStrategy::Mirror {
                target: PathBuf::from("/sorted"),
            },
            Path::new("/incoming"),
            Path::new("/incoming/shows/a/Show.S01E01.mp4"),
        );
        assert_eq!(dest, PathBuf::from("/sorted/shows/a/Show.S01E01.mkv"));
    }

    #[test]
    fn codec_filter_for_replace_workflow_uses_acceptable_list() {
        let config = MediaConfig::default();
        let options = BatchOptions::default();
        let strategy = DestinationStrategy::InPlace;

        // h264 source with acceptable list {"hevc"}: convertable
        assert!(codec_filter_passes(&strategy, "h264", &config, &options));
        // hevc source is already acceptable: excluded
        assert!(!codec_filter_passes(&strategy, "hevc", &config, &options));

        let mut forced = options.clone();
        forced.force_reencode = true;
        assert!(codec_filter_passes(&strategy, "hevc", &config, &forced));
    }

    #[test]
    fn codec_filter_for_sort_workflow_matches_target_family() {
        let config = MediaConfig::default(); // target hevc_nvenc
        let options = BatchOptions::default();
        let strategy = season_strategy(Path::new("/sorted"));

        assert!(codec_filter_passes(&strategy, "h264", &config, &options));
        assert!(!codec_filter_passes(&strategy, "hevc", &config, &options));

        let mut forced = options.clone();
        forced.force_reencode = true;
        assert!(codec_filter_passes(&strategy, "hevc", &config, &forced));
    }

    #[test]
    fn target_codec_match_covers_encoder_implementations() {
        assert!(already_target_codec("hevc", "hevc_nvenc"));
        assert!(already_target_codec("hevc", "hevc"));
        assert!(!already_target_codec("h264", "hevc_nvenc"));
        assert!(!already_target_codec("hevc", "libx265"));
    }

    #[test]
    fn resume_skips_existing_destinations_only() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("movie.avi");
        let existing = dir.path().join("S01").join("movie.mkv");
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(&source, b"").unwrap();
        std::fs::write(&existing, b"").unwrap();

        let missing = dir.path().join("S02").join("other.mkv");
        assert!(resume_skip(true, &source, &existing));
        assert!(!resume_skip(true, &source, &missing));
        assert!(!resume_skip(false, &source, &existing));
        // In-place: destination equals source
        assert!(!resume_skip(true, &source, &source));
    }

    #[test]
    fn temp_output_paths_are_unique_and_sit_next_to_the_destination() {
        let dest = Path::new("/sorted/S01/movie.mkv");
        let a = temp_output_path(dest);
        let b = temp_output_path(dest);
        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(Path::new("/sorted/S01")));
        assert_eq!(a.extension().and_then(|e| e.to_str()), Some("mkv"));
    }

    fn unreachable_tools() -> BatchOptions {
        let mut options = BatchOptions::default();
        options.ffprobe_bin = PathBuf::from("/nonexistent/ffprobe");
        options.ffmpeg_bin = PathBuf::from("/nonexistent/ffmpeg");
        options
    }

    #[tokio::test]
    async fn probe_failures_are_skipped_and_never_abort_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.mkv", "b.mkv", "c.mkv"] {
            std::fs::write(dir.path().join(name), "not a video").unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let report = run_batch(
            dir.path(),
            DestinationStrategy::InPlace,
            &MediaConfig::default(),
            &unreachable_tools(),
        )
        .await
        .unwrap();

        assert_eq!(report.skipped, 3);
        assert_eq!(report.converted, 0);
        assert_eq!(report.failed, 0);
        assert!(report.planned.is_empty());
        for name in ["a.mkv", "b.mkv", "c.mkv"] {
            assert!(dir.path().join(name).exists());
        }
    }

    #[tokio::test]
    async fn check_only_with_no_candidates_reports_an_empty_plan() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.mkv"), "not a video").unwrap();

        let mut options = unreachable_tools();
        options.check_only = true;

        let report = run_batch(
            dir.path(),
            season_strategy(dir.path()),
            &MediaConfig::default(),
            &options,
        )
        .await
        .unwrap();

        assert!(report.planned.is_empty());
        assert_eq!(report.skipped, 1);
        assert_eq!(report.converted, 0);
        assert!(dir.path().join("broken.mkv").exists());
    }
}
