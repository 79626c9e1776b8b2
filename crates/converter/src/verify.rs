use std::path::{Path, PathBuf};
use log::{error, info};

use crate::cache::ProbeCache;
use crate::config::CANONICAL_EXTENSION;
use crate::error::ConvertError;
use crate::ffprobe::MediaInfo;

/// What to do with a verified output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitMode {
    /// Replace the source file in place: normalize its extension to the
    /// canonical container first, then move the output over it.
    ReplaceSource,
    /// Move the output to a final destination; the source stays untouched.
    MoveToDestination(PathBuf),
}

/// Duration acceptance rule.
///
/// A conversion is rejected only when the difference exceeds both the relative
/// tolerance and the absolute floor. The floor exists because a percentage
/// alone is too strict for short clips (container rounding) and the percentage
/// exists because the floor alone is too loose for long films.
pub fn duration_accepted(
    source_secs: f64,
    output_secs: f64,
    tolerance: f64,
    min_abs_diff: f64,
) -> bool {
    let diff = (output_secs - source_secs).abs();
    !(diff > tolerance * source_secs && diff > min_abs_diff)
}

/// Re-probe the converted output, check its duration against the source and
/// only then perform the destructive filesystem commit.
///
/// Any failure before the commit leaves the source file completely untouched;
/// the temporary output is left for the orchestrator's end-of-batch cleanup.
/// Returns the final path of the committed file.
pub async fn verify_and_commit(
    source: &Path,
    output: &Path,
    source_media: &MediaInfo,
    cache: &mut ProbeCache,
    tolerance: f64,
    min_abs_diff: f64,
    mode: CommitMode,
) -> Result<PathBuf, ConvertError> {
    let output_media = cache.get_or_probe(output).await.map_err(|_| {
        ConvertError::probe(output, "temp file missing or unreadable after conversion")
    })?;

    let diff = (output_media.duration - source_media.duration).abs();
    let diff_pct = if source_media.duration > 0.0 {
        diff / source_media.duration * 100.0
    } else {
        0.0
    };

    if !duration_accepted(
        source_media.duration,
        output_media.duration,
        tolerance,
        min_abs_diff,
    ) {
        error!(
            "Duration mismatch for {}: source {:.1}s, output {:.1}s, off by {:.1}s ({:.1}%)",
            source.display(),
            source_media.duration,
            output_media.duration,
            diff,
            diff_pct
        );
        return Err(ConvertError::Verification {
            path: source.to_path_buf(),
            diff_secs: diff,
            diff_pct,
        });
    }

    info!(
        "Verified {}: duration within tolerance (off by {:.1}s, {:.1}%)",
        source.display(),
        diff,
        diff_pct
    );

    commit(source, output, mode)
}

/// Perform the destructive rename/move sequence for an already-verified output.
pub fn commit(source: &Path, output: &Path, mode: CommitMode) -> Result<PathBuf, ConvertError> {
    match mode {
        CommitMode::ReplaceSource => {
            let has_canonical_ext = source
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(CANONICAL_EXTENSION))
                .unwrap_or(false);

            // When the extension already matches (possibly in a different
            // case), move over the source's own path; recomputing it from
            // the lowercase extension would leave a `.MKV` original behind
            // on case-sensitive filesystems.
            let target = if has_canonical_ext {
                source.to_path_buf()
            } else {
                let canonical = source.with_extension(CANONICAL_EXTENSION);
                std::fs::rename(source, &canonical)?;
                info!(
                    "Renamed {} to canonical extension {}",
                    source.display(),
                    canonical.display()
                );
                canonical
            };

            move_file(output, &target)?;
            info!(
                "Replaced original with converted file: {}",
                target.display()
            );
            Ok(target)
        }
        CommitMode::MoveToDestination(dest) => {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            move_file(output, &dest)?;
            info!("Moved converted file to {}", dest.display());
            Ok(dest)
        }
    }
}

/// Rename, falling back to copy-and-delete when crossing filesystems.
fn move_file(from: &Path, to: &Path) -> Result<(), ConvertError> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)?;
            Ok(())
        }
    }
}
