use std::path::Path;
use std::process::Stdio;
use log::{debug, info};
use tokio::process::Command;

use crate::command::TranscodeSpec;
use crate::error::ConvertError;

/// Run one transcode, or just log the command line in dry-run mode.
///
/// The engine invocation is awaited to completion with no timeout; the batch
/// deliberately runs one encode at a time. Tool output is suppressed except
/// for errors, which are captured and attached to the failure.
pub async fn execute(
    ffmpeg_bin: &Path,
    spec: &TranscodeSpec,
    dry_run: bool,
) -> Result<(), ConvertError> {
    let cmd_line = spec.render_command_line(ffmpeg_bin);

    if dry_run {
        info!("Dry run, command: {}", cmd_line);
        return Ok(());
    }

    debug!("Running command: {}", cmd_line);

    let output = Command::new(ffmpeg_bin)
        .arg("-loglevel")
        .arg("error")
        .arg("-nostats")
        .args(spec.to_args())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| {
            ConvertError::execution(
                format!(
                    "failed to spawn ffmpeg at {}: {}",
                    ffmpeg_bin.display(),
                    e
                ),
                None,
            )
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(ConvertError::execution(
            format!(
                "ffmpeg exit code {} for {}",
                output.status.code().unwrap_or(-1),
                spec.input.display()
            ),
            if stderr.is_empty() { None } else { Some(stderr) },
        ));
    }

    debug!("Conversion finished for {}", spec.input.display());
    Ok(())
}
