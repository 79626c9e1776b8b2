use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the conversion pipeline.
///
/// Per-file errors (probe, execution, verification) are logged and skipped by
/// the batch loop; only configuration errors abort the whole batch, since a bad
/// codec name would fail every single file the same way.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// ffprobe failed or its output was unusable for this file.
    #[error("probe failed for {path}: {reason}")]
    Probe { path: PathBuf, reason: String },

    /// The requested video codec is not known to the ffmpeg build in use.
    #[error("video codec '{requested}' not found in ffmpeg encoders (available: {})", available.join(", "))]
    Config {
        requested: String,
        available: Vec<String>,
    },

    /// ffmpeg invocation failed.
    #[error("ffmpeg failed: {reason}")]
    Execution {
        reason: String,
        stderr: Option<String>,
    },

    /// Converted output did not match the source duration within tolerance.
    #[error("duration mismatch for {path}: off by {diff_secs:.1}s ({diff_pct:.1}%)")]
    Verification {
        path: PathBuf,
        diff_secs: f64,
        diff_pct: f64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    pub fn probe(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Probe {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn execution(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::Execution {
            reason: reason.into(),
            stderr,
        }
    }

    /// Whether this error should stop the whole batch rather than just skip
    /// the current file.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_config_errors_are_batch_fatal() {
        let probe = ConvertError::probe("/tmp/a.mkv", "no such file");
        let exec = ConvertError::execution("exit code 1", None);
        let verify = ConvertError::Verification {
            path: PathBuf::from("/tmp/a.mkv"),
            diff_secs: 6.0,
            diff_pct: 6.0,
        };
        let config = ConvertError::Config {
            requested: "hevc_missing".to_string(),
            available: vec!["libx264".to_string()],
        };

        assert!(!probe.is_batch_fatal());
        assert!(!exec.is_batch_fatal());
        assert!(!verify.is_batch_fatal());
        assert!(config.is_batch_fatal());
    }

    #[test]
    fn config_error_lists_available_encoders() {
        let err = ConvertError::Config {
            requested: "hevc_nvenc".to_string(),
            available: vec!["libx264".to_string(), "libx265".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("hevc_nvenc"));
        assert!(msg.contains("libx264, libx265"));
    }
}
