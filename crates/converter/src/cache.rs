use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use log::debug;

use crate::error::ConvertError;
use crate::ffprobe::{probe_file, MediaInfo};

/// Cache key: canonicalized absolute path plus modification time, so a
/// rewritten file (new mtime) never serves stale metadata.
type CacheKey = (PathBuf, SystemTime);

/// Per-batch cache of probed media metadata.
///
/// Probing is deterministic for a given file, so entries live for the whole
/// batch. The cache is an explicit object handed through the pipeline rather
/// than process-global state, which keeps tests isolated.
pub struct ProbeCache {
    ffprobe_bin: PathBuf,
    entries: HashMap<CacheKey, MediaInfo>,
}

impl ProbeCache {
    pub fn new(ffprobe_bin: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_bin: ffprobe_bin.into(),
            entries: HashMap::new(),
        }
    }

    /// Probed metadata for a file, from cache when available.
    pub async fn get_or_probe(&mut self, path: &Path) -> Result<MediaInfo, ConvertError> {
        let key = Self::key_for(path)?;

        if let Some(info) = self.entries.get(&key) {
            debug!("Probe cache hit for {}", path.display());
            return Ok(info.clone());
        }

        let data = probe_file(&self.ffprobe_bin, path).await?;
        let info = MediaInfo::from_probe(path, &data)?;
        self.entries.insert(key, info.clone());
        Ok(info)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn key_for(path: &Path) -> Result<CacheKey, ConvertError> {
        let canonical = path
            .canonicalize()
            .map_err(|e| ConvertError::probe(path, format!("cannot canonicalize path: {}", e)))?;
        let mtime = std::fs::metadata(&canonical)
            .and_then(|m| m.modified())
            .map_err(|e| ConvertError::probe(path, format!("cannot stat file: {}", e)))?;
        Ok((canonical, mtime))
    }
}
