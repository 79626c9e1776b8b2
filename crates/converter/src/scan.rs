use std::path::{Path, PathBuf};
use log::{debug, warn};
use walkdir::WalkDir;

/// Recursively find video files under a root, filtered by suffix.
///
/// Matching is case-insensitive on the extension. The result is sorted so a
/// fixed directory snapshot always yields the same batch order.
pub fn find_video_files(root: &Path, suffixes: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Error reading directory entry: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());

        match ext {
            Some(ext) if suffixes.iter().any(|s| *s == ext) => {
                debug!("Found media file: {}", path.display());
                files.push(path.to_path_buf());
            }
            _ => continue,
        }
    }

    files.sort();
    files
}
