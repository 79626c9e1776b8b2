use std::sync::OnceLock;
use regex::Regex;

/// Folder name used when no season pattern is recognized.
pub const UNKNOWN_SEASON: &str = "Unknown";

/// Season number next to an "S"/"Season" marker, e.g. `S01E01`, `Season 4`.
fn season_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)s(?:eason)?[ ._-]?(\d{1,2})").unwrap())
}

/// `NxM`-style season/episode pair with digits on both sides, e.g. `3x10`.
fn episode_pair() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d{1,2})[ ._-]?[ex][ ._-]?(\d{1,2})").unwrap())
}

/// Episode marker anywhere in the name: `E05`, `Episode 3`, `3x10`.
fn episode_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(e[ ._-]?\d{1,2}|\d{1,2}[ ._-]?x[ ._-]?\d{1,2})").unwrap()
    })
}

/// Derive the season folder name ("S01".."S99") from a file name, or
/// "Unknown" when no season pattern is present.
///
/// A season number alone is not enough: the name must also carry an episode
/// marker, so non-episodic names like `Ocean's 11` stay in "Unknown" instead
/// of being misfiled into a season folder.
pub fn season_folder(file_name: &str) -> String {
    if !episode_marker().is_match(file_name) {
        return UNKNOWN_SEASON.to_string();
    }

    let number = season_marker()
        .captures(file_name)
        .or_else(|| episode_pair().captures(file_name))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok());

    match number {
        Some(n) => format!("S{:02}", n),
        None => UNKNOWN_SEASON.to_string(),
    }
}
