//! Sibling-file scanner (component C, §4.3).
//!
//! For each candidate folder — the track's own directory, then each
//! configured subfolder name found case-insensitively beneath it — and
//! for each glob mask in priority order, scan the directory
//! case-insensitively; the first non-empty regular file wins.
//!
//! Tracks living inside a VFS container are out of this crate's scope
//! (§1); [`ContainerScanner`] is the seam a host application would plug a
//! real VFS plugin list into. With none registered, sibling scanning
//! simply falls through to the native filesystem.

use std::fs;
use std::path::{Path, PathBuf};

/// A pluggable container filesystem, mirroring the VFS plugin boundary
/// (`is_container`/`scandir`) the original spec calls out as out of
/// scope beyond this interface.
pub trait ContainerScanner: Send + Sync {
    fn is_container(&self, uri: &str) -> bool;
    /// List entry names directly inside `container_uri`'s folder at
    /// `subpath` (empty for the root).
    fn scandir(&self, container_uri: &str, subpath: &str) -> std::io::Result<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct SiblingScanner {
    masks: Vec<String>,
    folders: Vec<String>,
}

impl SiblingScanner {
    pub fn new(filemask: &str, folders: &str) -> Self {
        Self {
            masks: split_semicolons(filemask),
            folders: split_semicolons(folders),
        }
    }

    /// Search the native filesystem starting at `track_path`'s directory.
    /// Returns the first hit, or `None` if nothing matched.
    pub fn find(&self, track_path: &Path) -> Option<PathBuf> {
        let dir = track_path.parent()?;
        let mut candidates = vec![dir.to_path_buf()];
        for name in &self.folders {
            if let Some(sub) = find_subdir_case_insensitive(dir, name) {
                candidates.push(sub);
            }
        }
        for candidate in &candidates {
            for mask in &self.masks {
                if let Some(hit) = scan_for_mask(candidate, mask) {
                    return Some(hit);
                }
            }
        }
        None
    }

    /// Search via a [`ContainerScanner`] instead, for tracks whose URI's
    /// plugin reports `is_container`. The resulting path is encoded as
    /// `container_uri:entry` per §4.3.
    pub fn find_in_container(
        &self,
        container_uri: &str,
        scanner: &dyn ContainerScanner,
    ) -> Option<String> {
        let mut subpaths = vec![String::new()];
        if let Ok(root_entries) = scanner.scandir(container_uri, "") {
            for name in &self.folders {
                if let Some(hit) = root_entries.iter().find(|e| e.eq_ignore_ascii_case(name)) {
                    subpaths.push(hit.clone());
                }
            }
        }
        for subpath in &subpaths {
            let Ok(entries) = scanner.scandir(container_uri, subpath) else {
                continue;
            };
            for mask in &self.masks {
                if let Some(entry) = entries.iter().find(|e| glob_match(mask, e)) {
                    return Some(format!("{container_uri}:{entry}"));
                }
            }
        }
        None
    }
}

fn split_semicolons(s: &str) -> Vec<String> {
    s.split(';').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

fn find_subdir_case_insensitive(dir: &Path, name: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    for entry in entries.filter_map(|e| e.ok()) {
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if file_name.eq_ignore_ascii_case(name) && entry.path().is_dir() {
            return Some(entry.path());
        }
    }
    None
}

fn scan_for_mask(dir: &Path, mask: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    for entry in entries.filter_map(|e| e.ok()) {
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if !glob_match(mask, &file_name) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        if meta.is_file() && meta.len() > 0 {
            return Some(entry.path());
        }
    }
    None
}

/// Minimal case-insensitive glob matcher supporting only `*` wildcards,
/// which is all [`crate::config::DEFAULT_FILEMASK`] ever needs.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let text = text.to_lowercase();
    glob_match_bytes(pattern.as_bytes(), text.as_bytes())
}

fn glob_match_bytes(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((b'*', rest)) => {
            if rest.is_empty() {
                return true;
            }
            (0..=text.len()).any(|i| glob_match_bytes(rest, &text[i..]))
        }
        Some((p, rest)) => matches!(text.split_first(), Some((t, trest)) if t == p) && {
            glob_match_bytes(rest, &text[1..])
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn finds_cover_in_own_directory() {
        let temp = TempDir::new().unwrap();
        let track = temp.path().join("track.mp3");
        fs::write(&track, b"audio").unwrap();
        fs::write(temp.path().join("cover.jpg"), b"image").unwrap();

        let scanner = SiblingScanner::new(crate::config::DEFAULT_FILEMASK, crate::config::DEFAULT_FOLDERS);
        let hit = scanner.find(&track).unwrap();
        assert_eq!(hit.file_name().unwrap(), "cover.jpg");
    }

    #[test]
    fn finds_cover_in_named_subfolder() {
        let temp = TempDir::new().unwrap();
        let track = temp.path().join("track.mp3");
        fs::write(&track, b"audio").unwrap();
        let art_dir = temp.path().join("Artwork"); // case-different from default "artwork"
        fs::create_dir(&art_dir).unwrap();
        fs::write(art_dir.join("front.png"), b"image").unwrap();

        let scanner = SiblingScanner::new(crate::config::DEFAULT_FILEMASK, crate::config::DEFAULT_FOLDERS);
        let hit = scanner.find(&track).unwrap();
        assert_eq!(hit.file_name().unwrap(), "front.png");
    }

    #[test]
    fn empty_files_are_skipped() {
        let temp = TempDir::new().unwrap();
        let track = temp.path().join("track.mp3");
        fs::write(&track, b"audio").unwrap();
        fs::write(temp.path().join("cover.jpg"), []).unwrap();

        let scanner = SiblingScanner::new(crate::config::DEFAULT_FILEMASK, crate::config::DEFAULT_FOLDERS);
        assert!(scanner.find(&track).is_none());
    }

    #[test]
    fn glob_star_matches() {
        assert!(glob_match("*front*.*", "MyFrontCover.JPG"));
        assert!(glob_match("front.*", "FRONT.png"));
        assert!(!glob_match("front.*", "back.png"));
    }

    #[test]
    fn no_cover_returns_none() {
        let temp = TempDir::new().unwrap();
        let track = temp.path().join("track.mp3");
        fs::write(&track, b"audio").unwrap();
        let scanner = SiblingScanner::new(crate::config::DEFAULT_FILEMASK, crate::config::DEFAULT_FOLDERS);
        assert!(scanner.find(&track).is_none());
    }
}
