//! Disk cover cache (component E, §4.5).
//!
//! Cache key: `covers2/<escaped-artist>/<escaped-album>.jpg` under a
//! platform cache root. A zero-byte file at that path is a *negative
//! placeholder*: "tried and failed". Path components are sanitized so a
//! malicious artist/album string can't escape the cache root (§8 property
//! 5) and are truncated to a portable `NAME_MAX` budget, reserving room
//! for the `.jpg` suffix and a `.part` temp-write tail.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Portable stand-in for platform `NAME_MAX`; real filesystems vary (255
/// on most Linux/macOS, lower on some), but nothing in this crate needs
/// the exact platform value — just a conservative, consistent budget.
pub const NAME_MAX: usize = 255;

const SUFFIX_BUDGET: usize = ".jpg".len() + ".part".len();

pub struct DiskCoverCache {
    root: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("path component exceeds name length budget")]
    PathTooLong,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl DiskCoverCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default cache root: `<platform cache dir>/medialib-core/covers2`.
    pub fn default_location() -> Self {
        let root = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("medialib-core");
        Self::new(root)
    }

    /// Compute the cache path for `(artist, album)`, applying the
    /// fallback chain (§4.5): artist missing → `Unknown artist`; album
    /// missing → track URI → artist; if both album and URI are absent,
    /// the query fails outright with no cache path.
    pub fn path_for(
        &self,
        artist: Option<&str>,
        album: Option<&str>,
        uri_fallback: Option<&str>,
    ) -> Result<PathBuf, CacheError> {
        let artist = non_empty(artist).unwrap_or("Unknown artist");
        let album = non_empty(album)
            .or_else(|| non_empty(uri_fallback))
            .or(Some(artist))
            .ok_or(CacheError::PathTooLong)?;

        let artist_seg = escape_segment(artist, NAME_MAX)?;
        let album_seg = escape_segment(album, NAME_MAX.saturating_sub(SUFFIX_BUDGET))?;

        Ok(self
            .root
            .join("covers2")
            .join(artist_seg)
            .join(format!("{album_seg}.jpg")))
    }

    /// A non-empty file at `path` is reused without re-probing; a
    /// zero-byte file is the negative placeholder.
    pub fn status(&self, path: &Path) -> CacheStatus {
        match fs::metadata(path) {
            Ok(meta) if meta.len() > 0 => CacheStatus::Hit,
            Ok(_) => CacheStatus::NegativePlaceholder,
            Err(_) => CacheStatus::Miss,
        }
    }

    /// Write a zero-byte negative placeholder at `path` (§4.5, §7).
    pub fn write_placeholder(&self, path: &Path) -> Result<(), CacheError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, []).map_err(CacheError::from)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    NegativePlaceholder,
    Miss,
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

/// The native path separator this build's platform uses (§4.3): `/` on
/// POSIX, `\` on Windows.
#[cfg(windows)]
fn native_separator() -> char {
    '\\'
}
#[cfg(not(windows))]
fn native_separator() -> char {
    '/'
}

/// What the native separator is replaced with when it appears inside an
/// artist/album string (§4.3): the *other* platform's separator on POSIX
/// (safe, since POSIX filenames may contain `\`), or `_` on Windows
/// (since `\` is the one being escaped and `/` is also reserved there).
#[cfg(windows)]
fn native_substitute() -> char {
    '_'
}
#[cfg(not(windows))]
fn native_substitute() -> char {
    '\\'
}

/// Replace path separators with a safe substitute, strip `.`/`..`
/// components, and right-truncate to `budget` bytes (§4.3, §4.5, §8
/// property 5). `/`→`\` is used uniformly: the concern is the host
/// filesystem's own separator, and since this cache always runs against
/// the *current* platform's paths, substituting the *other* platform's
/// separator character keeps the mapping stable and reversible-looking
/// without ever reintroducing a traversal-capable character.
fn escape_segment(s: &str, budget: usize) -> Result<String, CacheError> {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            c if c == native_separator() => out.push(native_substitute()),
            // Always neutralize the *other* platform's separator too, so a
            // cache path built on one OS never contains a traversal-capable
            // character when read back on another.
            '/' | '\\' => out.push('_'),
            c => out.push(c),
        }
    }
    // Neutralize `.`/`..` as a whole segment (can't traverse once `/` is gone,
    // but a leading-dot segment could still collide with a hidden file).
    if out == "." || out == ".." {
        out = format!("_{out}");
    }
    if out.is_empty() {
        return Err(CacheError::PathTooLong);
    }
    if out.len() > budget {
        if budget == 0 {
            return Err(CacheError::PathTooLong);
        }
        let mut truncated = String::new();
        for c in out.chars() {
            if truncated.len() + c.len_utf8() > budget {
                break;
            }
            truncated.push(c);
        }
        if truncated.is_empty() {
            return Err(CacheError::PathTooLong);
        }
        out = truncated;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builds_expected_key() {
        let temp = TempDir::new().unwrap();
        let cache = DiskCoverCache::new(temp.path());
        let path = cache.path_for(Some("Pixies"), Some("Doolittle"), None).unwrap();
        assert_eq!(
            path,
            temp.path().join("covers2").join("Pixies").join("Doolittle.jpg")
        );
    }

    #[test]
    fn missing_artist_falls_back() {
        let temp = TempDir::new().unwrap();
        let cache = DiskCoverCache::new(temp.path());
        let path = cache.path_for(None, Some("X"), None).unwrap();
        assert!(path.to_string_lossy().contains("Unknown artist"));
    }

    #[test]
    fn missing_album_falls_back_to_uri_then_artist() {
        let temp = TempDir::new().unwrap();
        let cache = DiskCoverCache::new(temp.path());

        let via_uri = cache.path_for(Some("A"), None, Some("file:///x.mp3")).unwrap();
        assert!(via_uri.file_stem().unwrap().to_string_lossy().contains("x.mp3"));

        let via_artist = cache.path_for(Some("A"), None, None).unwrap();
        assert!(via_artist.ends_with("A.jpg"));
    }

    #[test]
    fn both_album_and_uri_absent_fails() {
        let temp = TempDir::new().unwrap();
        let cache = DiskCoverCache::new(temp.path());
        assert!(cache.path_for(None, None, None).is_err());
    }

    #[test]
    fn path_separators_are_escaped() {
        let temp = TempDir::new().unwrap();
        let cache = DiskCoverCache::new(temp.path());
        let path = cache
            .path_for(Some("../../etc"), Some("passwd/../../x"), None)
            .unwrap();
        // No component of the path beyond the cache root should be `.` or `..`.
        let rel = path.strip_prefix(temp.path()).unwrap();
        for comp in rel.components() {
            let s = comp.as_os_str().to_string_lossy();
            assert_ne!(s, ".");
            assert_ne!(s, "..");
        }
        assert_eq!(rel.components().count(), 3); // covers2/artist/album.jpg
    }

    #[test]
    fn long_album_name_is_truncated() {
        let temp = TempDir::new().unwrap();
        let cache = DiskCoverCache::new(temp.path());
        let long_album = "x".repeat(1000);
        let path = cache.path_for(Some("A"), Some(&long_album), None).unwrap();
        let filename = path.file_name().unwrap().to_string_lossy();
        assert!(filename.len() <= NAME_MAX);
        assert!(filename.ends_with(".jpg"));
    }

    #[test]
    fn zero_byte_file_is_negative_placeholder() {
        let temp = TempDir::new().unwrap();
        let cache = DiskCoverCache::new(temp.path());
        let path = temp.path().join("p.jpg");
        cache.write_placeholder(&path).unwrap();
        assert_eq!(cache.status(&path), CacheStatus::NegativePlaceholder);
    }

    #[test]
    fn nonempty_file_is_hit_missing_file_is_miss() {
        let temp = TempDir::new().unwrap();
        let cache = DiskCoverCache::new(temp.path());
        let hit_path = temp.path().join("h.jpg");
        fs::write(&hit_path, b"data").unwrap();
        assert_eq!(cache.status(&hit_path), CacheStatus::Hit);

        let miss_path = temp.path().join("missing.jpg");
        assert_eq!(cache.status(&miss_path), CacheStatus::Miss);
    }
}
