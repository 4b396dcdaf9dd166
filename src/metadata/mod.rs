//! Audio file tag reading.
//!
//! Uses the lofty crate for format-independent metadata access: title,
//! artist, album, album artist, genre, track/disc number. This is general
//! string-tag reading, as distinct from [`crate::cover::probes`]'s
//! byte-level embedded-picture extraction, which does not go through
//! lofty's unified picture API (see that module's doc comment for why).

use std::path::Path;
use std::time::UNIX_EPOCH;

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey};

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("failed to open {0}: {1}")]
    Open(std::path::PathBuf, String),
    #[error("failed to read tags from {0}: {1}")]
    Read(std::path::PathBuf, String),
}

/// The subset of a track's tags this crate's library indexer cares about
/// (§4.9: title, interned artist/album/genre, track/disc number).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub duration_secs: u64,
}

/// Read `path`'s tags, falling back to the first available tag when the
/// format has no single designated "primary" one (matching the teacher's
/// `metadata::read`).
pub fn read_tags(path: &Path) -> Result<Tags, MetadataError> {
    let tagged_file = Probe::open(path)
        .map_err(|e| MetadataError::Open(path.to_path_buf(), e.to_string()))?
        .read()
        .map_err(|e| MetadataError::Read(path.to_path_buf(), e.to_string()))?;

    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

    let title = tag.and_then(|t| t.title().map(|s| s.to_string()));
    let artist = tag.and_then(|t| t.artist().map(|s| s.to_string()));
    let album = tag.and_then(|t| t.album().map(|s| s.to_string()));
    let album_artist = tag.and_then(|t| t.get_string(&ItemKey::AlbumArtist).map(|s| s.to_string()));
    let genre = tag.and_then(|t| t.genre().map(|s| s.to_string()));
    let track_number = tag.and_then(|t| t.track());
    let disc_number = tag.and_then(|t| t.disk());
    let duration_secs = tagged_file.properties().duration().as_secs();

    Ok(Tags {
        title,
        artist,
        album,
        album_artist,
        genre,
        track_number,
        disc_number,
        duration_secs,
    })
}

/// File modification time as Unix seconds, defaulting to 0 on any error so
/// a stat failure degrades to "always stale" rather than panicking (§7:
/// library scanner I/O errors are logged and the file is skipped, not
/// fatal to the scan).
pub fn mtime_secs(path: &Path) -> u64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|t| t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn non_audio_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not music").unwrap();
        assert!(read_tags(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_tags(Path::new("/nonexistent/track.mp3")).is_err());
    }

    #[test]
    fn mtime_of_missing_file_is_zero() {
        assert_eq!(mtime_secs(Path::new("/nonexistent/track.mp3")), 0);
    }
}
