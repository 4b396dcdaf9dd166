//! Shared test fixtures and mock factories.
//!
//! Reduces boilerplate in tests that need a plausible `TrackRef` or
//! `TrackMeta` without caring about every field.

use std::path::PathBuf;
use std::sync::Arc;

use crate::cover::TrackRef;
use crate::library::playlist::TrackMeta;

/// A `TrackRef` with sensible defaults, for cover-subsystem tests.
pub fn mock_track_ref() -> TrackRef {
    TrackRef {
        uri: "file:///music/Artist/Album/01 Title.mp3".to_string(),
        local_path: Some(PathBuf::from("/music/Artist/Album/01 Title.mp3")),
        artist: Some("Test Artist".to_string()),
        album: Some("Test Album".to_string()),
        album_artist: None,
        title: Some("Test Title".to_string()),
        track_number: Some("1".to_string()),
    }
}

/// A `TrackRef` at a specific local path, for sibling/embedded-probe tests
/// that need a real filesystem location.
pub fn mock_track_ref_at(path: &std::path::Path) -> Arc<TrackRef> {
    Arc::new(TrackRef {
        uri: format!("file://{}", path.display()),
        local_path: Some(path.to_path_buf()),
        ..mock_track_ref()
    })
}

/// A `TrackMeta` with sensible defaults, for library-subsystem tests.
pub fn mock_track_meta(uri: &str) -> TrackMeta {
    TrackMeta {
        uri: uri.to_string(),
        title: Some("Test Title".to_string()),
        artist: Some("Test Artist".to_string()),
        album: Some("Test Album".to_string()),
        album_artist: None,
        genre: Some("Rock".to_string()),
        track_number: Some(1),
        disc_number: None,
        duration_secs: 180,
        mtime: 0,
        scan_time: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_track_ref_has_defaults() {
        let track = mock_track_ref();
        assert_eq!(track.artist.as_deref(), Some("Test Artist"));
    }

    #[test]
    fn mock_track_meta_has_defaults() {
        let meta = mock_track_meta("/music/song.mp3");
        assert_eq!(meta.uri, "/music/song.mp3");
        assert_eq!(meta.duration_secs, 180);
    }
}
