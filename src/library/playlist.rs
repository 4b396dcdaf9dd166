//! The canonical playlist (§3, §4.13): an ordered, persistable container of
//! per-track metadata, plus the one metadata key the incremental scan
//! filter relies on: `:MEDIALIB_SCAN_TIME`.
//!
//! This also serves as the "playlist container with ordered items and
//! metadata key/value lookups" player-wide collaborator called out in §1
//! as a dependency of the core rather than part of it — there's nothing
//! else in this crate that plays that role, so it lives here.

use serde::{Deserialize, Serialize};

use crate::fmt::FieldSource;

/// One track's persisted metadata. Serializes with `bincode` for the
/// on-disk canonical playlist file (§4.13).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMeta {
    /// Absolute path or URI; the primary key tracks are found by.
    pub uri: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub duration_secs: u64,
    /// Last observed filesystem mtime, Unix seconds.
    pub mtime: u64,
    /// The `:MEDIALIB_SCAN_TIME` metadata key (§4.10): when this entry was
    /// last (re)indexed. `None` means "never scanned" and always forces a
    /// re-parse.
    pub scan_time: Option<i64>,
}

impl TrackMeta {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            title: None,
            artist: None,
            album: None,
            album_artist: None,
            genre: None,
            track_number: None,
            disc_number: None,
            duration_secs: 0,
            mtime: 0,
            scan_time: None,
        }
    }

    pub fn from_tags(uri: impl Into<String>, tags: &crate::metadata::Tags, mtime: u64, scan_time: i64) -> Self {
        Self {
            uri: uri.into(),
            title: tags.title.clone(),
            artist: tags.artist.clone(),
            album: tags.album.clone(),
            album_artist: tags.album_artist.clone(),
            genre: tags.genre.clone(),
            track_number: tags.track_number,
            disc_number: tags.disc_number,
            duration_secs: tags.duration_secs,
            mtime,
            scan_time: Some(scan_time),
        }
    }
}

impl FieldSource for TrackMeta {
    fn field(&self, name: &str) -> Option<String> {
        match name {
            "artist" => self.artist.clone(),
            "album" => self.album.clone(),
            "album artist" => self.album_artist.clone(),
            "title" => self.title.clone(),
            "genre" => self.genre.clone(),
            "tracknumber" => self.track_number.map(|n| n.to_string()),
            _ => None,
        }
    }
}

/// The canonical, ordered track list (§3: "canonical playlist ... owns all
/// entry refcounts", realized here as plain ownership of `TrackMeta`s).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Playlist {
    tracks: Vec<TrackMeta>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, track: TrackMeta) {
        self.tracks.push(track);
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackMeta> {
        self.tracks.iter()
    }

    pub fn tracks(&self) -> &[TrackMeta] {
        &self.tracks
    }

    pub fn find_by_uri(&self, uri: &str) -> Option<&TrackMeta> {
        self.tracks.iter().find(|t| t.uri == uri)
    }

    /// Take ownership of every entry whose URI is in `uri`, removing them
    /// from `self` (§4.10: "the move is destructive on the old playlist so
    /// that, after a full refresh, entries not moved represent deletions").
    pub fn take_by_uri(&mut self, uri: &str) -> Vec<TrackMeta> {
        let mut taken = Vec::new();
        let mut i = 0;
        while i < self.tracks.len() {
            if self.tracks[i].uri == uri {
                taken.push(self.tracks.remove(i));
            } else {
                i += 1;
            }
        }
        taken
    }
}

impl IntoIterator for Playlist {
    type Item = TrackMeta;
    type IntoIter = std::vec::IntoIter<TrackMeta>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracks.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_by_uri_removes_all_matches_and_returns_them() {
        let mut playlist = Playlist::new();
        playlist.push(TrackMeta::new("a.mp3"));
        playlist.push(TrackMeta::new("b.mp3"));
        playlist.push(TrackMeta::new("a.mp3"));

        let taken = playlist.take_by_uri("a.mp3");
        assert_eq!(taken.len(), 2);
        assert_eq!(playlist.len(), 1);
        assert_eq!(playlist.tracks()[0].uri, "b.mp3");
    }

    #[test]
    fn field_source_maps_track_fields() {
        let mut track = TrackMeta::new("x.mp3");
        track.album = Some("Doolittle".to_string());
        assert_eq!(track.field("album").as_deref(), Some("Doolittle"));
        assert_eq!(track.field("nonexistent"), None);
    }
}
