//! Library index (component I, §4.9): builds the multi-axis index from a
//! canonical playlist.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::fmt::TitleFormat;
use crate::interner::{Handle, Interner};

use super::entry::{Collection, LibraryEntry};
use super::playlist::Playlist;
use super::tree::FolderTree;

/// Sentinel bucket key for missing artist/album/genre values (§4.9).
pub const UNKNOWN_SENTINEL: &str = "<?>";

/// The multi-keyed index over every track in a source's canonical playlist.
pub struct Index {
    pub artists: Collection,
    pub albums: Collection,
    pub genres: Collection,
    pub uris: Collection,
    pub folder_tree: FolderTree,
    /// Filename hash (§3): keyed by the interned URI identity.
    pub filename_hash: HashMap<Handle, Arc<LibraryEntry>>,
}

impl Index {
    fn empty(interner: &Interner) -> Self {
        Self {
            artists: Collection::new(),
            albums: Collection::new(),
            genres: Collection::new(),
            uris: Collection::new(),
            folder_tree: FolderTree::new(interner),
            filename_hash: HashMap::new(),
        }
    }

    /// Build a fresh index from `playlist`, interning every collection
    /// string through `interner`. Tracks whose URI matches no path in
    /// `monitored_paths` are dropped (§4.9); the filtered playlist is
    /// returned alongside the index.
    pub fn build(playlist: &Playlist, monitored_paths: &[PathBuf], interner: &Interner) -> (Self, Playlist) {
        let mut index = Self::empty(interner);
        let mut kept = Playlist::new();
        let album_key_format = album_key_format();

        for track in playlist.iter() {
            let Some(relative) = relative_uri(&track.uri, monitored_paths) else {
                continue;
            };

            let artist_text = non_empty(&track.artist).unwrap_or(UNKNOWN_SENTINEL);
            let genre_text = non_empty(&track.genre).unwrap_or(UNKNOWN_SENTINEL);
            let album_text = album_key_format.eval(track);
            let album_text = if album_text.is_empty() { UNKNOWN_SENTINEL.to_string() } else { album_text };
            let folder_text = folder_of(&relative);
            let title_text = track.title.as_deref().unwrap_or("");

            let file = interner.intern(&track.uri);
            let entry = Arc::new(LibraryEntry {
                file: file.clone(),
                title: interner.intern(title_text),
                subtrack: -1,
                artist: interner.intern(artist_text),
                album: interner.intern(&album_text),
                genre: interner.intern(genre_text),
                folder: interner.intern(&folder_text),
                disc_number: track.disc_number,
                track_number: track.track_number,
                album_artist_raw: interner.intern(track.album_artist.as_deref().unwrap_or("")),
                album_raw: interner.intern(track.album.as_deref().unwrap_or("")),
            });

            index.artists.register(entry.artist.clone(), entry.clone());
            index.albums.register(entry.album.clone(), entry.clone());
            index.genres.register(entry.genre.clone(), entry.clone());
            index.uris.register(file.clone(), entry.clone());
            index.folder_tree.insert(&folder_text, entry.clone(), interner);
            index.filename_hash.insert(file, entry);

            kept.push(track.clone());
        }

        let sentinel = interner.intern(UNKNOWN_SENTINEL);
        index.artists.ensure_bucket(sentinel.clone());
        index.albums.ensure_bucket(sentinel.clone());
        index.genres.ensure_bucket(sentinel);

        (index, kept)
    }

    pub fn track_count(&self) -> usize {
        self.filename_hash.len()
    }

    pub fn contains_uri(&self, uri: &str, interner: &Interner) -> bool {
        self.filename_hash.contains_key(&interner.intern(uri))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn album_key_format() -> &'static TitleFormat {
    static FORMAT: std::sync::OnceLock<TitleFormat> = std::sync::OnceLock::new();
    FORMAT.get_or_init(|| TitleFormat::compile(crate::fmt::ALBUM_KEY_FORMAT).expect("static format compiles"))
}

/// Strip the longest-matching monitored-path prefix from `uri`, returning
/// the `/`-separated remainder, or `None` if no monitored root contains it.
fn relative_uri(uri: &str, monitored_paths: &[PathBuf]) -> Option<String> {
    let path = Path::new(uri);
    monitored_paths
        .iter()
        .filter_map(|root| path.strip_prefix(root).ok())
        .min_by_key(|relative| relative.as_os_str().len())
        .map(|relative| relative.to_string_lossy().replace('\\', "/"))
}

/// The directory portion of a relative URI, `/` when the track sits
/// directly under the monitored root (§4.9).
fn folder_of(relative: &str) -> String {
    match Path::new(relative).parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_string_lossy().replace('\\', "/"),
        _ => "/".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::playlist::TrackMeta;

    fn track(uri: &str, artist: Option<&str>, album: Option<&str>) -> TrackMeta {
        let mut t = TrackMeta::new(uri);
        t.artist = artist.map(String::from);
        t.album = album.map(String::from);
        t.title = Some("T".to_string());
        t
    }

    #[test]
    fn index_totality_matches_track_count() {
        let interner = Interner::new();
        let mut playlist = Playlist::new();
        playlist.push(track("/M/a.mp3", Some("A"), Some("X")));
        playlist.push(track("/M/b.mp3", None, None));

        let (index, kept) = Index::build(&playlist, &[PathBuf::from("/M")], &interner);
        assert_eq!(index.track_count(), 2);
        assert_eq!(kept.len(), 2);
        assert_eq!(index.artists.len(), 2); // "A" and "<?>"
    }

    #[test]
    fn tracks_outside_monitored_roots_are_dropped() {
        let interner = Interner::new();
        let mut playlist = Playlist::new();
        playlist.push(track("/Other/a.mp3", Some("A"), Some("X")));

        let (index, kept) = Index::build(&playlist, &[PathBuf::from("/M")], &interner);
        assert_eq!(index.track_count(), 0);
        assert_eq!(kept.len(), 0);
    }

    #[test]
    fn sentinel_bucket_exists_even_with_no_missing_values() {
        let interner = Interner::new();
        let mut playlist = Playlist::new();
        playlist.push(track("/M/a.mp3", Some("A"), Some("X")));

        let (index, _) = Index::build(&playlist, &[PathBuf::from("/M")], &interner);
        assert!(index.artists.get(&interner.intern(UNKNOWN_SENTINEL)).is_some());
    }

    #[test]
    fn folder_is_root_when_track_sits_directly_under_monitored_path() {
        let interner = Interner::new();
        let mut playlist = Playlist::new();
        playlist.push(track("/M/a.mp3", Some("A"), Some("X")));

        let (index, _) = Index::build(&playlist, &[PathBuf::from("/M")], &interner);
        assert_eq!(index.folder_tree.root.tracks.len(), 1);
    }
}
