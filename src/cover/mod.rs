//! Artwork resolver subsystem (components A–H of SPEC_FULL.md).
//!
//! [`orchestrator::ArtworkResolver`] is the public entry point: it drives
//! the sibling-file scanner, the embedded-tag probes, the remote probes,
//! the disk cache, and the in-memory LRU for one cover query, with
//! concurrent-request squashing and generation-based cancellation.

pub mod cache;
pub mod lru;
pub mod orchestrator;
pub mod probes;
pub mod remote;
pub mod sidecar;
pub mod squasher;

use std::path::PathBuf;
use std::sync::Arc;

use bitflags::bitflags;

use crate::fmt::{FieldSource, TitleFormat};

/// Errors from the artwork subsystem (§7).
#[derive(Debug, thiserror::Error)]
pub enum CoverError {
    #[error("cache path exceeds platform name length budget")]
    PathTooLong,
    #[error("query cancelled")]
    Cancelled,
    #[error("no cover art found")]
    NotFound,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("listener table full")]
    ListenerTableFull,
}

/// A track handle as seen by the artwork resolver: just enough metadata
/// to drive the probe chain and the squash-equivalence rule (§3), without
/// depending on the library subsystem's `LibraryEntry`.
#[derive(Debug, Clone)]
pub struct TrackRef {
    /// The track's URI; doubles as the LRU/cache lookup key (`filepath`).
    pub uri: String,
    /// Local filesystem path, when the URI refers to a local file.
    pub local_path: Option<PathBuf>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub title: Option<String>,
    pub track_number: Option<String>,
}

impl FieldSource for TrackRef {
    fn field(&self, name: &str) -> Option<String> {
        match name {
            "artist" => self.artist.clone(),
            "album" => self.album.clone(),
            "album artist" => self.album_artist.clone(),
            "title" => self.title.clone(),
            "tracknumber" => self.track_number.clone(),
            _ => None,
        }
    }
}

bitflags! {
    /// Query flags (§3 CoverQuery); no flags are defined by name in the
    /// original beyond the size class, so this is a minimal open bitset
    /// that equivalence-matching treats opaquely.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CoverQueryFlags: u8 {
        const NONE = 0;
        /// Equivalent to `disable_cache` for this one query.
        const UNCACHED = 1 << 0;
    }
}

/// Cover size class (§3 CoverQuery `type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoverSize {
    Full,
    Thumbnail,
}

/// A pending request for a track's cover art.
#[derive(Debug, Clone)]
pub struct CoverQuery {
    pub track: Arc<TrackRef>,
    pub size: CoverSize,
    pub flags: CoverQueryFlags,
}

impl CoverQuery {
    /// The squash fingerprint (§3): `"tracknr - title - artist - album"`,
    /// defined only when all four fields are non-empty.
    pub fn fingerprint(&self) -> Option<String> {
        let t = &self.track;
        if t.track_number.as_deref().unwrap_or("").is_empty()
            || t.title.as_deref().unwrap_or("").is_empty()
            || t.artist.as_deref().unwrap_or("").is_empty()
            || t.album.as_deref().unwrap_or("").is_empty()
        {
            return None;
        }
        Some(fingerprint_format().eval(t.as_ref()))
    }

    /// Two queries are equivalent for squashing (§3) iff `size`/`flags`
    /// match and either the track handle is identical, the URI is
    /// identical, or the fingerprint is identical (and defined).
    pub fn equivalent(&self, other: &CoverQuery) -> bool {
        if self.size != other.size || self.flags != other.flags {
            return false;
        }
        if Arc::ptr_eq(&self.track, &other.track) {
            return true;
        }
        if self.track.uri == other.track.uri {
            return true;
        }
        match (self.fingerprint(), other.fingerprint()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

fn fingerprint_format() -> &'static TitleFormat {
    static FORMAT: std::sync::OnceLock<TitleFormat> = std::sync::OnceLock::new();
    FORMAT.get_or_init(|| {
        TitleFormat::compile(crate::fmt::FINGERPRINT_FORMAT).expect("static format compiles")
    })
}

/// Where a found cover's bytes live (§3: `image_filename` XOR `blob`).
#[derive(Debug, Clone)]
pub enum CoverPayload {
    Disk(PathBuf),
    Blob {
        bytes: Arc<[u8]>,
        offset: usize,
        size: usize,
    },
}

/// The unit of artwork identity and result (§3 CoverInfo).
///
/// Refcounting is `Arc<CoverInfo>` rather than a manual count: the LRU and
/// every queued callback hold their own clone, and the value is freed
/// when the last `Arc` drops.
#[derive(Debug, Clone)]
pub struct CoverInfo {
    pub filepath: String,
    pub album: Option<String>,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub payload: Option<CoverPayload>,
    pub cover_found: bool,
    /// LRU recency marker; monotonically increasing, not a wall-clock time.
    pub timestamp: i64,
}

impl CoverInfo {
    pub fn not_found(filepath: impl Into<String>) -> Self {
        Self {
            filepath: filepath.into(),
            album: None,
            artist: None,
            title: None,
            payload: None,
            cover_found: false,
            timestamp: 0,
        }
    }
}

/// Artwork event kinds delivered to listeners (§6): `SETTINGS_DID_CHANGE(track?, 0)`.
#[derive(Debug, Clone)]
pub enum CoverEvent {
    SettingsDidChange(Option<Arc<TrackRef>>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(uri: &str) -> Arc<TrackRef> {
        Arc::new(TrackRef {
            uri: uri.to_string(),
            local_path: None,
            artist: Some("Artist".into()),
            album: Some("Album".into()),
            album_artist: None,
            title: Some("Title".into()),
            track_number: Some("3".into()),
        })
    }

    #[test]
    fn same_uri_is_equivalent() {
        let a = CoverQuery {
            track: track("file:///a.mp3"),
            size: CoverSize::Full,
            flags: CoverQueryFlags::NONE,
        };
        let b = CoverQuery {
            track: track("file:///a.mp3"),
            size: CoverSize::Full,
            flags: CoverQueryFlags::NONE,
        };
        assert!(a.equivalent(&b));
    }

    #[test]
    fn different_size_class_is_not_equivalent() {
        let a = CoverQuery {
            track: track("file:///a.mp3"),
            size: CoverSize::Full,
            flags: CoverQueryFlags::NONE,
        };
        let b = CoverQuery {
            track: track("file:///a.mp3"),
            size: CoverSize::Thumbnail,
            flags: CoverQueryFlags::NONE,
        };
        assert!(!a.equivalent(&b));
    }

    #[test]
    fn fingerprint_requires_all_four_fields() {
        let mut t = TrackRef {
            uri: "file:///b.mp3".into(),
            local_path: None,
            artist: Some("A".into()),
            album: None,
            album_artist: None,
            title: Some("T".into()),
            track_number: Some("1".into()),
        };
        let q = CoverQuery {
            track: Arc::new(t.clone()),
            size: CoverSize::Full,
            flags: CoverQueryFlags::NONE,
        };
        assert!(q.fingerprint().is_none());

        t.album = Some("Alb".into());
        let q2 = CoverQuery {
            track: Arc::new(t),
            size: CoverSize::Full,
            flags: CoverQueryFlags::NONE,
        };
        assert_eq!(q2.fingerprint().as_deref(), Some("1 - T - A - Alb"));
    }

    #[test]
    fn fingerprint_match_is_equivalent_across_different_uris() {
        let a = CoverQuery {
            track: track("file:///a.mp3"),
            size: CoverSize::Full,
            flags: CoverQueryFlags::NONE,
        };
        let mut other = (*track("file:///a-duplicate.mp3")).clone();
        other.uri = "file:///other.mp3".into();
        let b = CoverQuery {
            track: Arc::new(other),
            size: CoverSize::Full,
            flags: CoverQueryFlags::NONE,
        };
        assert!(a.equivalent(&b));
    }
}
