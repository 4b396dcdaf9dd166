//! Index data model (component I, §3): `LibraryEntry` and `Collection`.
//!
//! The original hand-rolls a 4096-bucket hash table plus a singly-linked
//! list per collection bucket. Per §9's redesign note we replace both with
//! a `HashMap` keyed by the interned bucket string, with a sidecar `Vec`
//! preserving first-seen insertion order — the order UI code actually
//! depends on, without the pointer plumbing.

use std::collections::HashMap;
use std::sync::Arc;

use crate::interner::Handle;

/// One track in the index.
///
/// `subtrack` is the track-number-within-container for tracks extracted
/// from a single-file container (e.g. a cue sheet); `-1` means "whole
/// file" (§3).
#[derive(Debug, Clone)]
pub struct LibraryEntry {
    pub file: Handle,
    pub title: Handle,
    pub subtrack: i32,
    pub artist: Handle,
    pub album: Handle,
    pub genre: Handle,
    pub folder: Handle,
    /// Carried from the backing `TrackMeta` so the tree builder (§4.11) can
    /// sort album children by `(disc+1)*10000 + track_number` without a
    /// second lookup into the playlist.
    pub disc_number: Option<u32>,
    pub track_number: Option<u32>,
    /// Raw (unsubstituted) album/album-artist text, interned as the empty
    /// string when absent — distinct from [`Self::album`], the composite
    /// `artist=…;album=…` bucketing key. The tree builder's display labels
    /// (§4.11) render from these, not from the bucketing key.
    pub album_artist_raw: Handle,
    pub album_raw: Handle,
}

/// Adapts a [`LibraryEntry`] to [`crate::fmt::FieldSource`] so the tree
/// builder can evaluate [`crate::fmt::ARTIST_ALBUM_LABEL_FORMAT`] and
/// [`crate::fmt::TRACK_LABEL_FORMAT`] directly against index nodes.
impl crate::fmt::FieldSource for LibraryEntry {
    fn field(&self, name: &str) -> Option<String> {
        match name {
            "album artist" => Some(self.album_artist_raw.as_str().to_string()),
            "album" => Some(self.album_raw.as_str().to_string()),
            "title" => Some(self.title.as_str().to_string()),
            "tracknumber" => self.track_number.map(|n| n.to_string()),
            _ => None,
        }
    }
}

/// A deduplicated string set where each distinct string (bucket key) holds
/// an ordered list of member entries. Four instances exist in [`super::index::Index`]:
/// artists, albums (composite key), genres, track-URIs.
#[derive(Debug, Default)]
pub struct Collection {
    order: Vec<Handle>,
    buckets: HashMap<Handle, Vec<Arc<LibraryEntry>>>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `entry` to `key`'s bucket, creating the bucket (and recording
    /// its insertion order) if this is the first member.
    pub fn register(&mut self, key: Handle, entry: Arc<LibraryEntry>) {
        if !self.buckets.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.buckets.entry(key).or_default().push(entry);
    }

    /// Ensure `key`'s bucket exists, even if empty (§4.9: the `<?>`
    /// sentinel must exist in every collection after a full build).
    pub fn ensure_bucket(&mut self, key: Handle) {
        if !self.buckets.contains_key(&key) {
            self.order.push(key.clone());
            self.buckets.insert(key, Vec::new());
        }
    }

    pub fn get(&self, key: &Handle) -> Option<&[Arc<LibraryEntry>]> {
        self.buckets.get(key).map(|v| v.as_slice())
    }

    /// Buckets in first-seen insertion order.
    pub fn buckets(&self) -> impl Iterator<Item = (&Handle, &[Arc<LibraryEntry>])> {
        self.order.iter().map(move |k| (k, self.buckets[k].as_slice()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
