//! Tree builder (component K, §4.11): materializes a filtered, sorted
//! display tree for one axis selector.
//!
//! [`FolderTree`] is the index's own persistent folder structure, built
//! once per index rebuild (§4.9). [`LibraryItem`] is the disposable *view*
//! tree a UI asks for on demand (§3) — Albums/Artists/Genres/Folders all
//! project down to the same `LibraryItem` shape so a single tree widget
//! can render any of them.

use std::collections::HashMap;
use std::sync::Arc;

use crate::fmt::TitleFormat;
use crate::interner::{Handle, Interner};

use super::entry::LibraryEntry;
use super::index::Index;
use super::playlist::Playlist;

fn album_label_format() -> &'static TitleFormat {
    static FORMAT: std::sync::OnceLock<TitleFormat> = std::sync::OnceLock::new();
    FORMAT.get_or_init(|| {
        TitleFormat::compile(crate::fmt::ARTIST_ALBUM_LABEL_FORMAT).expect("static format compiles")
    })
}

fn track_label_format() -> &'static TitleFormat {
    static FORMAT: std::sync::OnceLock<TitleFormat> = std::sync::OnceLock::new();
    FORMAT.get_or_init(|| TitleFormat::compile(crate::fmt::TRACK_LABEL_FORMAT).expect("static format compiles"))
}

/// §4.11's per-track label: `[%tracknumber%. ]%title%`.
fn track_label(entry: &LibraryEntry) -> String {
    track_label_format().eval(entry)
}

/// §4.11's per-album-subnode label: `[%album artist% - ]%album%`.
fn album_label(entry: &LibraryEntry) -> String {
    album_label_format().eval(entry)
}

/// The folder hierarchy maintained alongside the index (§3 FolderTree).
#[derive(Debug)]
pub struct FolderTree {
    pub root: FolderNode,
}

#[derive(Debug)]
pub struct FolderNode {
    pub name: Handle,
    pub children: Vec<FolderNode>,
    pub tracks: Vec<Arc<LibraryEntry>>,
}

impl FolderTree {
    pub fn new(interner: &Interner) -> Self {
        Self {
            root: FolderNode {
                name: interner.intern("/"),
                children: Vec::new(),
                tracks: Vec::new(),
            },
        }
    }

    /// Register `entry` under `folder` (a `/`-joined relative path, `"/"`
    /// for the monitored root itself), creating intermediate nodes as
    /// needed.
    pub fn insert(&mut self, folder: &str, entry: Arc<LibraryEntry>, interner: &Interner) {
        let mut node = &mut self.root;
        if folder != "/" {
            for segment in folder.split('/').filter(|s| !s.is_empty()) {
                let idx = match node.children.iter().position(|c| c.name.as_str() == segment) {
                    Some(i) => i,
                    None => {
                        node.children.push(FolderNode {
                            name: interner.intern(segment),
                            children: Vec::new(),
                            tracks: Vec::new(),
                        });
                        node.children.len() - 1
                    }
                };
                node = &mut node.children[idx];
            }
        }
        node.tracks.push(entry);
    }
}

/// The axis a tree is built over (§6: the fixed selector set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selector {
    Albums,
    Artists,
    Genres,
    Folders,
}

impl Selector {
    pub const ALL: [Selector; 4] =
        [Selector::Albums, Selector::Artists, Selector::Genres, Selector::Folders];

    pub fn name(self) -> &'static str {
        match self {
            Selector::Albums => "Albums",
            Selector::Artists => "Artists",
            Selector::Genres => "Genres",
            Selector::Folders => "Folders",
        }
    }
}

/// A disposable view node for UI consumption (§3). `track` is set only on
/// leaf (track) nodes.
#[derive(Debug, Clone)]
pub struct LibraryItem {
    pub text: String,
    pub track: Option<Arc<LibraryEntry>>,
    pub children: Vec<LibraryItem>,
}

impl LibraryItem {
    fn leaf(text: String, track: Arc<LibraryEntry>) -> Self {
        Self { text, track: Some(track), children: Vec::new() }
    }

    fn branch(text: String, children: Vec<LibraryItem>) -> Self {
        Self { text, track: None, children }
    }

    pub fn num_children(&self) -> usize {
        self.children.len()
    }
}

/// Build a `LibraryItem` tree for `selector` over `index`/`playlist`,
/// restricted to tracks whose URI matches `filter` as a case-insensitive
/// substring search when supplied (§4.11 step 1).
pub fn build(index: &Index, playlist: &Playlist, selector: Selector, filter: Option<&str>) -> LibraryItem {
    let selected: Option<std::collections::HashSet<&str>> = filter.map(|needle| {
        let needle = needle.to_lowercase();
        playlist
            .iter()
            .filter(|t| track_matches(t, &needle))
            .map(|t| t.uri.as_str())
            .collect()
    });

    match selector {
        Selector::Albums => build_albums(index, &selected),
        Selector::Artists => build_grouped(&index.artists, &selected),
        Selector::Genres => build_grouped(&index.genres, &selected),
        Selector::Folders => build_folders(&index.folder_tree.root, &selected),
    }
}

fn track_matches(track: &super::playlist::TrackMeta, needle: &str) -> bool {
    track.uri.to_lowercase().contains(needle)
        || track.title.as_deref().unwrap_or("").to_lowercase().contains(needle)
        || track.artist.as_deref().unwrap_or("").to_lowercase().contains(needle)
        || track.album.as_deref().unwrap_or("").to_lowercase().contains(needle)
}

fn entry_selected(entry: &LibraryEntry, selected: &Option<std::collections::HashSet<&str>>) -> bool {
    match selected {
        None => true,
        Some(set) => set.contains(entry.file.as_str()),
    }
}

/// §4.11 Albums: one node per album bucket; children sorted by
/// `disc*10000 + track_number`, ties by case-insensitive title.
fn build_albums(index: &Index, selected: &Option<std::collections::HashSet<&str>>) -> LibraryItem {
    let mut album_nodes = Vec::new();
    for (_key, entries) in index.albums.buckets() {
        let mut tracks: Vec<&Arc<LibraryEntry>> =
            entries.iter().filter(|e| entry_selected(e, selected)).collect();
        if tracks.is_empty() {
            continue;
        }
        tracks.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
        let label = album_label(tracks[0]);
        let children = tracks
            .into_iter()
            .map(|e| LibraryItem::leaf(track_label(e), e.clone()))
            .collect();
        album_nodes.push(LibraryItem::branch(label, children));
    }
    LibraryItem::branch("Albums".to_string(), album_nodes)
}

/// §4.11 / §8 property 9: `(disc+1)*10000 + track_number`, ascending;
/// ties broken by case-insensitive title. Missing disc/track numbers sort
/// as `0`, which is also what "disc 1" collapses to after the `+1`.
fn sort_key(entry: &Arc<LibraryEntry>) -> (u64, String) {
    let disc = entry.disc_number.unwrap_or(0) as u64;
    let track = entry.track_number.unwrap_or(0) as u64;
    ((disc + 1) * 10000 + track, entry.title.as_str().to_lowercase())
}

/// §4.11 Artists/Genres: one node per bucket, with one album subnode per
/// album belonging to that bucket (grouped from the bucket's flat member
/// list by each entry's own `album` handle, since a Collection only stores
/// one axis directly).
fn build_grouped(collection: &super::entry::Collection, selected: &Option<std::collections::HashSet<&str>>) -> LibraryItem {
    let mut top_nodes = Vec::new();
    for (bucket_key, entries) in collection.buckets() {
        let mut album_order: Vec<Handle> = Vec::new();
        let mut album_groups: HashMap<Handle, Vec<Arc<LibraryEntry>>> = HashMap::new();
        for entry in entries.iter().filter(|e| entry_selected(e, selected)) {
            if !album_groups.contains_key(&entry.album) {
                album_order.push(entry.album.clone());
            }
            album_groups.entry(entry.album.clone()).or_default().push(entry.clone());
        }
        let mut album_nodes = Vec::new();
        for album_key in &album_order {
            let mut tracks = album_groups.remove(album_key).unwrap_or_default();
            tracks.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
            let label = album_label(&tracks[0]);
            let children = tracks
                .into_iter()
                .map(|e| LibraryItem::leaf(track_label(&e), e))
                .collect();
            album_nodes.push(LibraryItem::branch(label, children));
        }
        if album_nodes.is_empty() {
            continue;
        }
        top_nodes.push(LibraryItem::branch(bucket_key.as_str().to_string(), album_nodes));
    }
    LibraryItem::branch("root".to_string(), top_nodes)
}

/// §4.11 Folders: mirror the `FolderTree`; subfolders before tracks;
/// descendant-less folder nodes are dropped.
fn build_folders(node: &FolderNode, selected: &Option<std::collections::HashSet<&str>>) -> LibraryItem {
    let mut children: Vec<LibraryItem> =
        node.children.iter().filter_map(|c| build_folders_opt(c, selected)).collect();
    let mut tracks: Vec<&Arc<LibraryEntry>> =
        node.tracks.iter().filter(|e| entry_selected(e, selected)).collect();
    tracks.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    children.extend(tracks.into_iter().map(|e| LibraryItem::leaf(track_label(e), e.clone())));
    LibraryItem::branch(node.name.as_str().to_string(), children)
}

fn build_folders_opt(
    node: &FolderNode,
    selected: &Option<std::collections::HashSet<&str>>,
) -> Option<LibraryItem> {
    let item = build_folders(node, selected);
    if item.children.is_empty() { None } else { Some(item) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::index::Index;
    use crate::library::playlist::{Playlist, TrackMeta};
    use std::path::PathBuf;

    fn sample_index() -> (Index, Playlist) {
        let interner = Interner::new();
        let mut playlist = Playlist::new();
        let mut a = TrackMeta::new("/M/a.mp3");
        a.title = Some("Song A".into());
        a.artist = Some("Artist".into());
        a.album = Some("Album".into());
        playlist.push(a);
        let mut b = TrackMeta::new("/M/sub/b.mp3");
        b.title = Some("Song B".into());
        playlist.push(b);
        Index::build(&playlist, &[PathBuf::from("/M")], &interner)
    }

    #[test]
    fn folder_tree_has_root_and_subfolder() {
        let (index, playlist) = sample_index();
        let tree = build(&index, &playlist, Selector::Folders, None);
        assert_eq!(tree.children.len(), 2); // one leaf + one subfolder node
    }

    #[test]
    fn albums_tree_groups_by_album_key() {
        let (index, playlist) = sample_index();
        let tree = build(&index, &playlist, Selector::Albums, None);
        assert!(tree.children.iter().any(|c| c.text.contains("Album")));
    }

    #[test]
    fn album_children_sort_by_disc_and_track_number() {
        let interner = Interner::new();
        let mut playlist = Playlist::new();
        let mut t2 = TrackMeta::new("/M/02.mp3");
        t2.title = Some("Zebra".into());
        t2.album = Some("Album".into());
        t2.disc_number = Some(1);
        t2.track_number = Some(2);
        playlist.push(t2);
        let mut t1 = TrackMeta::new("/M/01.mp3");
        t1.title = Some("Aardvark".into());
        t1.album = Some("Album".into());
        t1.disc_number = Some(1);
        t1.track_number = Some(1);
        playlist.push(t1);
        let mut d0 = TrackMeta::new("/M/00.mp3");
        d0.title = Some("Before Disc 1".into());
        d0.album = Some("Album".into());
        d0.disc_number = Some(0);
        d0.track_number = Some(99);
        playlist.push(d0);

        let (index, playlist) = Index::build(&playlist, &[PathBuf::from("/M")], &interner);
        let tree = build(&index, &playlist, Selector::Albums, None);
        let album_node = tree.children.iter().find(|c| c.text.contains("Album")).unwrap();
        let titles: Vec<&str> = album_node.children.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(titles, vec!["99. Before Disc 1", "1. Aardvark", "2. Zebra"]);
    }

    #[test]
    fn filter_drops_nonmatching_branches() {
        let (index, playlist) = sample_index();
        let tree = build(&index, &playlist, Selector::Folders, Some("Song A"));
        let leaves: Vec<&str> = collect_leaf_texts(&tree);
        assert_eq!(leaves, vec!["Song A"]);
    }

    fn collect_leaf_texts<'a>(item: &'a LibraryItem) -> Vec<&'a str> {
        let mut out = Vec::new();
        if item.track.is_some() {
            out.push(item.text.as_str());
        }
        for child in &item.children {
            out.extend(collect_leaf_texts(child));
        }
        out
    }
}
