//! Library source lifecycle (component L, §4.12) plus the §6 "Library
//! public operations" surface.
//!
//! Mirrors [`crate::cover::orchestrator::ArtworkResolver`]'s concurrency
//! shape: atomics for the generation/cancel barrier and state, a
//! `std::sync::Mutex` for the small synchronously-read bits (folder list,
//! listeners), and a `tokio::sync::Mutex` serializing the one thing that's
//! actually expensive to hold exclusively — the index and canonical
//! playlist.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio::sync::Mutex as AsyncMutex;

use crate::interner::Interner;
use crate::metadata;
use crate::scanner;

use super::LibraryError;
use super::index::Index;
use super::persistence;
use super::playlist::{Playlist, TrackMeta};
use super::scanfilter::{self, ScanDecision};
use super::tree::{self, LibraryItem, Selector};

const MAX_LISTENERS: usize = 10;

/// §4.12's state machine, plus `Idle` as the resting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Idle,
    Loading,
    Indexing,
    Scanning,
    Saving,
}

/// Library event kinds delivered to listeners (§6).
#[derive(Debug, Clone)]
pub enum LibraryEvent {
    ContentDidChange,
    StateDidChange(SourceState),
    EnabledDidChange(bool),
    SelectorsDidChange,
    FoldersDidChange,
}

type ListenerFn = Arc<dyn Fn(LibraryEvent) + Send + Sync>;

struct Listener {
    id: u64,
    callback: ListenerFn,
}

struct Data {
    playlist: Playlist,
    index: Index,
}

struct Inner {
    source_conf_prefix: String,
    interner: Arc<Interner>,
    playlist_path: PathBuf,
    paths: Mutex<Vec<PathBuf>>,
    enabled: AtomicBool,
    state: Mutex<SourceState>,
    generation: AtomicI64,
    cancel_at: AtomicI64,
    terminate: AtomicBool,
    file_operations_enabled: AtomicBool,
    data: AsyncMutex<Data>,
    listeners: Mutex<Vec<Listener>>,
    next_listener_id: AtomicU64,
}

/// A single library instance (§3 Source). Cheap to clone; clones share
/// the same underlying state.
#[derive(Clone)]
pub struct LibrarySource {
    inner: Arc<Inner>,
}

impl LibrarySource {
    pub fn new(config: &crate::config::LibraryConfig, interner: Arc<Interner>, playlist_path: PathBuf) -> Self {
        let empty_index = Index::build(&Playlist::new(), &[], &interner).0;
        Self {
            inner: Arc::new(Inner {
                source_conf_prefix: config.source_conf_prefix.clone(),
                interner,
                playlist_path,
                paths: Mutex::new(config.paths.clone()),
                enabled: AtomicBool::new(config.enabled),
                state: Mutex::new(SourceState::Idle),
                generation: AtomicI64::new(0),
                cancel_at: AtomicI64::new(-1),
                terminate: AtomicBool::new(false),
                file_operations_enabled: AtomicBool::new(true),
                data: AsyncMutex::new(Data { playlist: Playlist::new(), index: empty_index }),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn source_conf_prefix(&self) -> &str {
        &self.inner.source_conf_prefix
    }

    pub fn enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// §6 `set_source_enabled`. Disabling forces `scanner_terminate=true`
    /// and fires `ENABLED_DID_CHANGE` + `CONTENT_DID_CHANGE` (§4.12).
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.inner.terminate.store(true, Ordering::SeqCst);
        }
        self.notify(LibraryEvent::EnabledDidChange(enabled));
        self.notify(LibraryEvent::ContentDidChange);
    }

    pub fn folders(&self) -> Vec<PathBuf> {
        self.inner.paths.lock().expect("paths mutex poisoned").clone()
    }

    pub fn set_folders(&self, folders: Vec<PathBuf>) {
        *self.inner.paths.lock().expect("paths mutex poisoned") = folders;
        self.notify(LibraryEvent::FoldersDidChange);
    }

    pub fn append_folder(&self, path: PathBuf) {
        self.inner.paths.lock().expect("paths mutex poisoned").push(path);
        self.notify(LibraryEvent::FoldersDidChange);
    }

    pub fn insert_folder_at_index(&self, index: usize, path: PathBuf) -> Result<(), LibraryError> {
        let mut paths = self.inner.paths.lock().expect("paths mutex poisoned");
        if index > paths.len() {
            return Err(LibraryError::FolderIndexOutOfRange(index));
        }
        paths.insert(index, path);
        drop(paths);
        self.notify(LibraryEvent::FoldersDidChange);
        Ok(())
    }

    pub fn remove_folder_at_index(&self, index: usize) -> Result<PathBuf, LibraryError> {
        let mut paths = self.inner.paths.lock().expect("paths mutex poisoned");
        if index >= paths.len() {
            return Err(LibraryError::FolderIndexOutOfRange(index));
        }
        let removed = paths.remove(index);
        drop(paths);
        self.notify(LibraryEvent::FoldersDidChange);
        Ok(removed)
    }

    pub fn folder_count(&self) -> usize {
        self.inner.paths.lock().expect("paths mutex poisoned").len()
    }

    pub fn folder_at_index(&self, index: usize) -> Option<PathBuf> {
        self.inner.paths.lock().expect("paths mutex poisoned").get(index).cloned()
    }

    /// §6 `get_selectors_list`: the fixed axis set.
    pub fn selectors() -> [Selector; 4] {
        Selector::ALL
    }

    pub fn state(&self) -> SourceState {
        *self.inner.state.lock().expect("state mutex poisoned")
    }

    pub fn enable_file_operations(&self, enabled: bool) {
        self.inner.file_operations_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn add_listener(&self, callback: ListenerFn) -> Result<u64, LibraryError> {
        let mut listeners = self.inner.listeners.lock().expect("listener mutex poisoned");
        if listeners.len() >= MAX_LISTENERS {
            return Err(LibraryError::ListenerTableFull);
        }
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::SeqCst);
        listeners.push(Listener { id, callback });
        Ok(id)
    }

    pub fn remove_listener(&self, id: u64) {
        self.inner.listeners.lock().expect("listener mutex poisoned").retain(|l| l.id != id);
    }

    fn notify(&self, event: LibraryEvent) {
        let callbacks: Vec<ListenerFn> = self
            .inner
            .listeners
            .lock()
            .expect("listener mutex poisoned")
            .iter()
            .map(|l| l.callback.clone())
            .collect();
        for callback in callbacks {
            callback(event.clone());
        }
    }

    fn set_state(&self, state: SourceState) {
        *self.inner.state.lock().expect("state mutex poisoned") = state;
        self.notify(LibraryEvent::StateDidChange(state));
    }

    fn is_cancelled(&self, generation: i64) -> bool {
        generation <= self.inner.cancel_at.load(Ordering::SeqCst)
    }

    /// §6 `refresh`. Aborts any in-flight scan at its next checkpoint
    /// (§4.12): bumping `generation` and setting `cancel_at` to the
    /// previous value makes every earlier job's checkpoint check fail.
    pub async fn refresh(&self) -> Result<(), LibraryError> {
        if !self.enabled() {
            return Ok(());
        }
        let previous = self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.cancel_at.store(previous, Ordering::SeqCst);
        let generation = previous + 1;
        self.inner.terminate.store(false, Ordering::SeqCst);
        self.run_cycle(generation).await
    }

    async fn run_cycle(&self, generation: i64) -> Result<(), LibraryError> {
        if self.is_cancelled(generation) {
            return Ok(());
        }

        self.set_state(SourceState::Loading);
        let mut playlist = if self.inner.file_operations_enabled.load(Ordering::SeqCst) {
            persistence::load_playlist(&self.inner.playlist_path).map_err(LibraryError::Persistence)?
        } else {
            Playlist::new()
        };

        if self.is_cancelled(generation) {
            return Ok(());
        }

        self.set_state(SourceState::Indexing);
        let monitored_paths = self.folders();
        let (_, rebuilt) = Index::build(&playlist, &monitored_paths, &self.inner.interner);
        playlist = rebuilt;

        if self.is_cancelled(generation) {
            return Ok(());
        }

        self.set_state(SourceState::Scanning);
        playlist = self.scan(playlist, &monitored_paths, generation).await?;

        if self.is_cancelled(generation) {
            return Ok(());
        }

        self.set_state(SourceState::Indexing);
        let (index, playlist) = Index::build(&playlist, &monitored_paths, &self.inner.interner);

        if self.is_cancelled(generation) {
            return Ok(());
        }

        self.set_state(SourceState::Saving);
        if self.inner.file_operations_enabled.load(Ordering::SeqCst) {
            persistence::save_playlist(&playlist, &self.inner.playlist_path)
                .map_err(LibraryError::Persistence)?;
        }

        {
            let mut data = self.inner.data.lock().await;
            data.playlist = playlist;
            data.index = index;
        }

        self.set_state(SourceState::Idle);
        self.notify(LibraryEvent::ContentDidChange);
        Ok(())
    }

    /// Walk every monitored root; reparse only files component J marks
    /// stale, moving up-to-date entries straight over from `old` (§4.10).
    /// Cooperatively checks `scanner_terminate` and the generation barrier
    /// on every file (§4.12, §5).
    async fn scan(&self, mut old: Playlist, monitored_paths: &[PathBuf], generation: i64) -> Result<Playlist, LibraryError> {
        let mut new_playlist = Playlist::new();
        for root in monitored_paths {
            let mut paths = scanner::scan(root.clone());
            while let Some(path) = paths.next().await {
                if self.inner.terminate.load(Ordering::SeqCst) || self.is_cancelled(generation) {
                    return Ok(old);
                }
                let uri = path.to_string_lossy().to_string();
                let mtime = metadata::mtime_secs(&path);
                let existing = old.find_by_uri(&uri);
                let known = existing.is_some();
                let scan_time = existing.and_then(|t| t.scan_time);

                match scanfilter::classify(known, mtime, scan_time) {
                    ScanDecision::Skip => {
                        for track in old.take_by_uri(&uri) {
                            new_playlist.push(track);
                        }
                    }
                    ScanDecision::Include => {
                        old.take_by_uri(&uri);
                        match metadata::read_tags(&path) {
                            Ok(tags) => {
                                new_playlist.push(TrackMeta::from_tags(uri, &tags, mtime, scan_marker()));
                            }
                            Err(e) => {
                                tracing::warn!("skipping unreadable track {:?}: {e}", path);
                            }
                        }
                    }
                }
            }
        }
        Ok(new_playlist)
    }

    /// §6 `create_item_tree`.
    pub async fn create_item_tree(&self, selector: Selector, filter: Option<&str>) -> LibraryItem {
        let data = self.inner.data.lock().await;
        tree::build(&data.index, &data.playlist, selector, filter)
    }

    pub async fn track_count(&self) -> usize {
        self.inner.data.lock().await.index.track_count()
    }
}

/// A monotonic scan-time marker (§4.10's `:MEDIALIB_SCAN_TIME`); only
/// needs to be comparable against file mtimes, not calendar-accurate.
fn scan_marker() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}
