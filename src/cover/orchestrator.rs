//! Artwork orchestrator (component H, §4.8) — the public entry point for
//! the whole artwork subsystem.
//!
//! Three execution contexts, as specified in §5:
//! - *sync*: generation/cancel counters, listener table — plain atomics
//!   and a `Mutex`, since their critical sections are all non-blocking.
//! - *process*: LRU lookup and squash decision — guarded by a `Mutex` so
//!   only one query is being dispatched at a time, mirroring "serial" via
//!   single-owner access rather than a dedicated task.
//! - *fetch*: the probe chain itself, bounded by a [`Semaphore`] sized at
//!   `fetch_concurrent_limit`; many of these run concurrently.
//!
//! A job captures its `generation` at submission and checks it against
//! `cancel_at` at three checkpoints (§4.8, §5): before probing, after
//! acquiring a fetch permit, and before publishing the result. `reset()`
//! bumps `cancel_at` to the last-issued generation, aborting every
//! in-flight job at its next checkpoint.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, Semaphore, oneshot};

use crate::config::ArtworkConfig;

use super::cache::{CacheStatus, DiskCoverCache};
use super::lru::CoverLru;
use super::probes::{self, ProbeOutcome};
use super::remote::{ProbeError, ProbeKey, RemoteCoverProbe};
use super::sidecar::SiblingScanner;
use super::squasher::{SubmitOutcome, Squasher};
use super::{CoverEvent, CoverInfo, CoverPayload, CoverQuery, TrackRef};

type ListenerFn = Arc<dyn Fn(CoverEvent) + Send + Sync>;

const MAX_LISTENERS: usize = 100;

struct Listener {
    id: u64,
    callback: ListenerFn,
}

struct Inner {
    config: Mutex<ArtworkConfig>,
    lru: AsyncMutex<CoverLru>,
    squasher: AsyncMutex<Squasher>,
    disk_cache: DiskCoverCache,
    generation: AtomicI64,
    cancel_at: AtomicI64,
    fetch_semaphore: Semaphore,
    remote_probes: Vec<Arc<dyn RemoteCoverProbe>>,
    wos_probe: Option<Arc<dyn RemoteCoverProbe>>,
    listeners: Mutex<Vec<Listener>>,
    next_listener_id: AtomicU64,
}

/// The artwork subsystem's public handle (§6 "Artwork public operations").
#[derive(Clone)]
pub struct ArtworkResolver {
    inner: Arc<Inner>,
}

impl ArtworkResolver {
    pub fn new(config: ArtworkConfig, cache_root: PathBuf) -> Self {
        Self::with_probes(config, cache_root, Vec::new(), None)
    }

    /// Construct with explicit remote-probe adapters, so tests (and
    /// hosts with different configured services) can supply mocks
    /// without this crate reaching into global state (§9 "Global plugin
    /// singletons" redesign flag).
    pub fn with_probes(
        config: ArtworkConfig,
        cache_root: PathBuf,
        remote_probes: Vec<Arc<dyn RemoteCoverProbe>>,
        wos_probe: Option<Arc<dyn RemoteCoverProbe>>,
    ) -> Self {
        let permits = config.fetch_concurrent_limit.max(1);
        Self {
            inner: Arc::new(Inner {
                config: Mutex::new(config),
                lru: AsyncMutex::new(CoverLru::new()),
                squasher: AsyncMutex::new(Squasher::new()),
                disk_cache: DiskCoverCache::new(cache_root),
                generation: AtomicI64::new(0),
                cancel_at: AtomicI64::new(-1),
                fetch_semaphore: Semaphore::new(permits),
                remote_probes,
                wos_probe,
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
            }),
        }
    }

    fn config(&self) -> ArtworkConfig {
        self.inner.config.lock().expect("config mutex poisoned").clone()
    }

    pub fn set_config(&self, config: ArtworkConfig) {
        *self.inner.config.lock().expect("config mutex poisoned") = config;
    }

    /// Resolve `query`'s cover art. The returned `CoverInfo` always has
    /// `cover_found` set correctly; a Rust `async fn` resolving once is
    /// this crate's realization of "callback invoked exactly once" (§6).
    pub async fn cover_get(&self, query: CoverQuery) -> Arc<CoverInfo> {
        let submit_generation = self.inner.generation.load(Ordering::SeqCst);

        if let Some(hit) = self.inner.lru.lock().await.get(&query.track.uri) {
            return hit;
        }

        let (tx, rx) = oneshot::channel();
        let outcome = self.inner.squasher.lock().await.submit(query.clone(), tx);

        match outcome {
            SubmitOutcome::Absorbed => rx.await.unwrap_or_else(|_| Arc::new(CoverInfo::not_found(query.track.uri.clone()))),
            SubmitOutcome::Lead { id, query } => {
                let info = self.run_job(query, submit_generation).await;
                self.inner.squasher.lock().await.complete(id, info.clone());
                info
            }
        }
    }

    /// Cancel every pending/in-flight job (§4.8 `reset()`, §6).
    pub fn reset(&self) {
        let previous = self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.cancel_at.store(previous, Ordering::SeqCst);
    }

    fn is_cancelled(&self, generation: i64) -> bool {
        generation <= self.inner.cancel_at.load(Ordering::SeqCst)
    }

    pub fn add_listener(&self, callback: ListenerFn) -> Result<u64, super::CoverError> {
        let mut listeners = self.inner.listeners.lock().expect("listener mutex poisoned");
        if listeners.len() >= MAX_LISTENERS {
            return Err(super::CoverError::ListenerTableFull);
        }
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::SeqCst);
        listeners.push(Listener { id, callback });
        Ok(id)
    }

    pub fn remove_listener(&self, id: u64) {
        self.inner.listeners.lock().expect("listener mutex poisoned").retain(|l| l.id != id);
    }

    fn notify(&self, event: CoverEvent) {
        let listeners = self.inner.listeners.lock().expect("listener mutex poisoned");
        for listener in listeners.iter() {
            (listener.callback)(event.clone());
        }
    }

    /// Runs the probe chain for the lead query of one squash group (§4.8).
    async fn run_job(&self, query: CoverQuery, generation: i64) -> Arc<CoverInfo> {
        let track = query.track.clone();
        let config = self.config();

        // Checkpoint 1: before probing.
        if self.is_cancelled(generation) {
            return Arc::new(CoverInfo::not_found(track.uri.clone()));
        }

        let uncached = config.disable_cache || query.flags.contains(super::CoverQueryFlags::UNCACHED);
        let cache_path = if uncached {
            None
        } else {
            self.inner
                .disk_cache
                .path_for(track.artist.as_deref(), track.album.as_deref(), Some(&track.uri))
                .ok()
        };

        // A disk cache hit is reused directly; a negative placeholder is a
        // prior total failure and short-circuits the chain the same way
        // (§4.5). Only a genuine miss runs the probes below.
        if let Some(path) = &cache_path {
            match self.inner.disk_cache.status(path) {
                CacheStatus::Hit => {
                    return self
                        .publish(
                            CoverInfo {
                                filepath: track.uri.clone(),
                                album: track.album.clone(),
                                artist: track.artist.clone(),
                                title: track.title.clone(),
                                payload: Some(CoverPayload::Disk(path.clone())),
                                cover_found: true,
                                timestamp: 0,
                            },
                            generation,
                        )
                        .await;
                }
                CacheStatus::NegativePlaceholder => {
                    return self
                        .publish(CoverInfo::not_found(track.uri.clone()), generation)
                        .await;
                }
                CacheStatus::Miss => {}
            }
        }

        if let Some(found) = self.probe_local(&track, &config, cache_path.as_deref()) {
            return self.publish(found, generation).await;
        }

        if uncached {
            // Disk caching disabled: web lookups require a landing path (§4.8 step 4).
            return self
                .publish(CoverInfo::not_found(track.uri.clone()), generation)
                .await;
        }

        // Checkpoint 2: after acquiring a fetch permit.
        let _permit = self.inner.fetch_semaphore.acquire().await.ok();
        if self.is_cancelled(generation) {
            return Arc::new(CoverInfo::not_found(track.uri.clone()));
        }

        match self.probe_remote(&track, &config).await {
            RemoteOutcome::Found(bytes) => {
                let path = cache_path.expect("cache_path is Some when !uncached");
                if let Err(e) = tokio::task::spawn_blocking({
                    let path = path.clone();
                    move || {
                        if let Some(parent) = path.parent() {
                            std::fs::create_dir_all(parent)?;
                        }
                        std::fs::write(path, &bytes)
                    }
                })
                .await
                .unwrap_or_else(|e| Err(std::io::Error::other(e)))
                {
                    tracing::warn!(error = %e, "failed to write fetched cover to disk cache");
                    return self
                        .publish(CoverInfo::not_found(track.uri.clone()), generation)
                        .await;
                }
                if config.save_to_music_folders {
                    if let Some(dir) = track.local_path.as_ref().and_then(|p| p.parent()) {
                        let sibling = dir.join("cover.jpg");
                        if !sibling.exists() {
                            let _ = std::fs::copy(&path, &sibling);
                        }
                    }
                }
                self.publish(
                    CoverInfo {
                        filepath: track.uri.clone(),
                        album: track.album.clone(),
                        artist: track.artist.clone(),
                        title: track.title.clone(),
                        payload: Some(CoverPayload::Disk(path)),
                        cover_found: true,
                        timestamp: 0,
                    },
                    generation,
                )
                .await
            }
            RemoteOutcome::Cancelled => Arc::new(CoverInfo::not_found(track.uri.clone())),
            RemoteOutcome::NotFound => {
                if let Some(path) = &cache_path {
                    if let Err(e) = self.inner.disk_cache.write_placeholder(path) {
                        tracing::warn!(error = %e, "failed to write negative placeholder");
                    }
                }
                self.publish(CoverInfo::not_found(track.uri.clone()), generation)
                    .await
            }
        }
    }

    /// Local-only portion of the probe chain (§4.8 steps 2–3): sibling
    /// scan, then embedded tags. Synchronous and fast enough to run
    /// inline; the caller still checkpoints around it.
    fn probe_local(
        &self,
        track: &TrackRef,
        config: &ArtworkConfig,
        cache_path: Option<&Path>,
    ) -> Option<CoverInfo> {
        let Some(local_path) = &track.local_path else {
            return None;
        };

        if config.enable_localfolder {
            let scanner = SiblingScanner::new(&config.filemask, &config.folders);
            if let Some(found) = scanner.find(local_path) {
                return Some(CoverInfo {
                    filepath: track.uri.clone(),
                    album: track.album.clone(),
                    artist: track.artist.clone(),
                    title: track.title.clone(),
                    payload: Some(CoverPayload::Disk(found)),
                    cover_found: true,
                    timestamp: 0,
                });
            }
        }

        if config.enable_embedded {
            let out_path = if config.disable_cache { None } else { cache_path };
            match probes::run_embedded_chain(local_path, out_path) {
                ProbeOutcome::Disk(path) => {
                    return Some(CoverInfo {
                        filepath: track.uri.clone(),
                        album: track.album.clone(),
                        artist: track.artist.clone(),
                        title: track.title.clone(),
                        payload: Some(CoverPayload::Disk(path)),
                        cover_found: true,
                        timestamp: 0,
                    });
                }
                ProbeOutcome::Blob { bytes, offset, size } => {
                    return Some(CoverInfo {
                        filepath: track.uri.clone(),
                        album: track.album.clone(),
                        artist: track.artist.clone(),
                        title: track.title.clone(),
                        payload: Some(CoverPayload::Blob { bytes, offset, size }),
                        cover_found: true,
                        timestamp: 0,
                    });
                }
                ProbeOutcome::NotFound | ProbeOutcome::Error(_) => {}
            }
        }

        None
    }

    /// Remote portion of the probe chain (§4.8 step 5): `.ay` files are
    /// keyed by title via the WoS probe alone; otherwise the configured
    /// subset of services is tried in order, with one parenthetical-strip
    /// retry on total failure (§4.4).
    async fn probe_remote(&self, track: &TrackRef, config: &ArtworkConfig) -> RemoteOutcome {
        let is_ay = track
            .local_path
            .as_ref()
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("ay"))
            .unwrap_or(false);

        if is_ay {
            let Some(wos) = &self.inner.wos_probe else {
                return RemoteOutcome::NotFound;
            };
            let key = ProbeKey::Title(track.title.clone().unwrap_or_default());
            return match wos.fetch(&key).await {
                Ok(bytes) => RemoteOutcome::Found(bytes.to_vec()),
                Err(ProbeError::Cancelled) => RemoteOutcome::Cancelled,
                Err(_) => RemoteOutcome::NotFound,
            };
        }

        if !config.enable_lastfm {
            return RemoteOutcome::NotFound;
        }

        let artist = track.artist.clone().unwrap_or_default();
        let album = track.album.clone().unwrap_or_default();
        let retry_album = strip_for_retry(&album);
        for attempt_album in [Some(album.clone()), retry_album].into_iter().flatten() {
            let key = ProbeKey::ArtistAlbum {
                artist: artist.clone(),
                album: attempt_album,
            };
            for probe in &self.inner.remote_probes {
                match probe.fetch(&key).await {
                    Ok(bytes) => return RemoteOutcome::Found(bytes.to_vec()),
                    Err(ProbeError::Cancelled) => return RemoteOutcome::Cancelled,
                    Err(_) => continue,
                }
            }
        }
        RemoteOutcome::NotFound
    }

    /// Checkpoint 3 (before publishing), then install into the LRU.
    async fn publish(&self, info: CoverInfo, generation: i64) -> Arc<CoverInfo> {
        if self.is_cancelled(generation) {
            return Arc::new(CoverInfo::not_found(info.filepath));
        }
        self.inner.lru.lock().await.insert(info)
    }

    pub fn notify_settings_changed(&self, track: Option<Arc<TrackRef>>) {
        self.notify(CoverEvent::SettingsDidChange(track));
    }
}

enum RemoteOutcome {
    Found(Vec<u8>),
    Cancelled,
    NotFound,
}

fn strip_for_retry(album: &str) -> Option<String> {
    super::remote::strip_trailing_annotation(album)
}
