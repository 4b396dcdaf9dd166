//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\medialib-core\config.toml
//! - macOS: ~/Library/Application Support/medialib-core/config.toml
//! - Linux: ~/.config/medialib-core/config.toml
//!
//! The config file is human-readable and editable. Settings are loaded at
//! startup and saved when changed by a caller (UI, CLI, or test harness).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Artwork resolver settings.
    pub artwork: ArtworkConfig,

    /// Library indexer settings.
    pub library: LibraryConfig,
}

/// Settings for the artwork resolver (component H and collaborators).
///
/// Field names and defaults mirror the configuration keys in SPEC_FULL.md
/// §6, under an `[artwork]` table rather than a flat string key/value
/// store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtworkConfig {
    /// Never write cover bytes to disk; always transfer an in-memory blob.
    pub disable_cache: bool,
    /// Copy a successfully fetched remote cover next to the track.
    pub save_to_music_folders: bool,
    /// Probe embedded tag formats (ID3v2/APEv2/MP4/FLAC).
    pub enable_embedded: bool,
    /// Probe sibling files and named subfolders.
    pub enable_localfolder: bool,
    /// Probe the configured remote services.
    pub enable_lastfm: bool,
    /// Probe the WoS service for `.ay` files (keyed by title).
    pub enable_wos: bool,
    /// Semicolon-joined glob list for sibling-file scanning.
    pub filemask: String,
    /// Semicolon-joined subfolder name list.
    pub folders: String,
    /// 0 = show nothing, 1 = show placeholder, 2 = use `nocover_path`.
    pub missing_artwork: u8,
    /// Path to the fallback "no cover" image, used when `missing_artwork == 2`.
    pub nocover_path: Option<PathBuf>,
    /// Monotonic seconds; bumping this invalidates cached artwork.
    pub cache_reset_time: i64,
    /// Number of concurrent fetch-pool workers.
    pub fetch_concurrent_limit: usize,
}

/// Default sibling-file glob masks, semicolon-joined, highest priority first.
pub const DEFAULT_FILEMASK: &str = "front.png;front.jpg;front.jpeg;folder.png;folder.jpg;folder.jpeg;cover.png;cover.jpg;cover.jpeg;f.png;f.jpg;f.jpeg;*front*.png;*front*.jpg;*front*.jpeg;*cover*.png;*cover*.jpg;*cover*.jpeg;*folder*.png;*folder*.jpg;*folder*.jpeg;*.png;*.jpg;*.jpeg";

/// Default named subfolders searched for sibling cover art.
pub const DEFAULT_FOLDERS: &str = "art;scans;covers;artwork;artworks";

impl Default for ArtworkConfig {
    fn default() -> Self {
        Self {
            disable_cache: false,
            save_to_music_folders: false,
            enable_embedded: true,
            enable_localfolder: true,
            enable_lastfm: false,
            enable_wos: false,
            filemask: DEFAULT_FILEMASK.to_string(),
            folders: DEFAULT_FOLDERS.to_string(),
            missing_artwork: 1,
            nocover_path: None,
            cache_reset_time: 0,
            fetch_concurrent_limit: 4,
        }
    }
}

/// Settings for a single media library source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Namespace prefix for this source's persisted config keys.
    pub source_conf_prefix: String,
    /// Monitored absolute directory paths, in display order.
    pub paths: Vec<PathBuf>,
    /// Whether the source participates in scans at all.
    pub enabled: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            source_conf_prefix: "medialib.default.".to_string(),
            paths: Vec::new(),
            enabled: true,
        }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("medialib-core"))
}

/// Get the full path to the config file.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Get the full path to the canonical library playlist file (§4.13).
pub fn playlist_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("medialib.dbpl"))
}

/// Load configuration from disk.
///
/// Returns default config if the file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail — callers always get a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };

    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to disk.
///
/// Creates the config directory if it doesn't exist. Writes atomically
/// (write to a temp file, then rename).
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    let path = dir.join("config.toml");

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::CreateDir(dir.clone(), e))?;

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, &path)
        .map_err(|e| ConfigError::Rename(temp_path, path.clone(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

/// Save configuration asynchronously (for use from async callers).
pub async fn save_async(config: Config) -> Result<(), ConfigError> {
    tokio::task::spawn_blocking(move || save(&config))
        .await
        .map_err(|e| ConfigError::TaskJoin(e.to_string()))?
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),

    #[error("Task join error: {0}")]
    TaskJoin(String),
}

// ============================================================================
// Tests
// ============================================================================
