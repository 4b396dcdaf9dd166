//! Persistence (component M, §4.13).
//!
//! Two artifacts: the canonical playlist file (binary, `bincode`-encoded,
//! under the config directory as `medialib.dbpl`) and the source's config
//! keys (`<prefix>paths`, `<prefix>enabled`), which piggyback on
//! [`crate::config`]'s existing TOML-backed `LibraryConfig`.

use std::path::{Path, PathBuf};

use super::playlist::Playlist;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to read playlist {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("failed to decode playlist {0}: {1}")]
    Decode(PathBuf, bincode::Error),
    #[error("failed to write playlist {0}: {1}")]
    Write(PathBuf, std::io::Error),
    #[error("failed to encode playlist: {0}")]
    Encode(bincode::Error),
    #[error("failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

/// Load the canonical playlist from `path`. A missing file is not an
/// error: it means "never saved", and yields an empty playlist (mirroring
/// [`crate::config::load`]'s "missing config is defaults" policy).
pub fn load_playlist(path: &Path) -> Result<Playlist, PersistenceError> {
    if !path.exists() {
        tracing::info!("no playlist file at {:?}, starting empty", path);
        return Ok(Playlist::new());
    }
    let bytes = std::fs::read(path).map_err(|e| PersistenceError::Read(path.to_path_buf(), e))?;
    bincode::deserialize(&bytes).map_err(|e| PersistenceError::Decode(path.to_path_buf(), e))
}

/// Write `playlist` to `path` atomically (temp file + rename), matching
/// [`crate::config::save`]'s durability pattern.
pub fn save_playlist(playlist: &Playlist, path: &Path) -> Result<(), PersistenceError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| PersistenceError::Write(path.to_path_buf(), e))?;
    }
    let bytes = bincode::serialize(playlist).map_err(PersistenceError::Encode)?;
    let temp_path = path.with_extension("dbpl.tmp");
    std::fs::write(&temp_path, &bytes).map_err(|e| PersistenceError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| PersistenceError::Rename(temp_path, path.to_path_buf(), e))?;
    tracing::info!("saved playlist to {:?} ({} tracks)", path, playlist.len());
    Ok(())
}

/// Async wrapper for use from the source's async lifecycle methods.
pub async fn save_playlist_async(playlist: Playlist, path: PathBuf) -> Result<(), PersistenceError> {
    tokio::task::spawn_blocking(move || save_playlist(&playlist, &path))
        .await
        .unwrap_or_else(|e| {
            tracing::error!("playlist save task panicked: {e}");
            Ok(())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::playlist::TrackMeta;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_as_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("medialib.dbpl");
        let playlist = load_playlist(&path).unwrap();
        assert!(playlist.is_empty());
    }

    #[test]
    fn roundtrips_through_disk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("medialib.dbpl");

        let mut playlist = Playlist::new();
        playlist.push(TrackMeta::new("/M/a.mp3"));
        save_playlist(&playlist, &path).unwrap();

        let loaded = load_playlist(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.tracks()[0].uri, "/M/a.mp3");
    }

    #[test]
    fn save_overwrites_previous_contents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("medialib.dbpl");

        let mut first = Playlist::new();
        first.push(TrackMeta::new("/M/a.mp3"));
        save_playlist(&first, &path).unwrap();

        let second = Playlist::new();
        save_playlist(&second, &path).unwrap();

        let loaded = load_playlist(&path).unwrap();
        assert!(loaded.is_empty());
    }
}
