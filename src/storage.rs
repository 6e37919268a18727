use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::CacheReadError;

/// Nombre del directorio de caché bajo `~/.cache`
pub const CACHE_DIR_NAME: &str = "music-on-done";

/// Rutas de caché de una playlist concreta
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePaths {
    pub playlist_cache_file: PathBuf,
    pub stream_cache_file: PathBuf,
}

impl CachePaths {
    /// Paths under the default cache directory (`~/.cache/music-on-done`).
    pub fn for_playlist(playlist_url: &str) -> Self {
        Self::in_dir(default_cache_dir(), playlist_url)
    }

    /// Paths namespaced by a hash of the playlist URL, so two playlists never
    /// share cache files.
    pub fn in_dir(cache_dir: PathBuf, playlist_url: &str) -> Self {
        let hash = short_hash(playlist_url);
        Self {
            playlist_cache_file: cache_dir.join(format!("playlist-{}.json", hash)),
            stream_cache_file: cache_dir.join(format!("streams-{}.json", hash)),
        }
    }
}

pub fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".cache")
        .join(CACHE_DIR_NAME)
}

/// Primeros 8 caracteres hex del SHA-256 de la entrada
pub fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(digest)[..8].to_string()
}

/// Lee y deserializa un archivo JSON
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CacheReadError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|source| CacheReadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    serde_json::from_str(&content).map_err(|source| CacheReadError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Escribe un valor como JSON legible, creando el directorio si hace falta.
/// Reemplaza por completo el contenido anterior.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).await?;
    debug!("💾 Guardado {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_short_hash_is_stable_and_short() {
        let a = short_hash("https://www.youtube.com/playlist?list=abc");
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, short_hash("https://www.youtube.com/playlist?list=abc"));
        assert_ne!(a, short_hash("https://www.youtube.com/playlist?list=abd"));
    }

    #[test]
    fn test_known_hash_prefix() {
        // sha256("hello") = 2cf24dba...
        assert_eq!(short_hash("hello"), "2cf24dba");
    }

    #[test]
    fn test_paths_are_namespaced_per_playlist() {
        let a = CachePaths::in_dir(PathBuf::from("/tmp/c"), "list-a");
        let b = CachePaths::in_dir(PathBuf::from("/tmp/c"), "list-b");

        assert_ne!(a.playlist_cache_file, b.playlist_cache_file);
        assert_ne!(a.stream_cache_file, b.stream_cache_file);
        assert_eq!(
            a.playlist_cache_file,
            PathBuf::from(format!("/tmp/c/playlist-{}.json", short_hash("list-a")))
        );
        assert_eq!(
            a.stream_cache_file,
            PathBuf::from(format!("/tmp/c/streams-{}.json", short_hash("list-a")))
        );
    }

    #[tokio::test]
    async fn test_write_creates_parent_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sample.json");
        let value = Sample {
            name: "x".to_string(),
            count: 3,
        };

        write_json(&path, &value).await.unwrap();
        let read: Sample = read_json(&path).await.unwrap();
        assert_eq!(read, value);
    }

    #[tokio::test]
    async fn test_read_errors_are_classified() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let err = read_json::<Sample>(&missing).await.unwrap_err();
        assert!(err.is_missing());

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ nope").await.unwrap();
        let err = read_json::<Sample>(&broken).await.unwrap_err();
        assert!(matches!(err, CacheReadError::Malformed { .. }));
        assert!(!err.is_missing());
    }
}
