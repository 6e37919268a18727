use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use super::within_ttl;
use crate::config::Config;
use crate::error::{CacheReadError, FetchError};
use crate::sources::{PlaylistEntry, PlaylistFetcher};
use crate::storage;

/// Snapshot de una playlist guardado en disco
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistCache {
    pub entries: Vec<PlaylistEntry>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub fetched_at: DateTime<Utc>,
    pub playlist_url: String,
}

impl PlaylistCache {
    pub fn new(entries: Vec<PlaylistEntry>, playlist_url: impl Into<String>) -> Self {
        Self {
            entries,
            fetched_at: Utc::now(),
            playlist_url: playlist_url.into(),
        }
    }

    /// Valid iff it belongs to the configured playlist and is younger than
    /// the configured TTL.
    pub fn is_valid(&self, config: &Config) -> bool {
        self.is_valid_at(config, Utc::now())
    }

    pub fn is_valid_at(&self, config: &Config, now: DateTime<Utc>) -> bool {
        self.playlist_url == config.playlist_url
            && within_ttl(self.fetched_at, now, config.cache_ttl_minutes)
    }
}

pub async fn try_read_cache(path: &Path) -> Result<PlaylistCache, CacheReadError> {
    storage::read_json(path).await
}

/// Lee la caché; `None` si falta o está corrupta
pub async fn read_cache(path: &Path) -> Option<PlaylistCache> {
    match try_read_cache(path).await {
        Ok(cache) => Some(cache),
        Err(e) if e.is_missing() => None,
        Err(e) => {
            debug!("🗑️ Caché de playlist ignorada: {}", e);
            None
        }
    }
}

pub async fn write_cache(path: &Path, cache: &PlaylistCache) -> std::io::Result<()> {
    storage::write_json(path, cache).await
}

/// Devuelve las entradas cacheadas si son válidas; si no, las obtiene de nuevo
/// y reescribe la caché.
pub async fn get_or_fetch(
    config: &Config,
    path: &Path,
    fetcher: &dyn PlaylistFetcher,
) -> Result<Vec<PlaylistEntry>, FetchError> {
    if let Some(cache) = read_cache(path).await {
        if cache.is_valid(config) {
            debug!("⚡ Playlist desde caché ({} tracks)", cache.entries.len());
            return Ok(cache.entries);
        }
        debug!("⌛ Caché de playlist expirada o de otra playlist");
    }

    let entries = fetcher.fetch(&config.playlist_url).await?;
    let cache = PlaylistCache::new(entries, config.playlist_url.clone());

    if let Err(e) = write_cache(path, &cache).await {
        warn!("⚠️ No se pudo guardar la caché de playlist: {}", e);
    } else {
        info!("💾 Caché de playlist actualizada ({} tracks)", cache.entries.len());
    }

    Ok(cache.entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockPlaylistFetcher;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    const URL: &str = "https://www.youtube.com/playlist?list=test";

    fn config() -> Config {
        Config {
            playlist_url: URL.to_string(),
            cache_ttl_minutes: 60,
            ..Config::default()
        }
    }

    fn entries() -> Vec<PlaylistEntry> {
        vec![
            PlaylistEntry::new("a", "Song A", 200, "https://www.youtube.com/watch?v=a"),
            PlaylistEntry::new("b", "Song B", 0, "https://www.youtube.com/watch?v=b"),
        ]
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("playlist.json");
        let cache = PlaylistCache::new(entries(), URL);

        write_cache(&path, &cache).await.unwrap();
        // ts_milliseconds trunca a milisegundos
        let expected = PlaylistCache {
            fetched_at: DateTime::from_timestamp_millis(cache.fetched_at.timestamp_millis()).unwrap(),
            ..cache
        };
        assert_eq!(read_cache(&path).await, Some(expected));
    }

    #[tokio::test]
    async fn test_json_layout_uses_camel_case_millis() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playlist.json");
        tokio::fs::write(
            &path,
            r#"{"entries":[{"id":"a","title":"A","duration":3,"url":"u"}],"fetchedAt":1700000000000,"playlistUrl":"p"}"#,
        )
        .await
        .unwrap();

        let cache = read_cache(&path).await.unwrap();
        assert_eq!(cache.fetched_at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(cache.playlist_url, "p");
        assert_eq!(cache.entries, vec![PlaylistEntry::new("a", "A", 3, "u")]);
    }

    #[tokio::test]
    async fn test_missing_or_malformed_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playlist.json");
        assert_eq!(read_cache(&path).await, None);

        tokio::fs::write(&path, "[1, 2").await.unwrap();
        assert_eq!(read_cache(&path).await, None);
        assert!(matches!(
            try_read_cache(&path).await,
            Err(CacheReadError::Malformed { .. })
        ));
    }

    #[test]
    fn test_validity_ttl_boundary() {
        let now = Utc::now();
        let mut cache = PlaylistCache::new(entries(), URL);

        cache.fetched_at = now - Duration::minutes(60);
        assert!(!cache.is_valid_at(&config(), now));

        cache.fetched_at = now - Duration::minutes(59);
        assert!(cache.is_valid_at(&config(), now));
    }

    #[test]
    fn test_validity_requires_same_playlist() {
        let cache = PlaylistCache::new(entries(), "https://www.youtube.com/playlist?list=other");
        assert!(!cache.is_valid(&config()));
    }

    #[tokio::test]
    async fn test_valid_cache_skips_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playlist.json");
        write_cache(&path, &PlaylistCache::new(entries(), URL)).await.unwrap();

        let mut fetcher = MockPlaylistFetcher::new();
        fetcher.expect_fetch().times(0);

        let got = get_or_fetch(&config(), &path, &fetcher).await.unwrap();
        assert_eq!(got, entries());
    }

    #[tokio::test]
    async fn test_expired_cache_refetches_and_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playlist.json");
        let mut stale = PlaylistCache::new(vec![], URL);
        stale.fetched_at = Utc::now() - Duration::minutes(120);
        write_cache(&path, &stale).await.unwrap();

        let mut fetcher = MockPlaylistFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|url| url == URL)
            .times(1)
            .returning(|_| Ok(entries()));

        let got = get_or_fetch(&config(), &path, &fetcher).await.unwrap();
        assert_eq!(got, entries());

        let rewritten = read_cache(&path).await.unwrap();
        assert_eq!(rewritten.entries, entries());
        assert!(rewritten.is_valid(&config()));
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playlist.json");

        let mut fetcher = MockPlaylistFetcher::new();
        fetcher
            .expect_fetch()
            .times(1)
            .returning(|_| Err(FetchError::Failed("network down".to_string())));

        let err = get_or_fetch(&config(), &path, &fetcher).await.unwrap_err();
        assert!(matches!(err, FetchError::Failed(_)));
        assert_eq!(read_cache(&path).await, None);
    }
}
