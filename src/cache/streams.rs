use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use super::within_ttl;
use crate::audio::RandomSource;
use crate::error::CacheReadError;
use crate::sources::{PlaylistEntry, StreamResolver};
use crate::storage;

/// Las URLs de CDN caducan; 5 horas deja margen
pub const STREAM_TTL_MINUTES: u64 = 300;
/// Tamaño objetivo del pool de streams resueltos
pub const STREAM_POOL_TARGET: usize = 5;

/// URL directa ya resuelta para un track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamCacheEntry {
    pub track_id: String,
    pub track_url: String,
    pub stream_url: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub resolved_at: DateTime<Utc>,
}

impl StreamCacheEntry {
    #[allow(dead_code)]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        within_ttl(self.resolved_at, now, STREAM_TTL_MINUTES)
    }
}

/// Pool de streams de una playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamCache {
    pub entries: Vec<StreamCacheEntry>,
    pub playlist_url: String,
}

impl StreamCache {
    pub fn empty(playlist_url: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            playlist_url: playlist_url.into(),
        }
    }

    /// Returns the record if it belongs to `playlist_url`, otherwise an empty
    /// pool for it. A pool from another playlist is never reused.
    pub fn for_playlist(cache: Option<Self>, playlist_url: &str) -> Self {
        match cache {
            Some(cache) if cache.playlist_url == playlist_url => cache,
            _ => Self::empty(playlist_url),
        }
    }

    pub fn valid_entries(&self) -> Vec<&StreamCacheEntry> {
        self.valid_entries_at(Utc::now())
    }

    /// Entradas dentro del TTL, como mucho una por track
    pub fn valid_entries_at(&self, now: DateTime<Utc>) -> Vec<&StreamCacheEntry> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|entry| entry.is_valid_at(now))
            .filter(|entry| seen.insert(entry.track_id.as_str()))
            .collect()
    }
}

pub async fn try_read_stream_cache(path: &Path) -> Result<StreamCache, CacheReadError> {
    storage::read_json(path).await
}

/// Lee el pool; `None` si falta o está corrupto
pub async fn read_stream_cache(path: &Path) -> Option<StreamCache> {
    match try_read_stream_cache(path).await {
        Ok(cache) => Some(cache),
        Err(e) if e.is_missing() => None,
        Err(e) => {
            debug!("🗑️ Caché de streams ignorada: {}", e);
            None
        }
    }
}

pub async fn write_stream_cache(path: &Path, cache: &StreamCache) -> std::io::Result<()> {
    storage::write_json(path, cache).await
}

/// Track elegido junto con su stream ya resuelto
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPick<'a> {
    pub track: &'a PlaylistEntry,
    pub stream: &'a StreamCacheEntry,
}

/// Picks uniformly among valid pool entries whose track is still in the
/// playlist. A stream whose track left the playlist is never served.
pub fn pick_with_cached_stream<'a>(
    playlist: &'a [PlaylistEntry],
    cache: &'a StreamCache,
    rng: &mut dyn RandomSource,
) -> Option<CachedPick<'a>> {
    let candidates: Vec<CachedPick<'a>> = cache
        .valid_entries()
        .into_iter()
        .filter_map(|stream| {
            playlist
                .iter()
                .find(|track| track.id == stream.track_id)
                .map(|track| CachedPick { track, stream })
        })
        .collect();

    if candidates.is_empty() {
        return None;
    }

    let index = rng.next_below(candidates.len() as u64) as usize;
    candidates.into_iter().nth(index)
}

/// Refills the pool up to [`STREAM_POOL_TARGET`] entries.
///
/// Expired entries are dropped for good. Uncached tracks are resolved one at a
/// time in playlist order; a failed resolution is skipped. The returned record
/// is always stamped with `playlist_url`.
pub async fn replenish(
    playlist: &[PlaylistEntry],
    current: &StreamCache,
    playlist_url: &str,
    resolver: &dyn StreamResolver,
) -> StreamCache {
    let mut entries: Vec<StreamCacheEntry> = current
        .valid_entries()
        .into_iter()
        .take(STREAM_POOL_TARGET)
        .cloned()
        .collect();
    let mut cached: HashSet<String> = entries.iter().map(|e| e.track_id.clone()).collect();

    for track in playlist {
        if entries.len() >= STREAM_POOL_TARGET {
            break;
        }
        if cached.contains(&track.id) {
            continue;
        }

        match resolver.resolve(&track.url).await {
            Ok(stream_url) => {
                debug!("🔗 Stream resuelto para {}", track.title);
                cached.insert(track.id.clone());
                entries.push(StreamCacheEntry {
                    track_id: track.id.clone(),
                    track_url: track.url.clone(),
                    stream_url,
                    resolved_at: Utc::now(),
                });
            }
            Err(e) => {
                debug!("⏭️ Omitiendo {} ({}): {}", track.title, track.id, e);
            }
        }
    }

    info!("🎯 Pool de streams: {}/{}", entries.len(), STREAM_POOL_TARGET);

    StreamCache {
        entries,
        playlist_url: playlist_url.to_string(),
    }
}
