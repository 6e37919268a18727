//! # Cache Module
//!
//! On-disk caches that keep a notification fast and cheap on the network.
//!
//! ## Cache Types
//!
//! - **Playlist snapshot** ([`playlist`]): the flat track list of the
//!   configured playlist, refreshed after `MUSIC_ON_DONE_CACHE_TTL` minutes.
//! - **Stream pool** ([`streams`]): a small rotating pool of resolved direct
//!   audio URLs, each valid for [`streams::STREAM_TTL_MINUTES`].
//!
//! Both are JSON files namespaced by a hash of the playlist URL (see
//! [`crate::storage::CachePaths`]). Expired data is treated as invalid, it is
//! never deleted in place.
//!
//! ## TTL boundary
//!
//! Validity is strict: an entry whose age is exactly the TTL is already
//! invalid.

pub mod playlist;
pub mod streams;

use chrono::{DateTime, Duration, Utc};

/// `true` si `since` tiene menos de `ttl_minutes` de antigüedad en `now`
pub fn within_ttl(since: DateTime<Utc>, now: DateTime<Utc>, ttl_minutes: u64) -> bool {
    let ttl = Duration::minutes(ttl_minutes.min(u32::MAX as u64) as i64);
    now.signed_duration_since(since) < ttl
}
