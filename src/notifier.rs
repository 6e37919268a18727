//! # Notifier
//!
//! One full notification run:
//!
//! 1. register our PID in the marker (superseding older pending runs),
//! 2. wait the configured delay, cut short by cancellation,
//! 3. bail out quietly if cancelled or superseded,
//! 4. load the playlist (cache or fetch) and pick a track, preferring one
//!    with a warm stream URL,
//! 5. play the clip while the stream pool is refilled and saved,
//! 6. release the marker.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::{self, ClipPlayer, ClipRequest, RandomSource};
use crate::cache::playlist;
use crate::cache::streams::{self, StreamCache};
use crate::config::Config;
use crate::debounce::PidMarker;
use crate::error::NotifyError;
use crate::sources::{PlaylistEntry, PlaylistFetcher, StreamResolver};
use crate::storage::CachePaths;

/// Cómo terminó una ejecución que no falló
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Se reprodujo (o se intentó reproducir) un clip
    Played(PlayedClip),
    /// Una invocación más nueva sobrescribió el marcador
    Superseded,
    /// Llegó la señal de cancelación durante la espera
    Cancelled,
}

/// Clip reproducido
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedClip {
    pub track_id: String,
    pub title: String,
    pub from_pool: bool,
    pub request: ClipRequest,
}

/// Track elegido y la URL con la que se reproducirá
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<'a> {
    pub track: &'a PlaylistEntry,
    pub url: String,
    pub from_pool: bool,
}

/// Prefers a track with a warm stream URL; otherwise any track at random.
pub fn choose_track<'a>(
    entries: &'a [PlaylistEntry],
    pool: &'a StreamCache,
    rng: &mut dyn RandomSource,
) -> Option<Selection<'a>> {
    if let Some(pick) = streams::pick_with_cached_stream(entries, pool, rng) {
        return Some(Selection {
            track: pick.track,
            url: pick.stream.stream_url.clone(),
            from_pool: true,
        });
    }

    audio::pick_random_track(entries, rng).map(|track| Selection {
        track,
        url: track.url.clone(),
        from_pool: false,
    })
}

/// Orquestador de una notificación
pub struct Notifier<'a> {
    pub config: &'a Config,
    pub paths: &'a CachePaths,
    pub marker: &'a PidMarker,
    pub fetcher: &'a dyn PlaylistFetcher,
    pub resolver: &'a dyn StreamResolver,
    pub player: &'a dyn ClipPlayer,
}

impl Notifier<'_> {
    /// Runs one notification as process `pid`. The marker is released on
    /// every exit path, but only while it still holds `pid`.
    pub async fn run(
        &self,
        pid: u32,
        cancel: &CancellationToken,
        rng: &mut dyn RandomSource,
    ) -> Result<RunOutcome, NotifyError> {
        self.marker.register(pid).await?;

        let result = self.run_registered(pid, cancel, rng).await;

        if let Err(e) = self.marker.release(pid).await {
            debug!("🧹 No se pudo liberar el marcador: {}", e);
        }

        result
    }

    async fn run_registered(
        &self,
        pid: u32,
        cancel: &CancellationToken,
        rng: &mut dyn RandomSource,
    ) -> Result<RunOutcome, NotifyError> {
        if !wait_for_delay(self.config.delay, cancel).await {
            debug!("🛑 Cancelado durante la espera");
            return Ok(RunOutcome::Cancelled);
        }

        if !self.marker.is_still_registered(pid).await {
            debug!("⏭️ Reemplazado por una invocación más nueva");
            return Ok(RunOutcome::Superseded);
        }

        let entries =
            playlist::get_or_fetch(self.config, &self.paths.playlist_cache_file, self.fetcher).await?;

        let pool = StreamCache::for_playlist(
            streams::read_stream_cache(&self.paths.stream_cache_file).await,
            &self.config.playlist_url,
        );

        let selection = choose_track(&entries, &pool, rng).ok_or(NotifyError::EmptyPlaylist)?;
        let duration = audio::select_clip_duration(self.config.min_duration, self.config.max_duration, rng);
        let request = ClipRequest {
            url: selection.url.clone(),
            start_seconds: audio::select_clip_window(selection.track.duration, duration, rng),
            duration_seconds: duration,
            volume: self.config.volume,
        };

        info!(
            "🎶 {} ({}){}",
            selection.track.title,
            selection.track.id,
            if selection.from_pool { " ⚡ desde el pool" } else { "" }
        );

        let (played, ()) = tokio::join!(
            self.player.play(&request, cancel),
            self.refill_pool(&entries, &pool),
        );
        played?;

        Ok(RunOutcome::Played(PlayedClip {
            track_id: selection.track.id.clone(),
            title: selection.track.title.clone(),
            from_pool: selection.from_pool,
            request,
        }))
    }

    /// Rellena y guarda el pool. Los fallos nunca salen de aquí.
    async fn refill_pool(&self, entries: &[PlaylistEntry], pool: &StreamCache) {
        let updated = streams::replenish(entries, pool, &self.config.playlist_url, self.resolver).await;
        if let Err(e) = streams::write_stream_cache(&self.paths.stream_cache_file, &updated).await {
            warn!("⚠️ No se pudo guardar el pool de streams: {}", e);
        }
    }
}

/// Waits `delay_seconds` unless `cancel` fires first.
/// Returns `false` when the run was cancelled.
pub async fn wait_for_delay(delay_seconds: u64, cancel: &CancellationToken) -> bool {
    if delay_seconds > 0 {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(delay_seconds)) => {}
            _ = cancel.cancelled() => {}
        }
    }
    !cancel.is_cancelled()
}
