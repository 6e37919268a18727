//! # Errores
//!
//! Only two conditions are fatal to a run: an invalid configuration and a
//! playlist that cannot be fetched. Everything else (stream resolution,
//! cache files, cancellation) is recovered where it happens.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuración inválida (fatal para la ejecución)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("minDuration ({min}) must be <= maxDuration ({max})")]
    InvalidBounds { min: u64, max: u64 },

    #[error(
        "No playlist URL configured. Set YOUTUBE_PLAYLIST_URL in your environment \
         or add an entry in ~/.config/music-on-done/projects.json"
    )]
    MissingPlaylist,
}

/// La playlist no se pudo obtener (fatal para la ejecución)
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to run yt-dlp: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("yt-dlp playlist fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("yt-dlp playlist fetch failed: {0}")]
    Failed(String),

    #[error("could not parse yt-dlp playlist output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Fallo al resolver un único track (se omite en silencio)
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to run yt-dlp: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("stream resolution timed out after {0:?}")]
    Timeout(Duration),

    #[error("yt-dlp stream resolution failed: {0}")]
    Failed(String),

    #[error("yt-dlp returned no stream URL")]
    Empty,
}

/// Archivo de caché ausente o corrupto (se trata como cache miss)
#[derive(Debug, Error)]
pub enum CacheReadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed cache file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheReadError {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Fallo del reproductor externo
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to run mpv: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("playback timed out after {0:?}")]
    Timeout(Duration),

    #[error("mpv exited with {0}")]
    Failed(std::process::ExitStatus),
}

/// Errores del marcador PID y de la cancelación
#[derive(Debug, Error)]
pub enum DebounceError {
    #[error("marker file {path}: {source}")]
    Marker {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot signal process {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("process signalling is not supported on this platform")]
    Unsupported,
}

/// Errores que terminan una ejecución completa
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Debounce(#[from] DebounceError),

    #[error("playlist is empty, no tracks to pick from")]
    EmptyPlaylist,
}
