use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::PlaybackError;

/// Margen para arrancar y cerrar el reproductor
pub const PLAYBACK_SLACK: Duration = Duration::from_secs(30);

/// Fragmento a reproducir
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipRequest {
    pub url: String,
    pub start_seconds: u64,
    pub duration_seconds: u64,
    pub volume: u8,
}

impl ClipRequest {
    /// Clip length plus slack for process startup and shutdown.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.duration_seconds) + PLAYBACK_SLACK
    }
}

/// Reproductor de clips
#[async_trait]
pub trait ClipPlayer: Send + Sync {
    /// Plays the clip to completion. Returns early, without error, once
    /// `cancel` fires.
    async fn play(&self, request: &ClipRequest, cancel: &CancellationToken) -> Result<(), PlaybackError>;
}

/// Reproductor basado en mpv (sin video)
#[derive(Debug, Clone)]
pub struct MpvPlayer {
    binary: String,
}

impl Default for MpvPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl MpvPlayer {
    pub fn new() -> Self {
        Self {
            binary: "mpv".to_string(),
        }
    }

    #[allow(dead_code)]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn build_args(request: &ClipRequest) -> Vec<String> {
        vec![
            "--no-video".to_string(),
            "--really-quiet".to_string(),
            format!("--start={}", request.start_seconds),
            format!("--length={}", request.duration_seconds),
            format!("--volume={}", request.volume),
            request.url.clone(),
        ]
    }
}

#[async_trait]
impl ClipPlayer for MpvPlayer {
    async fn play(&self, request: &ClipRequest, cancel: &CancellationToken) -> Result<(), PlaybackError> {
        let limit = request.timeout();
        info!(
            "🎵 Reproduciendo {}s desde {}s (vol {}%)",
            request.duration_seconds, request.start_seconds, request.volume
        );

        let mut child = Command::new(&self.binary)
            .args(Self::build_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let ended = tokio::select! {
            status = child.wait() => Ended::Exited(status),
            _ = tokio::time::sleep(limit) => Ended::TimedOut,
            _ = cancel.cancelled() => Ended::Cancelled,
        };

        match ended {
            Ended::Exited(status) => {
                let status = status?;
                if status.success() {
                    debug!("✅ Reproducción terminada");
                    Ok(())
                } else {
                    Err(PlaybackError::Failed(status))
                }
            }
            Ended::TimedOut => {
                warn!("⏱️ mpv superó {}, deteniendo", humantime::format_duration(limit));
                let _ = child.kill().await;
                Err(PlaybackError::Timeout(limit))
            }
            Ended::Cancelled => {
                debug!("🛑 Reproducción cancelada");
                let _ = child.kill().await;
                Ok(())
            }
        }
    }
}

enum Ended {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request() -> ClipRequest {
        ClipRequest {
            url: "https://cdn.example.com/a".to_string(),
            start_seconds: 42,
            duration_seconds: 7,
            volume: 60,
        }
    }

    #[test]
    fn test_mpv_args() {
        assert_eq!(
            MpvPlayer::build_args(&request()),
            vec![
                "--no-video",
                "--really-quiet",
                "--start=42",
                "--length=7",
                "--volume=60",
                "https://cdn.example.com/a",
            ]
        );
    }

    #[test]
    fn test_timeout_covers_clip_plus_slack() {
        assert_eq!(request().timeout(), Duration::from_secs(37));
    }

    #[tokio::test]
    async fn test_missing_player_binary_fails() {
        let player = MpvPlayer::new().with_binary("definitely-not-mpv-binary");
        let err = player
            .play(&request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::Spawn(_)));
    }
}
