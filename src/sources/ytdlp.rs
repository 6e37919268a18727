use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, info};

use super::{PlaylistEntry, PlaylistFetcher, StreamResolver};
use crate::error::{FetchError, ResolveError};

/// Límite para obtener la metadata de la playlist completa
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(60);
/// Límite para resolver la URL de un único track
pub const RESOLVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Cliente que usa yt-dlp como proceso externo
#[derive(Debug, Clone)]
pub struct YtDlpClient {
    binary: String,
    fetch_timeout: Duration,
    resolve_timeout: Duration,
}

impl Default for YtDlpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl YtDlpClient {
    pub fn new() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            fetch_timeout: FETCH_TIMEOUT,
            resolve_timeout: RESOLVE_TIMEOUT,
        }
    }

    #[allow(dead_code)]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Verifica que yt-dlp y mpv estén disponibles
    pub async fn verify_dependencies(&self) -> Result<()> {
        for (binary, hint) in [
            (self.binary.as_str(), "pip install yt-dlp"),
            ("mpv", "sudo apt install mpv"),
        ] {
            let check = Command::new(binary)
                .arg("--version")
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output()
                .await;

            match check {
                Ok(output) if output.status.success() => {
                    let version = String::from_utf8_lossy(&output.stdout);
                    debug!(
                        "✅ {} disponible: {}",
                        binary,
                        version.lines().next().unwrap_or_default().trim()
                    );
                }
                _ => {
                    error!("❌ {} no encontrado. Instálalo con: {}", binary, hint);
                    anyhow::bail!("music-on-done: {} is not installed. Install it with your package manager.", binary);
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl PlaylistFetcher for YtDlpClient {
    async fn fetch(&self, playlist_url: &str) -> Result<Vec<PlaylistEntry>, FetchError> {
        info!("📥 Obteniendo playlist: {}", playlist_url);

        let command = Command::new(&self.binary)
            .args(["--flat-playlist", "-J", playlist_url])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = timeout(self.fetch_timeout, command)
            .await
            .map_err(|_| FetchError::Timeout(self.fetch_timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::Failed(stderr.trim().to_string()));
        }

        let entries = parse_playlist(&String::from_utf8_lossy(&output.stdout))?;
        info!("📋 Playlist con {} tracks", entries.len());
        Ok(entries)
    }
}

#[async_trait]
impl StreamResolver for YtDlpClient {
    async fn resolve(&self, track_url: &str) -> Result<String, ResolveError> {
        debug!("🎵 Resolviendo stream para: {}", track_url);

        let command = Command::new(&self.binary)
            .args(["-g", "-f", "bestaudio", track_url])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = timeout(self.resolve_timeout, command)
            .await
            .map_err(|_| ResolveError::Timeout(self.resolve_timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Failed(stderr.trim().to_string()));
        }

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or(ResolveError::Empty)
    }
}

/// Salida de `yt-dlp --flat-playlist -J`
#[derive(Debug, Deserialize)]
struct YtDlpPlaylist {
    #[serde(default)]
    entries: Vec<Value>,
}

/// Convierte el JSON de yt-dlp en entradas de playlist.
/// Las entradas sin ID se descartan.
pub fn parse_playlist(json: &str) -> Result<Vec<PlaylistEntry>, serde_json::Error> {
    let playlist: YtDlpPlaylist = serde_json::from_str(json)?;

    Ok(playlist
        .entries
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|entry| {
            let id = match entry.get("id") {
                Some(Value::String(id)) => id.clone(),
                Some(Value::Number(id)) => id.to_string(),
                _ => return None,
            };
            if id.is_empty() {
                return None;
            }

            let title = entry
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string();

            let duration = entry
                .get("duration")
                .and_then(Value::as_f64)
                .map(|d| d as i64)
                .unwrap_or(0);

            let url = entry
                .get("url")
                .and_then(Value::as_str)
                .or_else(|| entry.get("webpage_url").and_then(Value::as_str))
                .map(str::to_string)
                .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", id));

            Some(PlaylistEntry {
                id,
                title,
                duration,
                url,
            })
        })
        .collect())
}
