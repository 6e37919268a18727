pub mod ytdlp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{FetchError, ResolveError};

pub use ytdlp::YtDlpClient;

/// Entrada de una playlist. Inmutable una vez obtenida.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    /// ID del video, único dentro de la playlist
    pub id: String,
    pub title: String,
    /// Duración en segundos (0 = desconocida)
    pub duration: i64,
    /// URL del track o referencia opaca
    pub url: String,
}

impl PlaylistEntry {
    #[allow(dead_code)]
    pub fn new(id: impl Into<String>, title: impl Into<String>, duration: i64, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            duration,
            url: url.into(),
        }
    }
}

/// Obtiene los tracks de una playlist
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaylistFetcher: Send + Sync {
    async fn fetch(&self, playlist_url: &str) -> Result<Vec<PlaylistEntry>, FetchError>;
}

/// Resuelve la URL de un track a una URL directa de audio
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, track_url: &str) -> Result<String, ResolveError>;
}
