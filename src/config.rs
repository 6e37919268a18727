use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::ConfigError;

/// Valores por defecto
pub const DEFAULT_MIN_DURATION: u64 = 5;
pub const DEFAULT_MAX_DURATION: u64 = 10;
pub const DEFAULT_CACHE_TTL_MINUTES: u64 = 60;
pub const DEFAULT_VOLUME: u8 = 75;
pub const DEFAULT_DELAY: u64 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    // Playlist
    pub playlist_url: String,

    // Clip (segundos)
    pub min_duration: u64,
    pub max_duration: u64,

    // Caché
    pub cache_ttl_minutes: u64,

    // Audio
    pub volume: u8,

    // Debounce (segundos)
    pub delay: u64,
}

impl Config {
    /// Loads the base configuration from the process environment (and `.env`).
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the base configuration from any key/value source.
    ///
    /// Numeric variables fall back to their default when unset, empty,
    /// unparsable or not strictly positive. `MUSIC_ON_DONE_DELAY` also
    /// accepts `0`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let positive = |key: &str, default: u64| parse_positive_int(lookup(key).as_deref(), default);

        let config = Self {
            playlist_url: lookup("YOUTUBE_PLAYLIST_URL").unwrap_or_default(),
            min_duration: positive("MUSIC_ON_DONE_MIN_DURATION", DEFAULT_MIN_DURATION),
            max_duration: positive("MUSIC_ON_DONE_MAX_DURATION", DEFAULT_MAX_DURATION),
            cache_ttl_minutes: positive("MUSIC_ON_DONE_CACHE_TTL", DEFAULT_CACHE_TTL_MINUTES),
            volume: positive("MUSIC_ON_DONE_VOLUME", DEFAULT_VOLUME as u64).min(100) as u8,
            delay: lookup("MUSIC_ON_DONE_DELAY")
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_DELAY),
        };

        config.check_bounds()?;
        Ok(config)
    }

    /// Validates the final, merged configuration.
    ///
    /// The playlist URL may legitimately be empty in the base configuration
    /// (a project override can supply it), so this runs after merging.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.check_bounds()?;
        if self.playlist_url.trim().is_empty() {
            return Err(ConfigError::MissingPlaylist);
        }
        Ok(())
    }

    fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.min_duration > self.max_duration {
            return Err(ConfigError::InvalidBounds {
                min: self.min_duration,
                max: self.max_duration,
            });
        }
        Ok(())
    }

    /// Returns a one-line summary of the configuration for logging.
    pub fn summary(&self) -> String {
        format!(
            "playlist={} clip={}-{}s ttl={}m volume={}% delay={}",
            self.playlist_url,
            self.min_duration,
            self.max_duration,
            self.cache_ttl_minutes,
            self.volume,
            humantime::format_duration(std::time::Duration::from_secs(self.delay)),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            playlist_url: String::new(),
            min_duration: DEFAULT_MIN_DURATION,
            max_duration: DEFAULT_MAX_DURATION,
            cache_ttl_minutes: DEFAULT_CACHE_TTL_MINUTES,
            volume: DEFAULT_VOLUME,
            delay: DEFAULT_DELAY,
        }
    }
}

/// Interpreta una variable como entero positivo, con valor por defecto
pub fn parse_positive_int(value: Option<&str>, default: u64) -> u64 {
    match value.map(str::trim) {
        Some(raw) if !raw.is_empty() => match raw.parse::<i64>() {
            Ok(parsed) if parsed > 0 => parsed as u64,
            _ => default,
        },
        _ => default,
    }
}

/// Overrides por proyecto; cada campo reemplaza al base sólo si está presente
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_minutes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
}

/// Tabla `ruta de proyecto -> overrides`, en el orden del archivo.
///
/// Keys that normalise to the same path (`/p` and `/p/`) can coexist; lookups
/// return the first one written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "serde_json::Map<String, serde_json::Value>")]
pub struct ProjectsConfig {
    entries: Vec<(String, ProjectOverrides)>,
}

impl ProjectsConfig {
    /// Añade al final o reemplaza en su sitio si la clave ya existe
    #[allow(dead_code)]
    pub fn insert(&mut self, key: String, overrides: ProjectOverrides) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = overrides,
            None => self.entries.push((key, overrides)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProjectOverrides)> {
        self.entries.iter().map(|(key, overrides)| (key.as_str(), overrides))
    }
}

impl TryFrom<serde_json::Map<String, serde_json::Value>> for ProjectsConfig {
    type Error = serde_json::Error;

    // `preserve_order` mantiene el orden de inserción del JSON
    fn try_from(raw: serde_json::Map<String, serde_json::Value>) -> Result<Self, Self::Error> {
        let entries = raw
            .into_iter()
            .map(|(key, value)| Ok((key, serde_json::from_value(value)?)))
            .collect::<Result<Vec<_>, serde_json::Error>>()?;
        Ok(Self { entries })
    }
}

/// Ruta por defecto: `~/.config/music-on-done/projects.json`
pub fn default_projects_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".config")
        .join("music-on-done")
        .join("projects.json")
}

/// Lee la tabla de overrides. Cualquier error de lectura o parseo equivale a "sin overrides".
pub async fn read_projects_config(path: &Path) -> Option<ProjectsConfig> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            debug!("📂 Sin configuración por proyecto en {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            debug!("⚠️ Configuración por proyecto inválida en {}: {}", path.display(), e);
            None
        }
    }
}

/// Quita una única barra final (salvo la raíz "/")
fn normalize_path(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// Busca los overrides del proyecto; `/a/b` y `/a/b/` son equivalentes
pub fn project_overrides<'a>(
    projects: &'a ProjectsConfig,
    project_dir: &str,
) -> Option<&'a ProjectOverrides> {
    let wanted = normalize_path(project_dir);
    projects
        .iter()
        .find(|(key, _)| normalize_path(key) == wanted)
        .map(|(_, overrides)| overrides)
}

/// Combina los overrides con la configuración base
pub fn merge_project_config(
    base: &Config,
    overrides: &ProjectOverrides,
) -> Result<Config, ConfigError> {
    let volume = overrides
        .volume
        .map(|v| v.clamp(0, 100) as u8)
        .unwrap_or(base.volume)
        .min(100);

    let merged = Config {
        playlist_url: overrides
            .playlist_url
            .clone()
            .unwrap_or_else(|| base.playlist_url.clone()),
        min_duration: overrides.min_duration.unwrap_or(base.min_duration),
        max_duration: overrides.max_duration.unwrap_or(base.max_duration),
        cache_ttl_minutes: overrides.cache_ttl_minutes.unwrap_or(base.cache_ttl_minutes),
        volume,
        delay: overrides.delay.unwrap_or(base.delay),
    };

    merged.check_bounds()?;
    Ok(merged)
}

/// Resolves the effective configuration for the current project.
///
/// Returns `base` unchanged when there is no project directory, no readable
/// override table or no matching entry.
pub async fn resolve_effective_config(
    base: Config,
    project_dir: Option<&str>,
    projects_path: &Path,
) -> Result<Config, ConfigError> {
    let Some(project_dir) = project_dir.filter(|dir| !dir.is_empty()) else {
        return Ok(base);
    };

    let Some(projects) = read_projects_config(projects_path).await else {
        return Ok(base);
    };

    match project_overrides(&projects, project_dir) {
        Some(overrides) => {
            info!("📝 Aplicando configuración del proyecto {}", project_dir);
            merge_project_config(&base, overrides)
        }
        None => Ok(base),
    }
}
