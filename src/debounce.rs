//! # Debounce
//!
//! Supersession through a single-slot PID marker file.
//!
//! Every invocation overwrites the marker with its own PID, so a burst of
//! notifications collapses into the last one: after its delay each run checks
//! whether the marker still holds its PID and quietly gives up otherwise. No
//! lock is taken; last write wins.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::DebounceError;
use crate::storage;

/// Nombre del marcador dentro del directorio de caché
pub const PID_FILE_NAME: &str = "pending.pid";

pub fn default_pid_path() -> PathBuf {
    storage::default_cache_dir().join(PID_FILE_NAME)
}

/// Resultado de `try_cancel_pending`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// No había ninguna invocación pendiente
    NothingPending,
    /// Se envió SIGTERM y se borró el marcador
    Signalled(u32),
    /// El proceso ya no existía; se borró el marcador igualmente
    AlreadyGone(u32),
    /// No se pudo enviar la señal (PID inválido, sin permisos...); el
    /// marcador se borró igualmente
    SignalFailed(u32),
}

/// Marcador PID de la invocación pendiente
#[derive(Debug, Clone)]
pub struct PidMarker {
    path: PathBuf,
}

impl Default for PidMarker {
    fn default() -> Self {
        Self::new(default_pid_path())
    }
}

impl PidMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn marker_error(&self, source: std::io::Error) -> DebounceError {
        DebounceError::Marker {
            path: self.path.clone(),
            source,
        }
    }

    /// Overwrites the marker with `pid`, creating the directory if needed.
    /// Any previously registered PID is abandoned without being examined.
    pub async fn register(&self, pid: u32) -> Result<(), DebounceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.marker_error(e))?;
        }
        fs::write(&self.path, pid.to_string())
            .await
            .map_err(|e| self.marker_error(e))?;
        debug!("📌 PID {} registrado en {}", pid, self.path.display());
        Ok(())
    }

    /// PID guardado, o `None` si falta o no es un número
    pub async fn read(&self) -> Option<u32> {
        let raw = fs::read_to_string(&self.path).await.ok()?;
        raw.trim().parse().ok()
    }

    pub async fn is_still_registered(&self, pid: u32) -> bool {
        self.read().await == Some(pid)
    }

    /// Removes the marker. A missing file counts as success.
    pub async fn unregister(&self) -> Result<(), DebounceError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.marker_error(e)),
        }
    }

    /// Borra el marcador sólo si todavía es nuestro, para no pisar a una
    /// invocación más nueva.
    pub async fn release(&self, pid: u32) -> Result<bool, DebounceError> {
        if !self.is_still_registered(pid).await {
            return Ok(false);
        }
        self.unregister().await?;
        Ok(true)
    }

    /// Signals the pending invocation (if any) and removes the marker.
    ///
    /// The marker is removed whatever the signal outcome; only a failure to
    /// remove it is an error.
    pub async fn try_cancel_pending(&self) -> Result<CancelOutcome, DebounceError> {
        let Some(pid) = self.read().await else {
            return Ok(CancelOutcome::NothingPending);
        };

        let outcome = match send_terminate(pid) {
            Ok(()) => CancelOutcome::Signalled(pid),
            Err(DebounceError::Signal { source, .. })
                if source.raw_os_error() == Some(ESRCH) =>
            {
                CancelOutcome::AlreadyGone(pid)
            }
            Err(e) => {
                debug!("🛑 No se pudo señalar al PID {}: {}", pid, e);
                CancelOutcome::SignalFailed(pid)
            }
        };

        self.unregister().await?;
        Ok(outcome)
    }

    /// Cancelación best-effort: nunca devuelve error
    pub async fn cancel_pending(&self) {
        match self.try_cancel_pending().await {
            Ok(outcome) => debug!("🛑 Cancelación: {:?}", outcome),
            Err(e) => debug!("🛑 Cancelación ignorada: {}", e),
        }
    }
}

#[cfg(unix)]
const ESRCH: i32 = libc::ESRCH;
#[cfg(not(unix))]
const ESRCH: i32 = 3;

#[cfg(unix)]
fn send_terminate(pid: u32) -> Result<(), DebounceError> {
    let raw = libc::pid_t::try_from(pid).map_err(|_| DebounceError::Signal {
        pid,
        source: std::io::Error::from(ErrorKind::InvalidInput),
    })?;
    // pid 0 / negativos apuntan a grupos de procesos
    if raw <= 0 {
        return Err(DebounceError::Signal {
            pid,
            source: std::io::Error::from(ErrorKind::InvalidInput),
        });
    }

    // SAFETY: kill(2) no toca memoria; sólo envía una señal a `raw`.
    let rc = unsafe { libc::kill(raw, libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(DebounceError::Signal {
            pid,
            source: std::io::Error::last_os_error(),
        })
    }
}

#[cfg(not(unix))]
fn send_terminate(_pid: u32) -> Result<(), DebounceError> {
    Err(DebounceError::Unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(dir: &tempfile::TempDir) -> PidMarker {
        PidMarker::new(dir.path().join("nested").join(PID_FILE_NAME))
    }

    #[tokio::test]
    async fn test_register_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker(&dir);

        marker.register(1234).await.unwrap();
        assert_eq!(marker.read().await, Some(1234));
        assert!(marker.is_still_registered(1234).await);
    }

    #[tokio::test]
    async fn test_newer_registration_supersedes() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker(&dir);

        marker.register(100).await.unwrap();
        marker.register(200).await.unwrap();

        assert!(!marker.is_still_registered(100).await);
        assert!(marker.is_still_registered(200).await);
    }

    #[tokio::test]
    async fn test_read_handles_missing_and_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker(&dir);
        assert_eq!(marker.read().await, None);
        assert!(!marker.is_still_registered(1).await);

        marker.register(1).await.unwrap();
        fs::write(marker.path(), "not-a-pid").await.unwrap();
        assert_eq!(marker.read().await, None);

        fs::write(marker.path(), " 77\n").await.unwrap();
        assert_eq!(marker.read().await, Some(77));
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker(&dir);

        marker.register(5).await.unwrap();
        marker.unregister().await.unwrap();
        marker.unregister().await.unwrap();
        assert_eq!(marker.read().await, None);
    }

    #[tokio::test]
    async fn test_release_keeps_newer_registration() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker(&dir);

        marker.register(10).await.unwrap();
        marker.register(20).await.unwrap();

        assert!(!marker.release(10).await.unwrap());
        assert_eq!(marker.read().await, Some(20));

        assert!(marker.release(20).await.unwrap());
        assert_eq!(marker.read().await, None);
    }

    #[tokio::test]
    async fn test_cancel_with_nothing_pending() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker(&dir);

        assert_eq!(
            marker.try_cancel_pending().await.unwrap(),
            CancelOutcome::NothingPending
        );
        marker.cancel_pending().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_signals_pending_process() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker(&dir);

        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        marker.register(pid).await.unwrap();

        assert_eq!(
            marker.try_cancel_pending().await.unwrap(),
            CancelOutcome::Signalled(pid)
        );
        assert_eq!(marker.read().await, None);

        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_tolerates_dead_process() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker(&dir);

        let mut child = tokio::process::Command::new("true").spawn().unwrap();
        let pid = child.id().unwrap();
        child.wait().await.unwrap();
        marker.register(pid).await.unwrap();

        assert_eq!(
            marker.try_cancel_pending().await.unwrap(),
            CancelOutcome::AlreadyGone(pid)
        );
        assert_eq!(marker.read().await, None);
    }

    #[tokio::test]
    async fn test_unsignalable_pid_still_clears_marker() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker(&dir);
        marker.register(0).await.unwrap();

        assert_eq!(
            marker.try_cancel_pending().await.unwrap(),
            CancelOutcome::SignalFailed(0)
        );
        assert_eq!(marker.read().await, None);
    }

    #[tokio::test]
    async fn test_cancel_pending_swallows_errors() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker(&dir);
        marker.register(0).await.unwrap();

        // No debe propagar nada
        marker.cancel_pending().await;
        assert_eq!(marker.read().await, None);

        // Un segundo --cancel ya no encuentra nada pendiente
        assert_eq!(
            marker.try_cancel_pending().await.unwrap(),
            CancelOutcome::NothingPending
        );
    }
}
