use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

mod audio;
mod cache;
mod config;
mod debounce;
mod error;
mod notifier;
mod sources;
mod storage;

use crate::audio::{EntropyRandom, MpvPlayer};
use crate::config::Config;
use crate::debounce::PidMarker;
use crate::error::NotifyError;
use crate::notifier::{Notifier, RunOutcome};
use crate::sources::YtDlpClient;
use crate::storage::CachePaths;

#[tokio::main]
async fn main() -> Result<()> {
    // Logging silencioso por defecto: esto corre como hook
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("music_on_done=warn")),
        )
        .init();

    let marker = pid_marker();

    // --cancel: mata la invocación pendiente y sale
    if std::env::args().any(|arg| arg == "--cancel") {
        marker.cancel_pending().await;
        return Ok(());
    }

    let client = YtDlpClient::new();

    if std::env::args().any(|arg| arg == "--health-check") {
        client.verify_dependencies().await?;
        println!("OK");
        return Ok(());
    }

    // Sin yt-dlp o mpv no hay nada que hacer: único caso con código de salida != 0
    client.verify_dependencies().await?;

    // Un hook de notificación nunca debe romper a quien lo llama
    match run(&client, &marker).await {
        Ok(outcome) => debug!("🏁 Ejecución terminada: {:?}", outcome),
        Err(e) => error!("❌ {}", e),
    }

    Ok(())
}

async fn run(client: &YtDlpClient, marker: &PidMarker) -> Result<RunOutcome, NotifyError> {
    let base = Config::load()?;
    let project_dir = std::env::var("CLAUDE_PROJECT_DIR").ok();
    let projects_path = std::env::var("MUSIC_ON_DONE_PROJECTS_FILE")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| config::default_projects_path());

    let config = config::resolve_effective_config(base, project_dir.as_deref(), &projects_path).await?;
    config.validate()?;
    info!("⚙️ {}", config.summary());

    let cancel = CancellationToken::new();
    listen_for_terminate(cancel.clone());

    let paths = CachePaths::for_playlist(&config.playlist_url);
    let player = MpvPlayer::new();
    let notifier = Notifier {
        config: &config,
        paths: &paths,
        marker,
        fetcher: client,
        resolver: client,
        player: &player,
    };

    let mut rng = EntropyRandom::new();
    notifier.run(std::process::id(), &cancel, &mut rng).await
}

fn pid_marker() -> PidMarker {
    match std::env::var("MUSIC_ON_DONE_PID_FILE") {
        Ok(path) if !path.trim().is_empty() => PidMarker::new(path),
        _ => PidMarker::default(),
    }
}

/// SIGTERM (enviado por `--cancel`) dispara la cancelación cooperativa
fn listen_for_terminate(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::spawn(async move {
                    if sigterm.recv().await.is_some() {
                        debug!("⚠️ SIGTERM recibido, cancelando");
                        cancel.cancel();
                    }
                });
            }
            Err(e) => debug!("No se pudo instalar el manejador de SIGTERM: {}", e),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }
}
