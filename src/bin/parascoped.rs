//! Parascope daemon - hosts the detection worker and record store via IPC.
//!
//! The parascoped binary is a long-running background process that:
//! - Accepts IPC connections from the CLI over a Unix domain socket
//! - Supervises the streaming detection worker
//! - Runs one-shot frame analyses
//! - Persists test and image records
//! - Handles graceful shutdown on SIGTERM/SIGINT
//!
//! ## Usage
//!
//! The daemon is typically started automatically by the CLI when needed.
//! Manual start: `parascoped`
//!
//! ## Files
//!
//! - `~/.parascope/daemon/parascoped.sock` - Unix socket for IPC
//! - `~/.parascope/daemon/parascoped.pid` - PID file for process tracking
//! - `~/.parascope/daemon/daemon.log` - Daemon log file

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::select;
use tokio::signal::unix::{SignalKind, signal};
use tracing_appender::non_blocking::WorkerGuard;

use parascope::config;
use parascope::daemon::listener::IpcListener;
use parascope::daemon::server::{DaemonState, handle_connection};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let daemon_dir = config::daemon_dir()?;
    std::fs::create_dir_all(&daemon_dir)?;

    let _guard = init_logging(&daemon_dir)?;

    tracing::info!("parascoped starting, version {}", env!("CARGO_PKG_VERSION"));

    // Pre-generate the auth token so clients can read it before connecting
    let auth_token = Arc::new(config::get_or_create_auth_token()?);
    tracing::debug!(
        "Auth token ready at {:?}",
        config::daemon_auth_token_path()?
    );

    // Write PID file
    let pid_path = config::daemon_pid_path()?;
    std::fs::write(&pid_path, std::process::id().to_string())?;

    let app_config = config::load()?;
    let state = Arc::new(DaemonState::from_config(&app_config).await?);

    let listener = {
        let socket_path = config::daemon_socket_path()?;
        let listener = IpcListener::bind(&socket_path).await?;
        tracing::info!("parascoped listening on {:?}", listener.socket_path());
        listener
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    // Flag to track shutdown request from IPC
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let mut shutdown_poll = tokio::time::interval(std::time::Duration::from_millis(200));

    loop {
        if shutdown_flag.load(Ordering::SeqCst) {
            tracing::info!("Shutdown requested via IPC");
            break;
        }

        select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, shutting down...");
                break;
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, shutting down...");
                break;
            }

            // Wake periodically so an IPC shutdown is noticed even when no
            // new connection arrives
            _ = shutdown_poll.tick() => {}

            result = listener.accept() => {
                match result {
                    Ok(conn) => {
                        let state = Arc::clone(&state);
                        let auth_token = Arc::clone(&auth_token);
                        let shutdown_flag = Arc::clone(&shutdown_flag);
                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(conn, &state, &auth_token, &shutdown_flag).await
                            {
                                tracing::error!("Connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!("Accept error: {}", e);
                    }
                }
            }
        }
    }

    tracing::info!("Stopping detection worker...");
    state.shutdown().await;

    let _ = std::fs::remove_file(&pid_path);

    tracing::info!("parascoped shutdown complete");
    Ok(())
}

/// Initialize file-based logging for the daemon with daily rotation.
///
/// Writes to `daemon.log` in the daemon directory via a non-blocking
/// appender; rotated files are named `daemon.log.YYYY-MM-DD`. The returned
/// guard must be kept alive so logs are flushed on exit.
fn init_logging(daemon_dir: &std::path::Path) -> anyhow::Result<WorkerGuard> {
    use tracing_subscriber::fmt::format::FmtSpan;

    let file_appender = tracing_appender::rolling::daily(daemon_dir, "daemon.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    Ok(guard)
}
