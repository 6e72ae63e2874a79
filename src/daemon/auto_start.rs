//! Auto-start functionality for the detection daemon.
//!
//! CLI commands that need the daemon call [`ensure_daemon`], which connects
//! to an already-running instance or spawns `parascoped` and retries the
//! connection with backoff.

use std::process::Command;
use std::time::Duration;
use tokio::time::sleep;

use crate::config;
use crate::daemon::client::DaemonClient;
use crate::error::{ParascopeError, Result};

/// Ensure the daemon is running, starting it if necessary.
///
/// # Errors
///
/// Returns `DaemonConnection` if the daemon binary is not found, fails to
/// start, or all connection retry attempts fail.
pub async fn ensure_daemon() -> Result<DaemonClient> {
    // Daemon may already be running
    if let Ok(client) = DaemonClient::connect().await {
        return Ok(client);
    }

    spawn_daemon()?;

    // Retry with backoff: 50ms, 100ms, 150ms, ...
    for attempt in 0..10 {
        let delay = Duration::from_millis(50 * (attempt + 1));
        sleep(delay).await;

        if let Ok(client) = DaemonClient::connect().await {
            return Ok(client);
        }
    }

    Err(ParascopeError::DaemonConnection(
        "Failed to start daemon. Check ~/.parascope/daemon/daemon.log for details.".to_string(),
    ))
}

/// Spawn the daemon process in the background.
///
/// The daemon binary (`parascoped`) should be located next to the
/// `parascope` binary. stdin/stdout/stderr are redirected to null; the
/// daemon sets up its own logging under `~/.parascope/daemon/`.
fn spawn_daemon() -> Result<()> {
    use std::process::Stdio;

    let current_exe = std::env::current_exe()?;
    let daemon_path = current_exe.with_file_name("parascoped");

    if !daemon_path.exists() {
        return Err(ParascopeError::DaemonConnection(format!(
            "Daemon binary not found at {:?}",
            daemon_path
        )));
    }

    let daemon_dir = config::daemon_dir()?;
    std::fs::create_dir_all(&daemon_dir)?;

    Command::new(&daemon_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    Ok(())
}

/// Check if the daemon is currently running by attempting a connection.
pub async fn is_daemon_running() -> bool {
    DaemonClient::connect().await.is_ok()
}

/// Get the daemon PID from its PID file, if present.
///
/// Does not verify the process is still alive; use [`is_daemon_running`]
/// for a connection-based check.
pub fn daemon_pid() -> Option<u32> {
    let pid_path = config::daemon_pid_path().ok()?;
    let pid_str = std::fs::read_to_string(&pid_path).ok()?;
    pid_str.trim().parse().ok()
}
