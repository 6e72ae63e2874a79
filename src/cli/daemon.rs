//! Daemon CLI commands for managing the parascoped process.

use crate::cli::args::DaemonCommand;
use crate::config;
use crate::daemon::DaemonClient;
use crate::daemon::auto_start::{daemon_pid, is_daemon_running};
use crate::error::Result;

/// Handle daemon commands
pub async fn daemon(command: DaemonCommand) -> Result<()> {
    match command {
        DaemonCommand::Status => daemon_status().await,
        DaemonCommand::Start => daemon_start().await,
        DaemonCommand::Stop => daemon_stop().await,
    }
}

/// Show daemon status
async fn daemon_status() -> Result<()> {
    if is_daemon_running().await {
        let mut client = DaemonClient::connect().await?;
        let version = client.ping().await?;

        let pid = daemon_pid().unwrap_or(0);
        println!("Daemon status: running");
        println!("  PID: {}", pid);
        println!("  Version: {}", version);
        let socket_path = config::daemon_socket_path()?;
        println!("  Socket: {}", socket_path.display());
    } else {
        println!("Daemon status: not running");
        println!("  Run 'parascope daemon start' or any detection command to start it.");
    }

    Ok(())
}

/// Start the daemon manually
async fn daemon_start() -> Result<()> {
    if is_daemon_running().await {
        println!("Daemon is already running.");
        return Ok(());
    }

    match crate::daemon::ensure_daemon().await {
        Ok(mut client) => {
            let version = client.ping().await.unwrap_or_default();
            println!("Daemon started successfully.");
            println!("  Version: {}", version);
            if let Some(pid) = daemon_pid() {
                println!("  PID: {}", pid);
            }
            Ok(())
        }
        Err(e) => {
            println!("Failed to start daemon: {}", e);
            let daemon_dir = config::daemon_dir()?;
            println!("Check logs under: {}", daemon_dir.display());
            Err(e)
        }
    }
}

/// Stop the daemon
async fn daemon_stop() -> Result<()> {
    if !is_daemon_running().await {
        println!("Daemon is not running.");
        return Ok(());
    }

    let mut client = DaemonClient::connect().await?;
    client.shutdown().await?;

    // Wait for shutdown
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if !is_daemon_running().await {
            println!("Daemon stopped.");
            return Ok(());
        }
    }

    println!("Warning: Daemon may still be shutting down.");
    Ok(())
}
