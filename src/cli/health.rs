//! Health probe command.

use crate::daemon::ensure_daemon;
use crate::error::Result;

/// Probe the detection service and print the report.
pub async fn health(json: bool) -> Result<()> {
    let mut client = ensure_daemon().await?;
    let report = client.health().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Detection service: {}", report.status);
        if let Some(error) = &report.error {
            println!("  {}", error);
        }
        for (key, value) in &report.detail {
            println!("  {}: {}", key, value);
        }
    }
    Ok(())
}
