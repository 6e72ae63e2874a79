//! Streaming and one-shot detection commands.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::cli::args::DetectCommand;
use crate::daemon::ensure_daemon;
use crate::error::Result;

/// Handle detect commands
pub async fn detect(command: DetectCommand, json: bool) -> Result<()> {
    match command {
        DetectCommand::Start => detect_start().await,
        DetectCommand::Stop => detect_stop().await,
        DetectCommand::Status => detect_status(json).await,
        DetectCommand::Watch => detect_watch(json).await,
    }
}

async fn detect_start() -> Result<()> {
    let mut client = ensure_daemon().await?;
    let pid = client.start_detection().await?;
    match pid {
        Some(pid) => println!("Detection worker started (PID {}).", pid),
        None => println!("Detection worker started."),
    }
    Ok(())
}

async fn detect_stop() -> Result<()> {
    let mut client = ensure_daemon().await?;
    client.stop_detection().await?;
    println!("Detection worker stopped.");
    Ok(())
}

async fn detect_status(json: bool) -> Result<()> {
    let mut client = ensure_daemon().await?;
    let status = client.detection_status().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else if status.running {
        println!(
            "Detection worker: running (PID {})",
            status.pid.unwrap_or(0)
        );
    } else {
        println!("Detection worker: not running");
    }
    Ok(())
}

/// Stream detection events to the terminal until the daemon closes the
/// stream or the process is interrupted.
async fn detect_watch(json: bool) -> Result<()> {
    let mut client = ensure_daemon().await?;

    if !json {
        println!("Watching detection events (Ctrl-C to stop)...");
    }

    client
        .watch("detection-update", |frame| {
            if json {
                println!("{}", frame.payload);
            } else {
                let status = frame.payload["status"].as_str().unwrap_or("?");
                let boxes = frame.payload["boxes"]
                    .as_array()
                    .map(Vec::len)
                    .unwrap_or(0);
                match frame.payload["error"].as_str() {
                    Some(error) => println!("{:<10} {}", status, error),
                    None => println!("{:<10} {} box(es)", status, boxes),
                }
            }
            true
        })
        .await
}

/// Analyze a single image file with a one-shot worker.
pub async fn frame(file: &std::path::Path, json: bool) -> Result<()> {
    let bytes = std::fs::read(file)?;
    let payload = BASE64.encode(&bytes);

    let mut client = ensure_daemon().await?;
    let result = client.detect_frame(&payload).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Status: {}", result.status);
        if result.boxes.is_empty() {
            println!("No detections.");
        } else {
            for bbox in &result.boxes {
                println!(
                    "  box at ({:.0}, {:.0}) size {:.0}x{:.0} confidence {:.2}",
                    bbox.x, bbox.y, bbox.width, bbox.height, bbox.confidence
                );
            }
        }
    }
    Ok(())
}
