//! One-shot frame detection.
//!
//! Each request spawns a fresh worker process, feeds it the frame payload on
//! stdin and reads the whole of stdout as one JSON document. The call never
//! fails from the caller's point of view: unparseable output degrades to an
//! empty success and a spawn failure degrades to an error result, both with
//! no boxes.

use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::WorkerConfig;
use crate::detection::event::{BoundingBox, RawBox};

/// Outcome of analyzing a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    pub status: String,
    pub boxes: Vec<BoundingBox>,
}

impl FrameResult {
    fn success(boxes: Vec<BoundingBox>) -> Self {
        Self {
            status: "success".to_string(),
            boxes,
        }
    }

    fn empty_success() -> Self {
        Self::success(Vec::new())
    }

    fn error() -> Self {
        Self {
            status: "error".to_string(),
            boxes: Vec::new(),
        }
    }
}

/// Worker stdout shape. Older scripts report `success: true` instead of a
/// status string.
#[derive(Debug, Deserialize)]
struct RawFrameOutput {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    boxes: Vec<RawBox>,
}

pub struct OneShotClient {
    config: WorkerConfig,
}

impl OneShotClient {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    /// Run the frame worker once over `frame` (typically a base64 image)
    /// and return its verdict.
    pub async fn detect_frame(&self, frame: &str) -> FrameResult {
        let script = match self.config.frame_script() {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Frame worker script unavailable");
                return FrameResult::error();
            }
        };

        let mut command = Command::new(&self.config.command);
        command
            .arg(&script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(error = %e, script = %script.display(), "Failed to spawn frame worker");
                return FrameResult::error();
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            let payload = format!("{}\n", frame);
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                debug!(error = %e, "Frame worker closed stdin early");
            }
            // dropping stdin closes the pipe so the worker sees EOF
        }

        let output = match child.wait_with_output().await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Failed to collect frame worker output");
                return FrameResult::error();
            }
        };

        Self::parse_output(&output.stdout)
    }

    fn parse_output(stdout: &[u8]) -> FrameResult {
        let raw: RawFrameOutput = match serde_json::from_slice(stdout) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(error = %e, "Unparseable frame worker output, treating as no detections");
                return FrameResult::empty_success();
            }
        };

        let succeeded = match (raw.status.as_deref(), raw.success) {
            (Some("success"), _) => true,
            (Some(_), _) => false,
            (None, Some(flag)) => flag,
            (None, None) => false,
        };
        if !succeeded {
            return FrameResult::error();
        }

        let boxes = raw
            .boxes
            .into_iter()
            .filter_map(RawBox::normalize)
            .collect();
        FrameResult::success(boxes)
    }
}
