//! Detection event model.
//!
//! Worker processes emit one JSON object per stdout line. Lines arrive in
//! two dialects (an object-per-box form and a positional-array form), both
//! of which normalize into [`DetectionEvent`] before anything downstream
//! sees them.

use serde::{Deserialize, Serialize};

use crate::error::{ParascopeError, Result};

/// Confidence assigned to positional boxes that omit a score.
pub const DEFAULT_CONFIDENCE: f64 = 0.9;

/// Lifecycle status carried on every detection event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStatus {
    /// Worker is processing frames but has nothing to report yet
    Analyzing,
    /// Worker found one or more objects in the current frame
    Detected,
    /// Worker reported a recoverable problem (or wrote to stderr)
    Error,
    /// Worker exited; terminal for a given run
    Stopped,
    /// Worker could not be started at all
    Failed,
}

impl DetectionStatus {
    /// Workers are inconsistent about casing ("Detected" vs "detected"),
    /// so match case-insensitively.
    fn from_wire(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "analyzing" => Some(Self::Analyzing),
            // workers report "success" for a frame with hits
            "detected" | "success" => Some(Self::Detected),
            "error" => Some(Self::Error),
            "stopped" => Some(Self::Stopped),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyzing => "analyzing",
            Self::Detected => "detected",
            Self::Error => "error",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

/// A detected object in normalized form: top-left origin, width/height
/// extent, confidence in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
}

/// Box as it appears on the wire. Object form carries explicit extents;
/// array form is `[x1, y1, x2, y2]` with an optional trailing confidence.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawBox {
    Structured {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        confidence: f64,
    },
    Positional(Vec<f64>),
}

impl RawBox {
    pub(crate) fn normalize(self) -> Option<BoundingBox> {
        let bbox = match self {
            RawBox::Structured {
                x,
                y,
                width,
                height,
                confidence,
            } => BoundingBox {
                x,
                y,
                width,
                height,
                confidence,
            },
            RawBox::Positional(coords) => {
                if coords.len() < 4 {
                    return None;
                }
                let (x1, y1, x2, y2) = (coords[0], coords[1], coords[2], coords[3]);
                BoundingBox {
                    x: x1,
                    y: y1,
                    width: x2 - x1,
                    height: y2 - y1,
                    confidence: coords.get(4).copied().unwrap_or(DEFAULT_CONFIDENCE),
                }
            }
        };
        Some(BoundingBox {
            x: bbox.x.max(0.0),
            y: bbox.y.max(0.0),
            width: bbox.width.max(0.0),
            height: bbox.height.max(0.0),
            confidence: bbox.confidence.clamp(0.0, 1.0),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    status: String,
    #[serde(default)]
    boxes: Vec<RawBox>,
    #[serde(default)]
    error: Option<String>,
}

/// A normalized detection event, as published to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub status: DetectionStatus,
    pub boxes: Vec<BoundingBox>,
    /// Milliseconds since the Unix epoch, stamped at normalization time
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionEvent {
    fn new(status: DetectionStatus, boxes: Vec<BoundingBox>, error: Option<String>) -> Self {
        Self {
            status,
            boxes,
            timestamp: chrono::Utc::now().timestamp_millis(),
            error,
        }
    }

    /// Parse one stdout line from a streaming worker.
    ///
    /// Unknown statuses and malformed boxes count as parse failures so a
    /// misbehaving worker can't inject arbitrary states downstream.
    pub fn parse_line(line: &str) -> Result<Self> {
        let raw: RawEvent = serde_json::from_str(line)?;

        let status = DetectionStatus::from_wire(&raw.status).ok_or_else(|| {
            ParascopeError::DaemonProtocol(format!("unknown worker status: {}", raw.status))
        })?;

        let boxes = raw
            .boxes
            .into_iter()
            .map(RawBox::normalize)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                ParascopeError::DaemonProtocol("box with fewer than 4 coordinates".to_string())
            })?;

        Ok(Self::new(status, boxes, raw.error))
    }

    /// Wrap a stderr line from the worker as a diagnostic event.
    pub fn stderr_chatter(line: &str) -> Self {
        Self::new(DetectionStatus::Error, Vec::new(), Some(line.to_string()))
    }

    /// Terminal event published exactly once when a worker run ends.
    pub fn stopped() -> Self {
        Self::new(DetectionStatus::Stopped, Vec::new(), None)
    }

    /// Event published when a worker could not be spawned.
    pub fn failed(error: impl Into<String>) -> Self {
        Self::new(DetectionStatus::Failed, Vec::new(), Some(error.into()))
    }
}
