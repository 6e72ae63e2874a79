//! DaemonClient for CLI-to-daemon communication.
//!
//! Client library the CLI commands use to talk to the detection daemon over
//! its Unix domain socket. Handles request/response serialization, auth, and
//! the push-mode event stream behind `subscribe`.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::UnixStream;

use crate::config;
use crate::daemon::protocol::{
    AuthRequest, DetectionStatusBody, EVENT_FRAME_ID, EventFrame, Operation, Request, Response,
    SaveImageRequest, read_frame, write_frame,
};
use crate::detection::{FrameResult, HealthReport};
use crate::error::{ParascopeError, Result};
use crate::models::{ImageRecord, TestRecord};

/// Client for communicating with the detection daemon.
///
/// Connects over the Unix socket at `~/.parascope/daemon/parascoped.sock`
/// and provides typed methods for each operation.
pub struct DaemonClient {
    stream: UnixStream,
    request_id: AtomicU64,
}

impl DaemonClient {
    /// Connect to the daemon and authenticate with the stored token.
    ///
    /// # Errors
    ///
    /// Returns `DaemonConnection` if the daemon is not running or the socket
    /// cannot be connected to, and `DaemonError` if authentication fails.
    pub async fn connect() -> Result<Self> {
        let socket_path = config::daemon_socket_path()?;

        let stream = UnixStream::connect(&socket_path).await.map_err(|e| {
            ParascopeError::DaemonConnection(format!(
                "Failed to connect to daemon at {:?}: {}",
                socket_path, e
            ))
        })?;

        let mut client = Self::from_stream(stream);
        client.authenticate().await?;
        Ok(client)
    }

    /// Create a DaemonClient from an existing Unix stream.
    ///
    /// Useful for tests connecting to a daemon at a custom socket path.
    /// Does NOT authenticate; call `authenticate()` afterwards.
    pub fn from_stream(stream: UnixStream) -> Self {
        Self {
            stream,
            request_id: AtomicU64::new(1),
        }
    }

    /// Authenticate with the daemon using the stored auth token.
    pub async fn authenticate(&mut self) -> Result<()> {
        let token = config::get_or_create_auth_token()?;
        self.authenticate_with_token(&token).await
    }

    /// Authenticate with the daemon using a provided token.
    pub async fn authenticate_with_token(&mut self, token: &str) -> Result<()> {
        let response = self
            .request(Operation::Auth(AuthRequest {
                token: token.to_string(),
            }))
            .await?;

        if response.ok {
            Ok(())
        } else {
            Err(ParascopeError::DaemonError(
                response
                    .error
                    .unwrap_or_else(|| "Authentication failed".to_string()),
            ))
        }
    }

    /// Send a request and wait for the matching response.
    async fn request(&mut self, op: Operation) -> Result<Response> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = Request { id, op };

        let data = serde_json::to_vec(&request)?;
        write_frame(&mut self.stream, &data).await.map_err(|e| {
            ParascopeError::DaemonProtocol(format!("Failed to send request: {}", e))
        })?;

        let response_data = read_frame(&mut self.stream).await.map_err(|e| {
            ParascopeError::DaemonProtocol(format!("Failed to read response: {}", e))
        })?;
        let response: Response = serde_json::from_slice(&response_data)?;

        if response.id != id {
            return Err(ParascopeError::DaemonProtocol(format!(
                "Response ID mismatch: expected {}, got {}",
                id, response.id
            )));
        }

        Ok(response)
    }

    fn expect_body<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
        if response.ok {
            let body = response
                .body
                .ok_or_else(|| ParascopeError::DaemonProtocol("Missing response body".into()))?;
            Ok(serde_json::from_value(body)?)
        } else {
            Err(ParascopeError::DaemonError(
                response.error.unwrap_or_default(),
            ))
        }
    }

    fn expect_ok(response: Response) -> Result<()> {
        if response.ok {
            Ok(())
        } else {
            Err(ParascopeError::DaemonError(
                response.error.unwrap_or_default(),
            ))
        }
    }

    /// Ping the daemon. Returns the daemon version string on success.
    pub async fn ping(&mut self) -> Result<String> {
        let response = self.request(Operation::Ping).await?;
        if response.ok {
            let version = response
                .body
                .and_then(|v| v.get("version").and_then(|v| v.as_str()).map(String::from))
                .unwrap_or_default();
            Ok(version)
        } else {
            Err(ParascopeError::DaemonError(
                response.error.unwrap_or_default(),
            ))
        }
    }

    /// Request daemon shutdown.
    pub async fn shutdown(&mut self) -> Result<()> {
        Self::expect_ok(self.request(Operation::Shutdown).await?)
    }

    /// Start (or restart) the streaming detection worker. Returns its PID.
    pub async fn start_detection(&mut self) -> Result<Option<u32>> {
        let response = self.request(Operation::StartDetection).await?;
        if response.ok {
            Ok(response
                .body
                .and_then(|v| v.get("pid").and_then(|p| p.as_u64()).map(|p| p as u32)))
        } else {
            Err(ParascopeError::DaemonError(
                response.error.unwrap_or_default(),
            ))
        }
    }

    /// Stop the streaming detection worker.
    pub async fn stop_detection(&mut self) -> Result<()> {
        Self::expect_ok(self.request(Operation::StopDetection).await?)
    }

    /// Query whether a streaming worker is running.
    pub async fn detection_status(&mut self) -> Result<DetectionStatusBody> {
        Self::expect_body(self.request(Operation::DetectionStatus).await?)
    }

    /// Analyze a single frame.
    pub async fn detect_frame(&mut self, frame: &str) -> Result<FrameResult> {
        Self::expect_body(
            self.request(Operation::DetectFrame {
                frame: frame.to_string(),
            })
            .await?,
        )
    }

    /// Persist a test record. Returns the record as stored, with its id.
    pub async fn save_test(&mut self, test: TestRecord) -> Result<TestRecord> {
        Self::expect_body(self.request(Operation::SaveTest(test)).await?)
    }

    /// List test records, optionally filtered by patient.
    pub async fn list_tests(&mut self, patient_id: Option<&str>) -> Result<Vec<TestRecord>> {
        Self::expect_body(
            self.request(Operation::ListTests {
                patient_id: patient_id.map(String::from),
            })
            .await?,
        )
    }

    /// Persist a captured image. Returns the stored metadata record.
    pub async fn save_image(&mut self, req: SaveImageRequest) -> Result<ImageRecord> {
        Self::expect_body(self.request(Operation::SaveImage(req)).await?)
    }

    /// List image records, optionally filtered by test.
    pub async fn list_images(&mut self, test_id: Option<&str>) -> Result<Vec<ImageRecord>> {
        Self::expect_body(
            self.request(Operation::ListImages {
                test_id: test_id.map(String::from),
            })
            .await?,
        )
    }

    /// Probe the detection service health endpoint.
    pub async fn health(&mut self) -> Result<HealthReport> {
        Self::expect_body(self.request(Operation::Health).await?)
    }

    /// Subscribe to an event category and stream frames to the callback.
    ///
    /// The connection switches to push mode; no further requests can be made
    /// on this client. The callback is invoked once per event frame and
    /// returns `false` to stop watching.
    pub async fn watch<F>(&mut self, category: &str, mut callback: F) -> Result<()>
    where
        F: FnMut(EventFrame) -> bool,
    {
        let response = self
            .request(Operation::Subscribe {
                category: category.to_string(),
            })
            .await?;
        Self::expect_ok(response)?;

        loop {
            let data = match read_frame(&mut self.stream).await {
                Ok(data) => data,
                Err(_) => break, // daemon went away
            };
            let pushed: Response = serde_json::from_slice(&data)?;
            if pushed.id != EVENT_FRAME_ID {
                continue;
            }
            let Some(body) = pushed.body else { continue };
            let frame: EventFrame = serde_json::from_value(body)?;
            if !callback(frame) {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_increment() {
        let counter = AtomicU64::new(1);
        assert_eq!(counter.fetch_add(1, Ordering::SeqCst), 1);
        assert_eq!(counter.fetch_add(1, Ordering::SeqCst), 2);
    }

    #[test]
    fn test_expect_body_surfaces_daemon_error() {
        let response = Response::err(1, "worker script missing");
        let result: Result<Vec<TestRecord>> = DaemonClient::expect_body(response);
        assert!(matches!(result, Err(ParascopeError::DaemonError(ref m)) if m.contains("worker")));
    }

    #[test]
    fn test_expect_body_parses_typed_payload() {
        let body = DetectionStatusBody {
            running: true,
            pid: Some(4242),
        };
        let response = Response::ok(1, &body);
        let parsed: DetectionStatusBody = DaemonClient::expect_body(response).unwrap();
        assert!(parsed.running);
        assert_eq!(parsed.pid, Some(4242));
    }
}
