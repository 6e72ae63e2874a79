//! IPC protocol types and framing for daemon communication.
//!
//! Defines the Request/Response envelopes and the length-delimited JSON
//! protocol used between the CLI and the detection daemon over a Unix
//! domain socket.
//!
//! ## Protocol Format
//!
//! Messages are framed using a simple length-delimited format:
//! - 4 bytes: message length (big-endian u32)
//! - N bytes: JSON-encoded message
//!
//! A connection that issued `Subscribe` also receives unsolicited Response
//! frames with id [`EVENT_FRAME_ID`], each carrying an [`EventFrame`] body.

use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::models::{SampleKind, TestRecord};

/// Maximum message size (16 MB). Leaves headroom for a base64 camera frame
/// while still bounding memory per connection.
pub const MAX_MESSAGE_SIZE: u32 = 16 * 1024 * 1024;

/// Reserved response id for server-pushed event frames.
pub const EVENT_FRAME_ID: u64 = 0;

/// IPC Request envelope sent from CLI to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Unique request identifier for correlating responses
    pub id: u64,
    /// The operation to perform
    pub op: Operation,
}

impl Request {
    pub fn new(id: u64, op: Operation) -> Self {
        Self { id, op }
    }
}

/// IPC Response envelope sent from daemon to CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Request ID this response corresponds to
    pub id: u64,
    /// Whether the operation succeeded
    pub ok: bool,
    /// Response body (operation-specific data)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    /// Error message if ok is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Create a successful response with a body
    pub fn ok(id: u64, body: impl Serialize) -> Self {
        Self {
            id,
            ok: true,
            body: Some(serde_json::to_value(body).unwrap_or(serde_json::Value::Null)),
            error: None,
        }
    }

    /// Create a successful response with no body
    pub fn ok_empty(id: u64) -> Self {
        Self {
            id,
            ok: true,
            body: None,
            error: None,
        }
    }

    /// Create an error response
    pub fn err(id: u64, error: impl Into<String>) -> Self {
        Self {
            id,
            ok: false,
            body: None,
            error: Some(error.into()),
        }
    }

    /// Server-pushed event frame for a subscribed connection
    pub fn event(frame: &EventFrame) -> Self {
        Self::ok(EVENT_FRAME_ID, frame)
    }
}

/// Authentication request sent as the first message on connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    /// The authentication token (should match ~/.parascope/daemon/auth.token)
    pub token: String,
}

/// Event pushed to subscribed connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    /// Category label, e.g. "detection-update"
    pub category: String,
    pub payload: serde_json::Value,
}

/// Operations supported by the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Operation {
    // Authentication
    /// Authenticate the connection (must be first message)
    Auth(AuthRequest),

    // Daemon control
    /// Check if daemon is alive
    Ping,
    /// Request daemon shutdown
    Shutdown,

    // Streaming detection
    /// Start (or restart) the streaming detection worker
    StartDetection,
    /// Stop the streaming detection worker
    StopDetection,
    /// Report whether a worker is running and its PID
    DetectionStatus,
    /// Subscribe this connection to an event category
    Subscribe { category: String },

    // One-shot detection
    /// Analyze a single frame with a fresh worker process
    DetectFrame {
        /// Frame payload as handed to the worker, typically base64
        frame: String,
    },

    // Records
    /// Persist a completed test
    SaveTest(TestRecord),
    /// List tests, optionally for one patient
    ListTests { patient_id: Option<String> },
    /// Persist a captured image and its metadata record
    SaveImage(SaveImageRequest),
    /// List image records, optionally for one test
    ListImages { test_id: Option<String> },

    /// Probe the detection service health endpoint
    Health,
}

/// Request payload for saving a captured image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveImageRequest {
    /// Test the capture belongs to
    pub test_id: String,
    /// Partition the image file is stored under
    pub kind: SampleKind,
    /// Image bytes, base64-encoded
    pub data: String,
}

/// Body returned for DetectionStatus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionStatusBody {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

/// Write a length-delimited frame to an async writer.
///
/// # Errors
///
/// Returns an error if the data exceeds MAX_MESSAGE_SIZE or if writing fails.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    if data.len() > MAX_MESSAGE_SIZE as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "message too large: {} bytes (max {})",
                data.len(),
                MAX_MESSAGE_SIZE
            ),
        ));
    }

    let len = data.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read a length-delimited frame from an async reader.
///
/// # Errors
///
/// Returns an error if:
/// - The connection is closed (EOF when reading length)
/// - The message size exceeds MAX_MESSAGE_SIZE
/// - Reading fails
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;

    let len = u32::from_be_bytes(len_buf);

    if len > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message too large: {} bytes (max {})", len, MAX_MESSAGE_SIZE),
        ));
    }

    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Serialize and write a request to an async writer.
pub async fn write_request<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    request: &Request,
) -> io::Result<()> {
    let json =
        serde_json::to_vec(request).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    write_frame(writer, &json).await
}

/// Read and deserialize a request from an async reader.
pub async fn read_request<R: AsyncReadExt + Unpin>(reader: &mut R) -> io::Result<Request> {
    let data = read_frame(reader).await?;
    serde_json::from_slice(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Serialize and write a response to an async writer.
pub async fn write_response<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    response: &Response,
) -> io::Result<()> {
    let json =
        serde_json::to_vec(response).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    write_frame(writer, &json).await
}

/// Read and deserialize a response from an async reader.
pub async fn read_response<R: AsyncReadExt + Unpin>(reader: &mut R) -> io::Result<Response> {
    let data = read_frame(reader).await?;
    serde_json::from_slice(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_request_serialization_roundtrip() {
        let request = Request::new(42, Operation::Ping);
        let json = serde_json::to_string(&request).unwrap();
        let deserialized: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.id, 42);
        assert!(matches!(deserialized.op, Operation::Ping));
    }

    #[test]
    fn test_operation_tagged_serialization() {
        let op = Operation::DetectFrame {
            frame: "aGVsbG8=".to_string(),
        };
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains(r#""type":"DetectFrame""#));
        assert!(json.contains(r#""data""#));

        let deserialized: Operation = serde_json::from_str(&json).unwrap();
        if let Operation::DetectFrame { frame } = deserialized {
            assert_eq!(frame, "aGVsbG8=");
        } else {
            panic!("Expected DetectFrame operation");
        }
    }

    #[test]
    fn test_unit_variant_has_no_data() {
        let json = serde_json::to_string(&Operation::StartDetection).unwrap();
        assert!(json.contains(r#""type":"StartDetection""#));
        assert!(!json.contains(r#""data""#));
    }

    #[test]
    fn test_save_image_request_roundtrip() {
        let op = Operation::SaveImage(SaveImageRequest {
            test_id: "test-1".to_string(),
            kind: crate::models::SampleKind::Blood,
            data: "Zm9v".to_string(),
        });
        let json = serde_json::to_string(&op).unwrap();
        let deserialized: Operation = serde_json::from_str(&json).unwrap();
        if let Operation::SaveImage(req) = deserialized {
            assert_eq!(req.test_id, "test-1");
            assert_eq!(req.kind, crate::models::SampleKind::Blood);
        } else {
            panic!("Expected SaveImage operation");
        }
    }

    #[test]
    fn test_response_err_serialization() {
        let response = Response::err(2, "worker script missing");
        let json = serde_json::to_string(&response).unwrap();
        let deserialized: Response = serde_json::from_str(&json).unwrap();
        assert!(!deserialized.ok);
        assert!(deserialized.body.is_none());
        assert_eq!(deserialized.error.unwrap(), "worker script missing");
    }

    #[test]
    fn test_event_frame_uses_reserved_id() {
        let frame = EventFrame {
            category: "detection-update".to_string(),
            payload: serde_json::json!({"status": "analyzing"}),
        };
        let response = Response::event(&frame);
        assert_eq!(response.id, EVENT_FRAME_ID);
        assert!(response.ok);
        let body = response.body.unwrap();
        assert_eq!(body["category"], "detection-update");
        assert_eq!(body["payload"]["status"], "analyzing");
    }

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let data = b"hello, world!";

        let mut buf = Vec::new();
        write_frame(&mut buf, data).await.unwrap();

        assert_eq!(buf.len(), 4 + data.len());
        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        assert_eq!(len as usize, data.len());

        let mut reader = Cursor::new(buf);
        let read_data = read_frame(&mut reader).await.unwrap();
        assert_eq!(read_data, data);
    }

    #[tokio::test]
    async fn test_read_frame_size_limit() {
        let mut buf = Vec::new();
        let oversized_len = MAX_MESSAGE_SIZE + 1;
        buf.extend_from_slice(&oversized_len.to_be_bytes());
        buf.extend_from_slice(b"some data");

        let mut reader = Cursor::new(buf);
        let result = read_frame(&mut reader).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("message too large"));
    }

    #[tokio::test]
    async fn test_multiple_frames() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"first").await.unwrap();
        write_frame(&mut buf, b"second").await.unwrap();

        let mut reader = Cursor::new(buf);
        assert_eq!(read_frame(&mut reader).await.unwrap(), b"first");
        assert_eq!(read_frame(&mut reader).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_request_response_roundtrip() {
        let request = Request::new(
            7,
            Operation::ListTests {
                patient_id: Some("P001".to_string()),
            },
        );
        let mut buf = Vec::new();
        write_request(&mut buf, &request).await.unwrap();

        let mut reader = Cursor::new(buf);
        let read_back = read_request(&mut reader).await.unwrap();
        assert_eq!(read_back.id, 7);
        assert!(matches!(
            read_back.op,
            Operation::ListTests { patient_id: Some(ref p) } if p == "P001"
        ));
    }
}
