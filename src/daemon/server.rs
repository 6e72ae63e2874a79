//! Request dispatch for the detection daemon.
//!
//! Each accepted connection authenticates first, then issues requests in a
//! loop. A connection that sends `Subscribe` switches to push mode: the
//! daemon streams event frames to it until the client goes away, and no
//! further requests are read from that connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::bridge::{Category, EventBus};
use crate::config::AppConfig;
use crate::daemon::listener::IpcConnection;
use crate::daemon::protocol::{DetectionStatusBody, EventFrame, Operation, Request, Response};
use crate::detection::{DetectionSupervisor, HealthProbe, OneShotClient};
use crate::error::Result;
use crate::store::DocumentStore;

/// Shared state behind every connection.
pub struct DaemonState {
    pub bus: Arc<EventBus>,
    pub supervisor: Arc<DetectionSupervisor>,
    pub oneshot: OneShotClient,
    pub store: DocumentStore,
    pub probe: HealthProbe,
}

impl DaemonState {
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let bus = Arc::new(EventBus::new());
        let supervisor = Arc::new(DetectionSupervisor::new(
            config.worker.clone(),
            Arc::clone(&bus),
        ));
        let store = DocumentStore::new(config.data_dir()?);
        store.ensure().await?;

        Ok(Self {
            bus,
            supervisor,
            oneshot: OneShotClient::new(config.worker.clone()),
            store,
            probe: HealthProbe::new(config.health.clone())?,
        })
    }

    /// Stop the worker and drop all subscribers, for daemon shutdown.
    pub async fn shutdown(&self) {
        self.supervisor.stop().await;
        self.bus.clear();
    }
}

/// Handle a single client connection.
///
/// The first message must be an Auth operation with a valid token;
/// connections that fail authentication are rejected.
pub async fn handle_connection(
    mut conn: IpcConnection,
    state: &Arc<DaemonState>,
    expected_token: &str,
    shutdown_flag: &AtomicBool,
) -> Result<()> {
    let auth_request = match conn.recv_request().await {
        Ok(req) => req,
        Err(_) => return Ok(()), // connection closed before auth
    };

    match &auth_request.op {
        Operation::Auth(auth) => {
            if auth.token != expected_token {
                warn!("Authentication failed: invalid token");
                conn.send_response(&Response::err(auth_request.id, "Authentication failed"))
                    .await?;
                return Ok(());
            }
            conn.send_response(&Response::ok_empty(auth_request.id))
                .await?;
            debug!("Client authenticated successfully");
        }
        _ => {
            warn!("First message was not Auth, rejecting connection");
            conn.send_response(&Response::err(auth_request.id, "First message must be Auth"))
                .await?;
            return Ok(());
        }
    }

    loop {
        let request = match conn.recv_request().await {
            Ok(req) => req,
            Err(_) => break, // connection closed
        };

        if let Operation::Subscribe { category } = &request.op {
            return stream_events(conn, state, request.id, category).await;
        }

        let (response, should_shutdown) = dispatch_request(request, state).await;
        conn.send_response(&response).await?;

        if should_shutdown {
            shutdown_flag.store(true, Ordering::SeqCst);
            break;
        }
    }
    Ok(())
}

/// Switch a connection into push mode for one event category.
///
/// Frames are written until the client disconnects; the bus prunes the
/// subscription on the publish after the channel closes.
async fn stream_events(
    mut conn: IpcConnection,
    state: &Arc<DaemonState>,
    request_id: u64,
    category: &str,
) -> Result<()> {
    let category: Category = match category.parse() {
        Ok(category) => category,
        Err(e) => {
            conn.send_response(&Response::err(request_id, e)).await?;
            return Ok(());
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    state.bus.subscribe(category, tx);
    conn.send_response(&Response::ok_empty(request_id)).await?;
    debug!(category = category.as_str(), "Connection subscribed");

    while let Some(payload) = rx.recv().await {
        let frame = EventFrame {
            category: category.as_str().to_string(),
            payload,
        };
        if conn.send_response(&Response::event(&frame)).await.is_err() {
            break; // client went away, drop the subscription
        }
    }
    Ok(())
}

/// Dispatch a request to the appropriate handler.
///
/// Returns the response and a flag indicating if the daemon should shutdown.
pub async fn dispatch_request(request: Request, state: &Arc<DaemonState>) -> (Response, bool) {
    let id = request.id;

    match request.op {
        // Auth is only valid as the first message; reject if sent later
        Operation::Auth(_) => (
            Response::err(id, "Auth is only valid as the first message"),
            false,
        ),

        Operation::Ping => {
            let response = Response::ok(
                id,
                serde_json::json!({
                    "version": env!("CARGO_PKG_VERSION"),
                    "status": "running"
                }),
            );
            (response, false)
        }

        Operation::Shutdown => (Response::ok(id, "shutdown_ack"), true),

        Operation::StartDetection => {
            let outcome = state.supervisor.start().await;
            if outcome.started {
                (Response::ok(id, &outcome), false)
            } else {
                let error = outcome
                    .error
                    .unwrap_or_else(|| "worker start failed".to_string());
                (Response::err(id, error), false)
            }
        }

        Operation::StopDetection => {
            state.supervisor.stop().await;
            (Response::ok_empty(id), false)
        }

        Operation::DetectionStatus => {
            let pid = state.supervisor.current_pid().await;
            let body = DetectionStatusBody {
                running: pid.is_some(),
                pid,
            };
            (Response::ok(id, &body), false)
        }

        // handled by stream_events before dispatch
        Operation::Subscribe { .. } => (
            Response::err(id, "Subscribe is not valid on this connection"),
            false,
        ),

        Operation::DetectFrame { frame } => {
            let result = state.oneshot.detect_frame(&frame).await;
            (Response::ok(id, &result), false)
        }

        Operation::SaveTest(test) => match state.store.append_test(test).await {
            Ok(stored) => {
                state.bus.publish(Category::TestSaved, &stored);
                (Response::ok(id, &stored), false)
            }
            Err(e) => (Response::err(id, e.to_string()), false),
        },

        Operation::ListTests { patient_id } => {
            let tests = state.store.list_tests(patient_id.as_deref()).await;
            (Response::ok(id, &tests), false)
        }

        Operation::SaveImage(req) => {
            let bytes = match BASE64.decode(&req.data) {
                Ok(bytes) => bytes,
                Err(e) => return (Response::err(id, format!("invalid image data: {}", e)), false),
            };
            match state.store.save_image(&req.test_id, req.kind, &bytes).await {
                Ok(record) => {
                    state.bus.publish(Category::ImageSaved, &record);
                    (Response::ok(id, &record), false)
                }
                Err(e) => (Response::err(id, e.to_string()), false),
            }
        }

        Operation::ListImages { test_id } => {
            let images = state.store.list_images(test_id.as_deref()).await;
            (Response::ok(id, &images), false)
        }

        Operation::Health => {
            let report = state.probe.check().await;
            (Response::ok(id, &report), false)
        }
    }
}
