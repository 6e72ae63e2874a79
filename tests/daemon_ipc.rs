//! End-to-end IPC tests: a real listener on a temp socket, the typed
//! client on the other end, and the full dispatch path in between.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use tokio::net::UnixStream;
use tokio::time::timeout;

use parascope::config::{AppConfig, HealthConfig, WorkerConfig};
use parascope::daemon::DaemonClient;
use parascope::daemon::listener::IpcListener;
use parascope::daemon::server::{DaemonState, handle_connection};
use parascope::models::{TestKind, TestRecord};

const TOKEN: &str = "it-token";

struct TestDaemon {
    socket_path: PathBuf,
    _dir: tempfile::TempDir,
}

impl TestDaemon {
    /// Bind a listener in a tempdir and serve connections in the background.
    async fn spawn(worker_script: Option<&str>) -> Self {
        let dir = tempfile::tempdir().unwrap();

        let stream_script = worker_script.map(|body| {
            let path = dir.path().join("worker.sh");
            std::fs::write(&path, body).unwrap();
            path
        });

        let config = AppConfig {
            worker: WorkerConfig {
                command: "sh".to_string(),
                stream_script: Some(
                    stream_script.unwrap_or_else(|| dir.path().join("absent.sh")),
                ),
                frame_script: None,
                replace_grace_ms: 10,
            },
            health: HealthConfig {
                endpoint: "http://127.0.0.1:9/api/health".to_string(),
                timeout_secs: 1,
            },
            data_dir: Some(dir.path().join("data")),
        };

        let state = Arc::new(DaemonState::from_config(&config).await.unwrap());
        let socket_path = dir.path().join("test.sock");
        let listener = IpcListener::bind(&socket_path).await.unwrap();

        tokio::spawn(async move {
            let shutdown = Arc::new(AtomicBool::new(false));
            loop {
                let Ok(conn) = listener.accept().await else {
                    break;
                };
                let state = Arc::clone(&state);
                let shutdown = Arc::clone(&shutdown);
                tokio::spawn(async move {
                    let _ = handle_connection(conn, &state, TOKEN, &shutdown).await;
                });
            }
        });

        Self {
            socket_path,
            _dir: dir,
        }
    }

    async fn client(&self) -> DaemonClient {
        let stream = UnixStream::connect(&self.socket_path).await.unwrap();
        let mut client = DaemonClient::from_stream(stream);
        client.authenticate_with_token(TOKEN).await.unwrap();
        client
    }
}

fn sample_test(patient: &str) -> TestRecord {
    TestRecord {
        id: String::new(),
        patient_id: patient.to_string(),
        name: "Malaria smear".to_string(),
        kind: TestKind::Blood,
        smear: "thin".to_string(),
        date: "2026-08-28T10:00:00Z".to_string(),
        result: "negative".to_string(),
        taken_by: Some("tech-1".to_string()),
    }
}

#[tokio::test]
async fn test_ping_over_socket() {
    let daemon = TestDaemon::spawn(None).await;
    let mut client = daemon.client().await;

    let version = client.ping().await.unwrap();
    assert_eq!(version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_bad_token_is_rejected() {
    let daemon = TestDaemon::spawn(None).await;

    let stream = UnixStream::connect(&daemon.socket_path).await.unwrap();
    let mut client = DaemonClient::from_stream(stream);
    assert!(client.authenticate_with_token("wrong").await.is_err());
}

#[tokio::test]
async fn test_save_and_list_round_trip() {
    let daemon = TestDaemon::spawn(None).await;
    let mut client = daemon.client().await;

    let stored = client.save_test(sample_test("P001")).await.unwrap();
    assert!(stored.id.starts_with("test-"));
    client.save_test(sample_test("P002")).await.unwrap();

    let all = client.list_tests(None).await.unwrap();
    assert_eq!(all.len(), 2);

    let filtered = client.list_tests(Some("P001")).await.unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].patient_id, "P001");
}

#[tokio::test]
async fn test_detection_status_reflects_worker() {
    let daemon = TestDaemon::spawn(Some("sleep 30\n")).await;
    let mut client = daemon.client().await;

    let idle = client.detection_status().await.unwrap();
    assert!(!idle.running);

    let pid = client.start_detection().await.unwrap();
    assert!(pid.is_some());

    let running = client.detection_status().await.unwrap();
    assert!(running.running);
    assert_eq!(running.pid, pid);

    client.stop_detection().await.unwrap();
    let stopped = client.detection_status().await.unwrap();
    assert!(!stopped.running);
}

#[tokio::test]
async fn test_subscriber_receives_saved_test_events() {
    let daemon = TestDaemon::spawn(None).await;

    let mut watcher = daemon.client().await;
    let mut producer = daemon.client().await;

    let watch_task = tokio::spawn(async move {
        let mut seen = Vec::new();
        watcher
            .watch("test-saved", |frame| {
                seen.push(frame);
                false // one event is enough
            })
            .await
            .unwrap();
        seen
    });

    // Give the subscription time to register before publishing
    tokio::time::sleep(Duration::from_millis(100)).await;
    producer.save_test(sample_test("P009")).await.unwrap();

    let seen = timeout(Duration::from_secs(5), watch_task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].category, "test-saved");
    assert_eq!(seen[0].payload["patientId"], "P009");
}

#[tokio::test]
async fn test_watch_streams_detection_events() {
    let script = concat!(
        "sleep 0.2\n",
        "printf '{\"status\":\"analyzing\"}\\n'\n",
        "printf '{\"status\":\"success\",\"boxes\":[[0,0,10,10]]}\\n'\n",
    );
    let daemon = TestDaemon::spawn(Some(script)).await;

    let mut watcher = daemon.client().await;
    let mut controller = daemon.client().await;

    let watch_task = tokio::spawn(async move {
        let mut statuses = Vec::new();
        watcher
            .watch("detection-update", |frame| {
                let status = frame.payload["status"].as_str().unwrap_or("").to_string();
                let done = status == "stopped";
                statuses.push(status);
                !done
            })
            .await
            .unwrap();
        statuses
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    controller.start_detection().await.unwrap();

    let statuses = timeout(Duration::from_secs(5), watch_task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(statuses, vec!["analyzing", "detected", "stopped"]);
}

#[tokio::test]
async fn test_unknown_subscribe_category_errors() {
    let daemon = TestDaemon::spawn(None).await;
    let mut client = daemon.client().await;

    let result = client.watch("nonsense", |_| true).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_health_folds_failures_to_offline() {
    let daemon = TestDaemon::spawn(None).await;
    let mut client = daemon.client().await;

    let report = client.health().await.unwrap();
    assert_eq!(report.status, "offline");
    assert!(report.error.is_some());
}
