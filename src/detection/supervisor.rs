//! Streaming detection worker supervision.
//!
//! The supervisor owns at most one long-running worker process at a time.
//! The worker writes one JSON event per stdout line; stderr lines are
//! wrapped as diagnostic events. Starting while a worker is live signals the
//! old process group and waits a short grace period before spawning the
//! replacement, and starts are serialized so two racing callers can never
//! leave two workers running.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bridge::{Category, EventBus};
use crate::config::WorkerConfig;
use crate::detection::event::DetectionEvent;

/// Result of a start request, reported back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    pub started: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct ActiveWorker {
    generation: u64,
    pid: u32,
}

pub struct DetectionSupervisor {
    config: WorkerConfig,
    bus: Arc<EventBus>,
    active: tokio::sync::Mutex<Option<ActiveWorker>>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<DetectionEvent>>>,
    generation: AtomicU64,
}

impl DetectionSupervisor {
    pub fn new(config: WorkerConfig, bus: Arc<EventBus>) -> Self {
        Self {
            config,
            bus,
            active: tokio::sync::Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Register a direct listener for normalized detection events.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<DetectionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.push(tx);
        rx
    }

    /// PID of the live worker, if any.
    pub async fn current_pid(&self) -> Option<u32> {
        self.active.lock().await.as_ref().map(|w| w.pid)
    }

    fn publish(&self, event: DetectionEvent) {
        {
            let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            listeners.retain(|tx| tx.send(event.clone()).is_ok());
        }
        self.bus.publish(Category::DetectionUpdate, &event);
    }

    /// Send SIGTERM to the worker's process group so the interpreter and
    /// anything it forked go down together.
    fn signal_group(pid: u32) {
        #[cfg(unix)]
        unsafe {
            libc::kill(-(pid as i32), libc::SIGTERM);
        }
        #[cfg(not(unix))]
        let _ = pid;
    }

    /// Start the streaming worker, replacing any worker already running.
    ///
    /// Spawn failures are reported both in the returned outcome and as a
    /// `failed` event to subscribers. The slot lock is held across the
    /// replace-signal, grace wait and spawn, so concurrent starts queue up
    /// rather than interleave.
    pub async fn start(self: &Arc<Self>) -> StartOutcome {
        let mut active = self.active.lock().await;

        if let Some(old) = active.take() {
            info!(pid = old.pid, "Replacing running detection worker");
            Self::signal_group(old.pid);
            tokio::time::sleep(self.config.replace_grace()).await;
        }

        let script = match self.config.stream_script() {
            Ok(path) => path,
            Err(e) => return self.fail_start(e.to_string()),
        };
        if !script.exists() {
            return self.fail_start(format!("worker script not found: {}", script.display()));
        }

        let mut command = Command::new(&self.config.command);
        command
            .arg(&script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        unsafe {
            command.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => return self.fail_start(format!("failed to spawn worker: {}", e)),
        };

        let pid = match child.id() {
            Some(pid) => pid,
            None => return self.fail_start("worker exited before it could be tracked".to_string()),
        };
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *active = Some(ActiveWorker { generation, pid });
        info!(pid, %generation, script = %script.display(), "Started detection worker");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        if let Some(stderr) = stderr {
            let supervisor = Arc::clone(self);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    warn!(pid, line, "Worker stderr");
                    supervisor.publish(DetectionEvent::stderr_chatter(&line));
                }
            });
        }

        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match DetectionEvent::parse_line(line) {
                        Ok(event) => supervisor.publish(event),
                        Err(e) => debug!(pid, line, error = %e, "Skipping unparseable worker line"),
                    }
                }
            }

            match child.wait().await {
                Ok(status) => info!(pid, %status, "Detection worker exited"),
                Err(e) => warn!(pid, error = %e, "Failed to reap detection worker"),
            }

            let mut active = supervisor.active.lock().await;
            if active.as_ref().is_some_and(|w| w.generation == generation) {
                *active = None;
            }
            drop(active);

            supervisor.publish(DetectionEvent::stopped());
        });

        StartOutcome {
            started: true,
            pid: Some(pid),
            error: None,
        }
    }

    fn fail_start(&self, error: String) -> StartOutcome {
        warn!(error, "Detection worker start failed");
        self.publish(DetectionEvent::failed(error.clone()));
        StartOutcome {
            started: false,
            pid: None,
            error: Some(error),
        }
    }

    /// Stop the running worker, if any, and drop all direct listeners.
    ///
    /// Returns as soon as the signal is sent; the terminal `stopped` event
    /// is published by the reader task once the exit is observed. Calling
    /// this with no worker running is a no-op.
    pub async fn stop(&self) {
        let mut active = self.active.lock().await;
        if let Some(worker) = active.take() {
            info!(pid = worker.pid, "Stopping detection worker");
            Self::signal_group(worker.pid);
        }
        drop(active);

        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.clear();
    }
}
