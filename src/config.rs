//! Host configuration and well-known paths.
//!
//! Manages the config file at `~/.parascope/config.toml`, the data directory
//! holding the document store, and the daemon runtime files (socket, PID,
//! auth token) under `~/.parascope/daemon/`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ParascopeError, Result};

/// Get the parascope home directory (~/.parascope)
pub fn config_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".parascope"))
        .ok_or_else(|| ParascopeError::Config("Could not determine home directory".into()))
}

/// Get the path to the config file (~/.parascope/config.toml)
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Get the data directory holding record collections and captured images
/// (~/.parascope/data)
pub fn data_dir() -> Result<PathBuf> {
    Ok(config_dir()?.join("data"))
}

/// Get the daemon directory (~/.parascope/daemon)
pub fn daemon_dir() -> Result<PathBuf> {
    Ok(config_dir()?.join("daemon"))
}

/// Get the daemon socket path (~/.parascope/daemon/parascoped.sock)
pub fn daemon_socket_path() -> Result<PathBuf> {
    Ok(daemon_dir()?.join("parascoped.sock"))
}

/// Get the daemon PID file path (~/.parascope/daemon/parascoped.pid)
pub fn daemon_pid_path() -> Result<PathBuf> {
    Ok(daemon_dir()?.join("parascoped.pid"))
}

/// Get the daemon auth token path (~/.parascope/daemon/auth.token)
pub fn daemon_auth_token_path() -> Result<PathBuf> {
    Ok(daemon_dir()?.join("auth.token"))
}

/// Generate or read the token used to authenticate IPC connections.
///
/// If the token file exists, reads and returns it. Otherwise generates a new
/// UUID token and writes it with 0600 permissions on Unix.
pub fn get_or_create_auth_token() -> Result<String> {
    let path = daemon_auth_token_path()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if path.exists() {
        Ok(std::fs::read_to_string(&path)?.trim().to_string())
    } else {
        let token = uuid::Uuid::new_v4().to_string();
        std::fs::write(&path, &token)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(token)
    }
}

/// Settings for the external detection worker processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Interpreter used to run the worker scripts
    pub command: String,
    /// Script for streaming detection; defaults to
    /// `~/.parascope/worker/live_detection.py`
    pub stream_script: Option<PathBuf>,
    /// Script for one-shot frame detection; defaults to
    /// `~/.parascope/worker/detect.py`
    pub frame_script: Option<PathBuf>,
    /// Grace period after signalling an old worker before its replacement
    /// is spawned, in milliseconds
    pub replace_grace_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command: "python3".to_string(),
            stream_script: None,
            frame_script: None,
            replace_grace_ms: 200,
        }
    }
}

impl WorkerConfig {
    pub fn stream_script(&self) -> Result<PathBuf> {
        match &self.stream_script {
            Some(path) => Ok(path.clone()),
            None => Ok(config_dir()?.join("worker").join("live_detection.py")),
        }
    }

    pub fn frame_script(&self) -> Result<PathBuf> {
        match &self.frame_script {
            Some(path) => Ok(path.clone()),
            None => Ok(config_dir()?.join("worker").join("detect.py")),
        }
    }

    pub fn replace_grace(&self) -> Duration {
        Duration::from_millis(self.replace_grace_ms)
    }
}

/// Settings for the detection service health probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/api/health".to_string(),
            timeout_secs: 3,
        }
    }
}

impl HealthConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Top-level configuration loaded from ~/.parascope/config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub worker: WorkerConfig,
    pub health: HealthConfig,
    /// Override for the data directory; defaults to ~/.parascope/data
    pub data_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(path) => Ok(path.clone()),
            None => data_dir(),
        }
    }
}

/// Load the configuration, falling back to defaults if the file is missing.
pub fn load() -> Result<AppConfig> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    Ok(toml::from_str(&content)?)
}

/// Save the configuration to ~/.parascope/config.toml
pub fn save(config: &AppConfig) -> Result<()> {
    let path = config_path()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| ParascopeError::Config(format!("Failed to serialize config: {}", e)))?;

    std::fs::write(&path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir() {
        let dir = config_dir().unwrap();
        assert!(dir.ends_with(".parascope"));
    }

    #[test]
    fn test_daemon_paths() {
        assert!(daemon_socket_path().unwrap().ends_with("parascoped.sock"));
        assert!(daemon_pid_path().unwrap().ends_with("parascoped.pid"));
        let token_path = daemon_auth_token_path().unwrap();
        assert!(token_path.ends_with("auth.token"));
        assert!(token_path.parent().unwrap().ends_with("daemon"));
    }

    #[test]
    fn test_default_worker_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.command, "python3");
        assert!(config.stream_script().unwrap().ends_with("live_detection.py"));
        assert!(config.frame_script().unwrap().ends_with("detect.py"));
        assert_eq!(config.replace_grace(), Duration::from_millis(200));
    }

    #[test]
    fn test_config_roundtrip_toml() {
        let config = AppConfig {
            worker: WorkerConfig {
                command: "python".to_string(),
                stream_script: Some(PathBuf::from("/opt/worker/live.py")),
                frame_script: None,
                replace_grace_ms: 500,
            },
            ..Default::default()
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.worker.command, "python");
        assert_eq!(
            parsed.worker.stream_script().unwrap(),
            PathBuf::from("/opt/worker/live.py")
        );
        assert_eq!(parsed.worker.replace_grace_ms, 500);
    }
}
