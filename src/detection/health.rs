//! Detection service health probe.
//!
//! Performs a GET against the configured health endpoint and folds every
//! possible failure (connection refused, timeout, non-2xx, garbage body)
//! into an `offline` report, so callers get a uniform shape either way.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::HealthConfig;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whatever extra fields the service reported alongside its status
    #[serde(flatten)]
    pub detail: serde_json::Map<String, serde_json::Value>,
}

impl HealthReport {
    fn offline(error: impl Into<String>) -> Self {
        Self {
            status: "offline".to_string(),
            error: Some(error.into()),
            detail: serde_json::Map::new(),
        }
    }
}

pub struct HealthProbe {
    config: HealthConfig,
    client: reqwest::Client,
}

impl HealthProbe {
    pub fn new(config: HealthConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| crate::error::ParascopeError::Config(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Probe the endpoint once. Never fails; an unreachable or misbehaving
    /// service yields an offline report with the reason attached.
    pub async fn check(&self) -> HealthReport {
        let response = match self
            .client
            .get(&self.config.endpoint)
            .timeout(self.config.timeout())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!(endpoint = self.config.endpoint, error = %e, "Health probe failed");
                return HealthReport::offline(e.to_string());
            }
        };

        if !response.status().is_success() {
            return HealthReport::offline(format!("service returned {}", response.status()));
        }

        let body: serde_json::Value = match response.json().await {
            Ok(body) => body,
            Err(e) => return HealthReport::offline(format!("invalid health body: {}", e)),
        };

        let serde_json::Value::Object(mut fields) = body else {
            return HealthReport::offline("health body is not an object");
        };

        let status = match fields.remove("status") {
            Some(serde_json::Value::String(s)) => s,
            _ => "online".to_string(),
        };

        HealthReport {
            status,
            error: None,
            detail: fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(endpoint: &str) -> HealthProbe {
        HealthProbe::new(HealthConfig {
            endpoint: endpoint.to_string(),
            timeout_secs: 1,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_unreachable_service_is_offline() {
        // reserved port that nothing listens on
        let report = probe("http://127.0.0.1:9/api/health").check().await;
        assert_eq!(report.status, "offline");
        assert!(report.error.is_some());
    }

    #[tokio::test]
    async fn test_live_endpoint_passes_status_through() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let body = r#"{"status":"ok","model":"yolov5"}"#;
                let reply = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(reply.as_bytes()).await;
            }
        });

        let report = probe(&format!("http://{}/api/health", addr)).check().await;
        assert_eq!(report.status, "ok");
        assert!(report.error.is_none());
        assert_eq!(report.detail["model"], "yolov5");
    }

    #[test]
    fn test_offline_report_serializes_flat() {
        let report = HealthReport::offline("connection refused");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "offline");
        assert_eq!(json["error"], "connection refused");
    }
}
