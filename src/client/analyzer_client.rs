//! AnalyzerClient (C10): a transport-agnostic contract for delegating
//! extraction to a remote `fingerprint-server`.
//!
//! Blocking by design — called from pipeline worker OS threads, which have
//! no tokio runtime to drive an async client on (spec §4.10).

use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::error::TransportError;
use crate::models::{FingerprintRequest, FingerprintResponse};

const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_TIMEOUT: Duration = Duration::from_millis(1_000);
const HEALTH_CACHE_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct HealthBody {
    status: String,
}

struct HealthCache {
    checked_at: Instant,
    healthy: bool,
}

/// One client per remote analyzer endpoint. Health is probed at most once
/// per [`HEALTH_CACHE_TTL`] so a busy worker pool doesn't hammer `/health`.
pub struct AnalyzerClient {
    base_url: String,
    client: Client,
    health: Mutex<Option<HealthCache>>,
}

impl AnalyzerClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(ANALYSIS_TIMEOUT)
            .build()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        Ok(Self { base_url: base_url.into(), client, health: Mutex::new(None) })
    }

    /// `GET /health`, cached for [`HEALTH_CACHE_TTL`]. Per spec §4.9.5,
    /// unhealthy means workers skip the remote step entirely without a
    /// per-job attempt.
    pub fn is_healthy(&self) -> bool {
        let mut guard = self.health.lock().unwrap();
        if let Some(cache) = guard.as_ref() {
            if cache.checked_at.elapsed() < HEALTH_CACHE_TTL {
                return cache.healthy;
            }
        }

        let healthy = self.probe_health();
        *guard = Some(HealthCache { checked_at: Instant::now(), healthy });
        healthy
    }

    fn probe_health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        let resp = self
            .client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send();

        match resp {
            Ok(r) if r.status().is_success() => r
                .json::<HealthBody>()
                .map(|b| b.status == "healthy")
                .unwrap_or(false),
            _ => false,
        }
    }

    /// `POST /fingerprint`. No retry here by design — retry policy belongs
    /// to the pipeline worker (spec §4.9.7/§4.10).
    pub fn analyze(&self, track_id: u64, filepath: &str) -> Result<FingerprintResponse, TransportError> {
        let url = format!("{}/fingerprint", self.base_url);
        let req = FingerprintRequest { track_id, filepath: filepath.to_string() };

        let resp = self
            .client
            .post(&url)
            .json(&req)
            .timeout(ANALYSIS_TIMEOUT)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::ConnectionFailed(e.to_string())
                }
            })?;

        if resp.status().is_server_error() {
            return Err(TransportError::Server(resp.status()));
        }
        if !resp.status().is_success() {
            return Err(TransportError::Server(resp.status()));
        }

        resp.json::<FingerprintResponse>()
            .map_err(|e| TransportError::ConnectionFailed(format!("bad response body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_host_is_unhealthy() {
        let client = AnalyzerClient::new("http://127.0.0.1:1").unwrap();
        assert!(!client.is_healthy());
    }

    #[test]
    fn unreachable_host_fails_analyze_as_connection_error() {
        let client = AnalyzerClient::new("http://127.0.0.1:1").unwrap();
        let err = client.analyze(1, "a.wav").unwrap_err();
        assert!(matches!(err, TransportError::ConnectionFailed(_) | TransportError::Timeout));
    }
}
