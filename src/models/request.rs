use serde::{Deserialize, Serialize};

use super::fingerprint::Fingerprint;

/// Incoming request for the `/fingerprint` endpoint (spec §6.1). Also used
/// as the outgoing body when [`crate::client::AnalyzerClient`] calls a
/// remote analyzer with the same contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintRequest {
    pub track_id: u64,
    pub filepath: String,
}

/// Outgoing response for the `/fingerprint` endpoint. Also the shape
/// [`crate::client::AnalyzerClient`] parses back from a remote analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintResponse {
    pub track_id: u64,
    pub fingerprint: Fingerprint,
    pub metadata: AudioMetadata,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioMetadata {
    pub duration_sec: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_sec: u64,
}
