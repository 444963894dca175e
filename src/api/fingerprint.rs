use std::time::Instant;

use axum::{http::StatusCode, Json};

use crate::analysis::analyze_audio;
use crate::audio::load_audio;
use crate::error::Result;
use crate::models::request::{AudioMetadata, FingerprintRequest, FingerprintResponse};

pub async fn fingerprint_handler(
    Json(req): Json<FingerprintRequest>,
) -> Result<(StatusCode, Json<FingerprintResponse>)> {
    let start = Instant::now();

    tracing::debug!(track_id = req.track_id, filepath = %req.filepath, "processing fingerprint request");

    let audio_data = load_audio(&req.filepath).await?;

    tracing::debug!(
        samples = audio_data.samples.len(),
        sample_rate = audio_data.sample_rate,
        channels = audio_data.channels,
        "loaded audio"
    );

    // CPU-bound; spawn off the async runtime so one slow analysis doesn't
    // stall the rest of the server's requests.
    let audio_for_analysis = audio_data.clone();
    let fingerprint = tokio::task::spawn_blocking(move || analyze_audio(&audio_for_analysis))
        .await
        .map_err(|e| crate::error::FingerprintError::AnalysisError(format!("task join error: {e}")))?
        .map_err(crate::error::FingerprintError::from)?;

    let duration_sec = audio_data.duration_sec();

    let response = FingerprintResponse {
        track_id: req.track_id,
        fingerprint,
        metadata: AudioMetadata {
            duration_sec,
            sample_rate: audio_data.sample_rate,
            channels: audio_data.channels,
            format: infer_format(&req.filepath),
        },
        processing_time_ms: start.elapsed().as_millis() as u64,
    };

    tracing::info!(
        track_id = req.track_id,
        processing_time_ms = response.processing_time_ms,
        "fingerprinted track"
    );

    Ok((StatusCode::OK, Json(response)))
}

fn infer_format(filepath: &str) -> String {
    filepath.split('.').last().unwrap_or("unknown").to_lowercase()
}
