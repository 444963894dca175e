//! Variation extractor (dimensions 21-23): how dynamics, loudness, and peak
//! level change over the course of the track.

use super::biquad::KWeightingFilter;

pub struct Variation {
    pub dynamic_range_variation: f64,
    pub loudness_variation_std: f64,
    pub peak_consistency: f64,
}

const CREST_FRAME_SEC: f64 = 3.0;
const PEAK_FRAME_SEC: f64 = 3.0;
const MOMENTARY_LUFS_FRAME_MS: f64 = 400.0;

/// Scales a per-frame crest-factor standard deviation (dB) into [0,1]; 20 dB
/// of frame-to-frame crest variation is treated as "maximally varying".
const CREST_VARIATION_SCALE_DB: f64 = 20.0;

pub fn extract(samples: &[f64], sample_rate: u32) -> Variation {
    Variation {
        dynamic_range_variation: dynamic_range_variation(samples, sample_rate),
        loudness_variation_std: loudness_variation_std(samples, sample_rate),
        peak_consistency: peak_consistency(samples, sample_rate),
    }
}

fn frame(samples: &[f64], sample_rate: u32, frame_sec: f64) -> Vec<&[f64]> {
    let frame_len = ((frame_sec * sample_rate as f64).round() as usize).max(1);
    let mut frames = Vec::new();
    let mut start = 0;
    while start + frame_len <= samples.len() {
        frames.push(&samples[start..start + frame_len]);
        start += frame_len;
    }
    frames
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

fn crest_db(frame: &[f64]) -> f64 {
    let peak = frame.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    let rms = (frame.iter().map(|v| v * v).sum::<f64>() / frame.len().max(1) as f64).sqrt();
    if rms <= 0.0 || peak <= 0.0 {
        return 0.0;
    }
    20.0 * (peak / rms).log10()
}

fn dynamic_range_variation(samples: &[f64], sample_rate: u32) -> f64 {
    let frames = frame(samples, sample_rate, CREST_FRAME_SEC);
    if frames.len() < 2 {
        return 0.0;
    }
    let crests: Vec<f64> = frames.iter().map(|f| crest_db(f)).collect();
    (std_dev(&crests) / CREST_VARIATION_SCALE_DB).clamp(0.0, 1.0)
}

fn loudness_variation_std(samples: &[f64], sample_rate: u32) -> f64 {
    let frame_len = ((MOMENTARY_LUFS_FRAME_MS / 1000.0 * sample_rate as f64).round() as usize).max(1);
    if samples.len() < frame_len {
        return 0.0;
    }
    let mut filter = KWeightingFilter::new(sample_rate as f64);
    let weighted = filter.process(samples);

    let mut loudness = Vec::new();
    let mut start = 0;
    while start + frame_len <= weighted.len() {
        let block = &weighted[start..start + frame_len];
        let ms = block.iter().map(|v| v * v).sum::<f64>() / block.len() as f64;
        if ms > 0.0 {
            loudness.push(-0.691 + 10.0 * ms.log10());
        }
        start += frame_len;
    }
    std_dev(&loudness).clamp(0.0, 50.0)
}

fn peak_consistency(samples: &[f64], sample_rate: u32) -> f64 {
    let frames = frame(samples, sample_rate, PEAK_FRAME_SEC);
    if frames.len() < 2 {
        return 0.0;
    }
    let peaks: Vec<f64> = frames
        .iter()
        .map(|f| f.iter().fold(0.0f64, |acc, v| acc.max(v.abs())))
        .collect();
    let mean = peaks.iter().sum::<f64>() / peaks.len() as f64;
    if mean <= 0.0 {
        return 0.0;
    }
    let cv = (std_dev(&peaks) / mean).min(1.0);
    (1.0 - cv).clamp(0.0, 1.0)
}
