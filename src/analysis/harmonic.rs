//! Harmonic extractor (dimensions 18-20): harmonic ratio, pitch stability,
//! chroma energy.

use super::chroma;
use super::hpss::{self, HpssConfig};
use super::yin;
use crate::spectrum::SpectrumCore;

pub struct Harmonic {
    pub harmonic_ratio: f64,
    pub pitch_stability: f64,
    pub chroma_energy: f64,
}

const PITCH_WINDOW_MS: f64 = 100.0;
const PITCH_FMIN_HZ: f64 = 50.0;
const PITCH_FMAX_HZ: f64 = 1000.0;

pub fn extract(samples: &[f64], sample_rate: u32, core: &SpectrumCore) -> Harmonic {
    Harmonic {
        harmonic_ratio: harmonic_ratio(core),
        pitch_stability: pitch_stability(samples, sample_rate),
        chroma_energy: chroma::extract(core),
    }
}

fn harmonic_ratio(core: &SpectrumCore) -> f64 {
    let (h, p) = hpss::harmonic_percussive_energy(core, &HpssConfig::default());
    if h + p <= 0.0 {
        return 0.0;
    }
    (h / (h + p)).clamp(0.0, 1.0)
}

fn pitch_stability(samples: &[f64], sample_rate: u32) -> f64 {
    let window_len = ((PITCH_WINDOW_MS / 1000.0) * sample_rate as f64).round() as usize;
    if window_len == 0 || samples.len() < window_len {
        return 0.0;
    }

    let mut voiced = Vec::new();
    let mut start = 0;
    while start + window_len <= samples.len() {
        let window = &samples[start..start + window_len];
        if let Some(f0) = yin::detect_pitch(window, sample_rate, PITCH_FMIN_HZ, PITCH_FMAX_HZ) {
            voiced.push(f0);
        }
        start += window_len;
    }

    if voiced.len() < 2 {
        return 0.0;
    }

    let mean = voiced.iter().sum::<f64>() / voiced.len() as f64;
    if mean <= 0.0 {
        return 0.0;
    }
    let variance = voiced.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / voiced.len() as f64;
    let std = variance.sqrt();
    let normalized_std = (std / mean).min(1.0);
    (1.0 - normalized_std).clamp(0.0, 1.0)
}
