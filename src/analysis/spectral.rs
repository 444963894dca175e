//! Spectral shape extractor (dimensions 15-17): centroid, rolloff, flatness.
//!
//! Centroid and rolloff are reported in Hz (see SPEC_FULL.md §D.2 — the
//! source material disagreed between normalized [0,1] and Hz, and Hz is the
//! more directly testable convention against a known input frequency).

use crate::spectrum::SpectrumCore;

pub struct Spectral {
    pub spectral_centroid: f64,
    pub spectral_rolloff: f64,
    pub spectral_flatness: f64,
}

const ROLLOFF_ENERGY_FRACTION: f64 = 0.85;
const FLATNESS_FLOOR: f64 = 1e-10;

pub fn extract(core: &SpectrumCore) -> Spectral {
    let power = core.power();
    let freqs = core.freqs();

    Spectral {
        spectral_centroid: centroid(power, &freqs),
        spectral_rolloff: rolloff(power, &freqs),
        spectral_flatness: flatness(power),
    }
}

fn centroid(power: &[f64], freqs: &[f64]) -> f64 {
    let total: f64 = power.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    power.iter().zip(freqs).map(|(p, f)| p * f).sum::<f64>() / total
}

fn rolloff(power: &[f64], freqs: &[f64]) -> f64 {
    let total: f64 = power.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let threshold = total * ROLLOFF_ENERGY_FRACTION;
    let mut cumulative = 0.0;
    for (p, f) in power.iter().zip(freqs) {
        cumulative += p;
        if cumulative >= threshold {
            return *f;
        }
    }
    *freqs.last().unwrap_or(&0.0)
}

/// Magnitude geometric mean over arithmetic mean, filtering near-zero bins
/// so silence doesn't produce a spurious `ln(0)`.
fn flatness(power: &[f64]) -> f64 {
    let magnitudes: Vec<f64> = power.iter().map(|p| p.sqrt()).filter(|m| *m > FLATNESS_FLOOR).collect();
    if magnitudes.is_empty() {
        return 0.0;
    }
    let log_sum: f64 = magnitudes.iter().map(|m| m.ln()).sum();
    let geometric_mean = (log_sum / magnitudes.len() as f64).exp();
    let arithmetic_mean = magnitudes.iter().sum::<f64>() / magnitudes.len() as f64;
    if arithmetic_mean <= 0.0 {
        return 0.0;
    }
    (geometric_mean / arithmetic_mean).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: u32, seconds: f64) -> Vec<f64> {
        let n = (sample_rate as f64 * seconds) as usize;
        (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate as f64).sin())
            .collect()
    }

    #[test]
    fn pure_tone_centroid_matches_its_frequency() {
        let sr = 44100;
        let samples = sine(440.0, sr, 2.0);
        let core = SpectrumCore::compute_default(&samples, sr);
        let s = extract(&core);
        assert!((s.spectral_centroid - 440.0).abs() < 50.0, "centroid={}", s.spectral_centroid);
    }

    #[test]
    fn pure_tone_has_low_flatness() {
        let sr = 44100;
        let samples = sine(440.0, sr, 2.0);
        let core = SpectrumCore::compute_default(&samples, sr);
        let s = extract(&core);
        assert!(s.spectral_flatness < 0.3, "flatness={}", s.spectral_flatness);
    }

    #[test]
    fn silence_has_zero_centroid_and_flatness() {
        let samples = vec![0.0; 44100 * 2];
        let core = SpectrumCore::compute_default(&samples, 44100);
        let s = extract(&core);
        assert_eq!(s.spectral_centroid, 0.0);
        assert_eq!(s.spectral_flatness, 0.0);
    }
}
