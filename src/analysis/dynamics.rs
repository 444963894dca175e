//! Dynamics extractor (dimensions 8-10): `lufs`, `crest_db`, `bass_mid_ratio`.

use super::biquad::KWeightingFilter;
use crate::spectrum::SpectrumCore;

pub struct Dynamics {
    pub lufs: f64,
    pub crest_db: f64,
    pub bass_mid_ratio: f64,
}

const ABSOLUTE_GATE_LUFS: f64 = -70.0;
const RELATIVE_GATE_OFFSET: f64 = -10.0;
const BLOCK_MS: f64 = 400.0;
const STEP_MS: f64 = 100.0; // 75% overlap, per ITU-R BS.1770-4 §5

pub fn extract(samples: &[f64], sample_rate: u32, core: &SpectrumCore) -> Dynamics {
    Dynamics {
        lufs: integrated_lufs(samples, sample_rate),
        crest_db: crest_factor_db(samples),
        bass_mid_ratio: bass_mid_ratio_db(core),
    }
}

/// ITU-R BS.1770-4 integrated loudness: K-weight, gate, and mean-square
/// integrate over 400ms blocks with 75% overlap.
pub fn integrated_lufs(samples: &[f64], sample_rate: u32) -> f64 {
    if samples.is_empty() {
        return -120.0;
    }
    let mut filter = KWeightingFilter::new(sample_rate as f64);
    let weighted = filter.process(samples);

    let block_len = ((BLOCK_MS / 1000.0) * sample_rate as f64).round() as usize;
    let step_len = ((STEP_MS / 1000.0) * sample_rate as f64).round() as usize;
    if block_len == 0 || weighted.len() < block_len {
        let ms = mean_square(&weighted);
        return loudness_from_mean_square(ms);
    }

    let mut block_ms = Vec::new();
    let mut start = 0;
    while start + block_len <= weighted.len() {
        block_ms.push(mean_square(&weighted[start..start + block_len]));
        start += step_len.max(1);
    }

    let abs_gated: Vec<f64> = block_ms
        .iter()
        .copied()
        .filter(|&ms| loudness_from_mean_square(ms) > ABSOLUTE_GATE_LUFS)
        .collect();
    if abs_gated.is_empty() {
        return -120.0;
    }

    let relative_threshold =
        loudness_from_mean_square(abs_gated.iter().sum::<f64>() / abs_gated.len() as f64)
            + RELATIVE_GATE_OFFSET;

    let rel_gated: Vec<f64> = abs_gated
        .iter()
        .copied()
        .filter(|&ms| loudness_from_mean_square(ms) > relative_threshold)
        .collect();
    if rel_gated.is_empty() {
        return loudness_from_mean_square(abs_gated.iter().sum::<f64>() / abs_gated.len() as f64);
    }

    loudness_from_mean_square(rel_gated.iter().sum::<f64>() / rel_gated.len() as f64)
}

fn mean_square(block: &[f64]) -> f64 {
    if block.is_empty() {
        return 0.0;
    }
    block.iter().map(|v| v * v).sum::<f64>() / block.len() as f64
}

fn loudness_from_mean_square(ms: f64) -> f64 {
    if ms <= 0.0 {
        return -120.0;
    }
    -0.691 + 10.0 * ms.log10()
}

fn crest_factor_db(samples: &[f64]) -> f64 {
    let peak = samples.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    let rms = mean_square(samples).sqrt();
    if rms <= 0.0 || peak <= 0.0 {
        return 0.0;
    }
    20.0 * (peak / rms).log10()
}

fn bass_mid_ratio_db(core: &SpectrumCore) -> f64 {
    let e_bass = core.band_power(60.0, 250.0);
    let e_mid = core.band_power(500.0, 2_000.0);
    if e_bass <= 0.0 || e_mid <= 0.0 {
        return 0.0;
    }
    10.0 * (e_bass / e_mid).log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: u32, seconds: f64, amp: f64) -> Vec<f64> {
        let n = (sample_rate as f64 * seconds) as usize;
        (0..n)
            .map(|i| amp * (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate as f64).sin())
            .collect()
    }

    #[test]
    fn silence_has_floor_lufs() {
        let samples = vec![0.0; 44100 * 2];
        assert_eq!(integrated_lufs(&samples, 44100), -120.0);
    }

    #[test]
    fn full_scale_sine_lufs_in_plausible_range() {
        let samples = sine(1000.0, 44100, 3.0, 0.9);
        let lufs = integrated_lufs(&samples, 44100);
        assert!(lufs > -20.0 && lufs < 0.0, "lufs={lufs}");
    }

    #[test]
    fn sine_crest_factor_is_near_3db() {
        let samples = sine(1000.0, 44100, 2.0, 0.8);
        let crest = crest_factor_db(&samples);
        assert!((crest - 3.0).abs() < 0.5, "crest={crest}");
    }

    #[test]
    fn bass_dominant_signal_has_positive_ratio() {
        let sr = 44100;
        let samples = sine(150.0, sr, 2.0, 1.0);
        let core = SpectrumCore::compute_default(&samples, sr);
        assert!(bass_mid_ratio_db(&core) > 0.0);
    }
}
