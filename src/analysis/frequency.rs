//! Frequency band extractor (dimensions 1-7).

use crate::spectrum::SpectrumCore;

pub struct FrequencyBands {
    pub sub_bass_pct: f64,
    pub bass_pct: f64,
    pub low_mid_pct: f64,
    pub mid_pct: f64,
    pub upper_mid_pct: f64,
    pub presence_pct: f64,
    pub air_pct: f64,
}

/// Band edges in Hz, per spec §4.3: sub-bass <60, bass 60-250, low-mid
/// 250-500, mid 500-2k, upper-mid 2k-4k, presence 4k-8k, air >8k.
const EDGES: [f64; 8] = [0.0, 60.0, 250.0, 500.0, 2_000.0, 4_000.0, 8_000.0, f64::INFINITY];

pub fn extract(core: &SpectrumCore) -> FrequencyBands {
    let total = core.total_power();
    let nyquist = core.sample_rate() as f64 / 2.0;

    let band_pct = |lo: f64, hi: f64| -> f64 {
        if total <= 0.0 {
            return 0.0;
        }
        let hi = if hi.is_finite() { hi } else { nyquist };
        (core.band_power(lo, hi) / total) * 100.0
    };

    FrequencyBands {
        sub_bass_pct: band_pct(EDGES[0], EDGES[1]),
        bass_pct: band_pct(EDGES[1], EDGES[2]),
        low_mid_pct: band_pct(EDGES[2], EDGES[3]),
        mid_pct: band_pct(EDGES[3], EDGES[4]),
        upper_mid_pct: band_pct(EDGES[4], EDGES[5]),
        presence_pct: band_pct(EDGES[5], EDGES[6]),
        air_pct: band_pct(EDGES[6], EDGES[7]),
    }
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
    fn low_tone_concentrates_in_bass() {
        let sr = 44100;
        let samples = sine(150.0, sr, 2.0);
        let core = SpectrumCore::compute_default(&samples, sr);
        let bands = extract(&core);
        assert!(bands.bass_pct > 80.0, "bass_pct={}", bands.bass_pct);
    }

    #[test]
    fn bands_sum_near_100() {
        let sr = 44100;
        let samples = sine(440.0, sr, 2.0);
        let core = SpectrumCore::compute_default(&samples, sr);
        let bands = extract(&core);
        let sum = bands.sub_bass_pct
            + bands.bass_pct
            + bands.low_mid_pct
            + bands.mid_pct
            + bands.upper_mid_pct
            + bands.presence_pct
            + bands.air_pct;
        assert!((sum - 100.0).abs() < 1.0, "sum={sum}");
    }

    #[test]
    fn silence_yields_zero_everywhere() {
        let samples = vec![0.0; 44100 * 2];
        let core = SpectrumCore::compute_default(&samples, 44100);
        let bands = extract(&core);
        assert_eq!(bands.sub_bass_pct, 0.0);
        assert_eq!(bands.air_pct, 0.0);
    }
}
