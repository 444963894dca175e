//! Harmonic/Percussive Source Separation (HPSS), ported from the non-simplified
//! vendor DSP implementation: median filtering on STFT magnitude with Wiener
//! soft masking.
//!
//! References:
//! - Fitzgerald, Derry. "Harmonic/percussive separation using median filtering." DAFX10, 2010.
//! - Driedger, Müller, Disch. "Extending harmonic-percussive separation." ISMIR 2014.

use ndarray::Array2;

use crate::spectrum::SpectrumCore;

#[derive(Clone, Debug)]
pub struct HpssConfig {
    pub kernel_h: usize,
    pub kernel_p: usize,
    pub power: f64,
    pub margin_h: f64,
    pub margin_p: f64,
}

impl Default for HpssConfig {
    fn default() -> Self {
        Self {
            kernel_h: 31,
            kernel_p: 31,
            power: 2.0,
            margin_h: 1.0,
            margin_p: 1.0,
        }
    }
}

/// Decompose `core`'s cached magnitude spectrogram into harmonic and
/// percussive energy, returning the pair of total squared-magnitude
/// energies rather than resynthesized audio — the only thing
/// [`super::harmonic`] needs is the energy split for `harmonic_ratio`.
///
/// Operates on `core.magnitude_frames()` directly rather than running its
/// own STFT, so the FFT that backs every extractor is computed exactly
/// once per track.
pub fn harmonic_percussive_energy(core: &SpectrumCore, config: &HpssConfig) -> (f64, f64) {
    let magnitude = core.magnitude_frames();
    if magnitude.ncols() == 0 {
        return (0.0, 0.0);
    }

    let (harm_mag, perc_mag) = decompose_magnitude(magnitude, config);

    let harm_energy: f64 = harm_mag.iter().map(|m| m * m).sum();
    let perc_energy: f64 = perc_mag.iter().map(|m| m * m).sum();
    (harm_energy, perc_energy)
}

fn decompose_magnitude(magnitude: &Array2<f64>, config: &HpssConfig) -> (Array2<f64>, Array2<f64>) {
    let (n_freq, n_frames) = magnitude.dim();

    let harm_filt = median_filter_vertical(magnitude, config.kernel_h);
    let perc_filt = median_filter_horizontal(magnitude, config.kernel_p);

    let mut mask_h = Array2::zeros((n_freq, n_frames));
    let mut mask_p = Array2::zeros((n_freq, n_frames));

    for i in 0..n_freq {
        for j in 0..n_frames {
            let h = harm_filt[[i, j]];
            let p = perc_filt[[i, j]];

            let h_margin = (h * config.margin_h).max(1e-10);
            let p_margin = (p * config.margin_p).max(1e-10);

            let h_pow = h_margin.powf(config.power);
            let p_pow = p_margin.powf(config.power);
            let denom = h_pow + p_pow;

            if denom > 0.0 {
                mask_h[[i, j]] = h_pow / denom;
                mask_p[[i, j]] = p_pow / denom;
            } else {
                mask_h[[i, j]] = 0.5;
                mask_p[[i, j]] = 0.5;
            }
        }
    }

    (magnitude * &mask_h, magnitude * &mask_p)
}

/// Vertical (frequency-wise) median filter — separates harmonic content,
/// which is sustained across frequency bins.
fn median_filter_vertical(data: &Array2<f64>, kernel_size: usize) -> Array2<f64> {
    let (n_freq, n_frames) = data.dim();
    let mut output = Array2::<f64>::zeros((n_freq, n_frames));
    let half_kernel = kernel_size / 2;

    for j in 0..n_frames {
        for i in 0..n_freq {
            let start = if i >= half_kernel { i - half_kernel } else { 0 };
            let end = (i + half_kernel + 1).min(n_freq);
            let mut values: Vec<f64> = (start..end).map(|k| data[[k, j]]).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            output[[i, j]] = values[values.len() / 2];
        }
    }
    output
}

/// Horizontal (time-wise) median filter — separates percussive content,
/// which is short and impulsive.
fn median_filter_horizontal(data: &Array2<f64>, kernel_size: usize) -> Array2<f64> {
    let (n_freq, n_frames) = data.dim();
    let mut output = Array2::<f64>::zeros((n_freq, n_frames));
    let half_kernel = kernel_size / 2;

    for i in 0..n_freq {
        for j in 0..n_frames {
            let start = if j >= half_kernel { j - half_kernel } else { 0 };
            let end = (j + half_kernel + 1).min(n_frames);
            let mut values: Vec<f64> = (start..end).map(|k| data[[i, k]]).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            output[[i, j]] = values[values.len() / 2];
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_reference() {
        let c = HpssConfig::default();
        assert_eq!(c.kernel_h, 31);
        assert_eq!(c.kernel_p, 31);
        assert_eq!(c.power, 2.0);
    }

    #[test]
    fn too_short_audio_yields_zero_energy() {
        let core = SpectrumCore::compute_default(&[0.0; 100], 44100);
        let (h, p) = harmonic_percussive_energy(&core, &HpssConfig::default());
        assert_eq!(h, 0.0);
        assert_eq!(p, 0.0);
    }

    #[test]
    fn sustained_tone_is_mostly_harmonic() {
        let sr = 44100;
        let samples: Vec<f64> = (0..sr * 3)
            .map(|i| (2.0 * std::f64::consts::PI * 440.0 * i as f64 / sr as f64).sin())
            .collect();
        let core = SpectrumCore::compute_default(&samples, sr);
        let (h, p) = harmonic_percussive_energy(&core, &HpssConfig::default());
        assert!(h > p, "harmonic={h} percussive={p}");
    }
}
