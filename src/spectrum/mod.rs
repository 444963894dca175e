//! Shared spectral analysis core (C2).
//!
//! Computes one running-average power spectral density per track and hands
//! it to every extractor that needs a frequency-domain view, instead of each
//! extractor re-running its own FFT over the whole file. Frame-by-frame STFT
//! magnitudes are folded into the running average as they're produced and
//! discarded immediately — holding every frame of a multi-minute track in
//! memory at once is the kind of blowup the teacher's analyzer deliberately
//! avoids (a 5-minute 44.1kHz track is ~56k frames; keeping them all would
//! run into the hundreds of megabytes to low gigabytes range).

use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};

pub const DEFAULT_FFT_SIZE: usize = 4096;
pub const DEFAULT_HOP_SIZE: usize = 1024;

/// Periodic Hann window of the given size.
pub fn hann_window(size: usize) -> Vec<f64> {
    if size <= 1 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|n| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * n as f64 / size as f64).cos())
        .collect()
}

/// Running-average power spectrum for one track, plus the FFT geometry used
/// to produce it. Shared by reference across the frequency, dynamics, and
/// spectral extractors (C3).
#[derive(Debug, Clone)]
pub struct SpectrumCore {
    fft_size: usize,
    hop_size: usize,
    sample_rate: u32,
    /// Average power per bin (`[0, fft_size/2]`), linear scale — never
    /// converted to dB here, since dB clamps near-silent bins to the noise
    /// floor and erases the energy-distribution detail the frequency-band
    /// extractor needs.
    avg_power: Vec<f64>,
    frame_count: usize,
    /// Per-frame magnitude spectrogram, `(n_bins, frame_count)`. Computed in
    /// the same STFT pass as `avg_power` and cached here so extractors that
    /// need frame-by-frame detail (onset flux, HPSS) derive it from this one
    /// FFT run instead of planning and running their own (spec.md's C2 row:
    /// the STFT is computed once per track and shared by reference).
    magnitude_frames: Array2<f64>,
}

impl SpectrumCore {
    /// Computes the running-average PSD, and caches the per-frame magnitude
    /// spectrogram, over `samples` (a mono or single channel signal) using a
    /// Hann-windowed STFT with the given FFT size and hop.
    pub fn compute(samples: &[f64], sample_rate: u32, fft_size: usize, hop_size: usize) -> Self {
        let window = hann_window(fft_size);
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_size);

        let n_bins = fft_size / 2 + 1;
        let frame_count = if samples.len() >= fft_size {
            (samples.len() - fft_size) / hop_size + 1
        } else {
            0
        };

        let mut avg_power = vec![0.0f64; n_bins];
        let mut magnitude_frames = Array2::<f64>::zeros((n_bins, frame_count));

        if frame_count > 0 {
            let mut buffer = vec![Complex::new(0.0, 0.0); fft_size];
            for frame_idx in 0..frame_count {
                let start = frame_idx * hop_size;
                for i in 0..fft_size {
                    buffer[i] = Complex::new(samples[start + i] * window[i], 0.0);
                }
                fft.process(&mut buffer);
                for (bin, c) in buffer.iter().take(n_bins).enumerate() {
                    let mag = c.norm();
                    magnitude_frames[[bin, frame_idx]] = mag;
                    avg_power[bin] += mag * mag;
                }
            }
            for p in avg_power.iter_mut() {
                *p /= frame_count as f64;
            }
        }

        Self {
            fft_size,
            hop_size,
            sample_rate,
            avg_power,
            frame_count,
            magnitude_frames,
        }
    }

    /// Convenience constructor using the default FFT geometry.
    pub fn compute_default(samples: &[f64], sample_rate: u32) -> Self {
        Self::compute(samples, sample_rate, DEFAULT_FFT_SIZE, DEFAULT_HOP_SIZE)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Average linear power per bin, `bin[0]` being DC.
    pub fn power(&self) -> &[f64] {
        &self.avg_power
    }

    /// Per-frame magnitude spectrogram, `(n_bins, frame_count)`, `bin 0`
    /// being DC and column `j` the j-th STFT frame. Shared by extractors
    /// that need frame-by-frame detail instead of the running average
    /// (onset flux, HPSS).
    pub fn magnitude_frames(&self) -> &Array2<f64> {
        &self.magnitude_frames
    }

    /// Wall-clock duration, in seconds, advanced by one STFT hop.
    pub fn frame_hop_sec(&self) -> f64 {
        self.hop_size as f64 / self.sample_rate as f64
    }

    /// Center frequency in Hz of a given bin index.
    pub fn bin_freq(&self, bin: usize) -> f64 {
        bin as f64 * self.sample_rate as f64 / self.fft_size as f64
    }

    fn hz_to_bin(&self, hz: f64) -> usize {
        let bin = (hz * self.fft_size as f64 / self.sample_rate as f64).round() as i64;
        bin.clamp(0, (self.avg_power.len() - 1) as i64) as usize
    }

    /// Total power integrated over `[low_hz, high_hz)`.
    pub fn band_power(&self, low_hz: f64, high_hz: f64) -> f64 {
        let lo = self.hz_to_bin(low_hz);
        let hi = self.hz_to_bin(high_hz);
        if hi <= lo {
            return 0.0;
        }
        self.avg_power[lo..hi].iter().sum()
    }

    pub fn total_power(&self) -> f64 {
        self.avg_power.iter().sum()
    }

    pub fn freqs(&self) -> Vec<f64> {
        (0..self.avg_power.len()).map(|b| self.bin_freq(b)).collect()
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
    fn hann_window_endpoints_are_near_zero() {
        let w = hann_window(1024);
        assert!(w[0] < 1e-9);
        assert!((w[512] - 1.0).abs() < 0.01);
    }

    #[test]
    fn pure_tone_peaks_near_its_frequency() {
        let sr = 44100;
        let samples = sine(1000.0, sr, 2.0);
        let core = SpectrumCore::compute_default(&samples, sr);
        let peak_bin = core
            .power()
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        let peak_freq = core.bin_freq(peak_bin);
        assert!((peak_freq - 1000.0).abs() < 50.0, "peak at {peak_freq} Hz");
    }

    #[test]
    fn band_power_is_additive_over_full_range() {
        let sr = 44100;
        let samples = sine(440.0, sr, 1.0);
        let core = SpectrumCore::compute_default(&samples, sr);
        let full = core.band_power(0.0, sr as f64 / 2.0);
        assert!((full - core.total_power()).abs() / core.total_power().max(1e-12) < 0.05);
    }

    #[test]
    fn silence_has_zero_power() {
        let samples = vec![0.0; 44100 * 2];
        let core = SpectrumCore::compute_default(&samples, 44100);
        assert_eq!(core.total_power(), 0.0);
    }

    #[test]
    fn magnitude_frames_shape_matches_bins_and_frame_count() {
        let sr = 44100;
        let samples = sine(440.0, sr, 2.0);
        let core = SpectrumCore::compute_default(&samples, sr);
        let frames = core.magnitude_frames();
        assert_eq!(frames.nrows(), core.fft_size() / 2 + 1);
        assert_eq!(frames.ncols(), core.frame_count());
        assert!(core.frame_count() > 0);
    }
}
