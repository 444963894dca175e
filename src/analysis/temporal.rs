//! Temporal extractor (dimensions 11-14): tempo, rhythm stability, transient
//! density, silence ratio.
//!
//! Tempo/onset detection is adapted from the spectral-flux + autocorrelation
//! approach the vendor DSP crate uses for tempo, generalized from its fixed
//! [60,200] BPM range to the spec's [40,240]. Flux is derived from
//! [`SpectrumCore`]'s cached per-frame magnitude spectrogram rather than
//! running a second FFT pass over the track.

use crate::spectrum::SpectrumCore;

pub struct Temporal {
    pub tempo_bpm: f64,
    pub rhythm_stability: f64,
    pub transient_density: f64,
    pub silence_ratio: f64,
}

const MIN_BPM: f64 = 40.0;
const MAX_BPM: f64 = 240.0;
const DEFAULT_BPM: f64 = 120.0;

pub fn extract(samples: &[f64], sample_rate: u32, core: &SpectrumCore) -> Temporal {
    let frame_dt = core.frame_hop_sec();
    let flux = spectral_flux(core);
    let onsets = detect_onsets(&flux, frame_dt);

    Temporal {
        tempo_bpm: estimate_tempo(&flux, frame_dt),
        rhythm_stability: rhythm_stability(&onsets),
        transient_density: transient_density(&onsets, samples.len() as f64 / sample_rate as f64),
        silence_ratio: silence_ratio(samples, sample_rate),
    }
}

/// Frame-by-frame sum of positive magnitude deltas between consecutive
/// STFT frames of `core`'s cached magnitude spectrogram — the classic
/// onset-detection "spectral flux".
fn spectral_flux(core: &SpectrumCore) -> Vec<f64> {
    let magnitude = core.magnitude_frames();
    let (n_bins, n_frames) = magnitude.dim();
    if n_frames < 2 {
        return Vec::new();
    }

    let mut flux = Vec::with_capacity(n_frames - 1);
    for j in 1..n_frames {
        let mut sum = 0.0;
        for i in 0..n_bins {
            let delta = magnitude[[i, j]] - magnitude[[i, j - 1]];
            if delta > 0.0 {
                sum += delta;
            }
        }
        flux.push(sum);
    }
    flux
}

fn detect_onsets(flux: &[f64], frame_dt: f64) -> Vec<f64> {
    if flux.len() < 3 {
        return Vec::new();
    }
    let mean = flux.iter().sum::<f64>() / flux.len() as f64;
    let variance = flux.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / flux.len() as f64;
    let std = variance.sqrt();
    let threshold = mean + 0.5 * std;

    let mut onsets = Vec::new();
    for i in 1..flux.len() - 1 {
        if flux[i] > threshold && flux[i] >= flux[i - 1] && flux[i] >= flux[i + 1] {
            onsets.push(i as f64 * frame_dt);
        }
    }
    onsets
}

fn rhythm_stability(onsets: &[f64]) -> f64 {
    if onsets.len() < 3 {
        return 0.0;
    }
    let iois: Vec<f64> = onsets.windows(2).map(|w| w[1] - w[0]).collect();
    let mean = iois.iter().sum::<f64>() / iois.len() as f64;
    if mean <= 0.0 {
        return 0.0;
    }
    let variance = iois.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / iois.len() as f64;
    let std = variance.sqrt();
    let normalized_std = (std / mean).min(1.0);
    (1.0 - normalized_std).clamp(0.0, 1.0)
}

fn transient_density(onsets: &[f64], duration_sec: f64) -> f64 {
    if duration_sec <= 0.0 {
        return 0.0;
    }
    let per_sec = onsets.len() as f64 / duration_sec;
    (per_sec / 10.0).min(1.0)
}

fn silence_ratio(samples: &[f64], sample_rate: u32) -> f64 {
    let window_len = ((0.050 * sample_rate as f64).round() as usize).max(1);
    if samples.is_empty() {
        return 0.0;
    }
    let mut total = 0usize;
    let mut silent = 0usize;
    let mut start = 0;
    while start < samples.len() {
        let end = (start + window_len).min(samples.len());
        let window = &samples[start..end];
        let rms = (window.iter().map(|v| v * v).sum::<f64>() / window.len() as f64).sqrt();
        let dbfs = if rms > 0.0 { 20.0 * rms.log10() } else { f64::NEG_INFINITY };
        if dbfs < -60.0 {
            silent += 1;
        }
        total += 1;
        start += window_len;
    }
    if total == 0 {
        0.0
    } else {
        silent as f64 / total as f64
    }
}

/// Autocorrelation of the onset envelope over the 40-240 BPM lag range;
/// falls back to the 120 BPM default when the peak isn't clearly
/// distinguished from the mean (peak/mean < 1.3), per spec §4.3.
fn estimate_tempo(flux: &[f64], frame_dt: f64) -> f64 {
    if flux.len() < 4 {
        return DEFAULT_BPM;
    }

    let min_lag = ((60.0 / MAX_BPM) / frame_dt).floor().max(1.0) as usize;
    let max_lag = ((60.0 / MIN_BPM) / frame_dt).ceil() as usize;
    let max_lag = max_lag.min(flux.len() - 1);
    if min_lag >= max_lag {
        return DEFAULT_BPM;
    }

    let mean_flux = flux.iter().sum::<f64>() / flux.len() as f64;
    let centered: Vec<f64> = flux.iter().map(|v| v - mean_flux).collect();

    let mut correlations = Vec::new();
    for lag in min_lag..=max_lag {
        let mut sum = 0.0;
        for i in 0..(flux.len() - lag) {
            sum += centered[i] * centered[i + lag];
        }
        correlations.push((lag, sum));
    }

    let (best_lag, best_corr) = correlations
        .iter()
        .cloned()
        .fold((0usize, f64::MIN), |acc, (lag, c)| if c > acc.1 { (lag, c) } else { acc });

    let mean_corr = correlations.iter().map(|(_, c)| c).sum::<f64>() / correlations.len() as f64;
    if mean_corr.abs() < 1e-12 || best_corr / mean_corr.abs() < 1.3 {
        return DEFAULT_BPM;
    }

    let bpm = 60.0 / (best_lag as f64 * frame_dt);
    bpm.clamp(MIN_BPM, MAX_BPM)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click_track(bpm: f64, sample_rate: u32, seconds: f64) -> Vec<f64> {
        let n = (sample_rate as f64 * seconds) as usize;
        let mut samples = vec![0.0; n];
        let interval = (60.0 / bpm * sample_rate as f64) as usize;
        let mut i = 0;
        while i < n {
            for k in 0..(sample_rate as usize / 200).min(n - i) {
                samples[i + k] = 1.0 - k as f64 / (sample_rate as f64 / 200.0);
            }
            i += interval.max(1);
        }
        samples
    }

    #[test]
    fn silence_has_full_silence_ratio() {
        let samples = vec![0.0; 44100 * 2];
        assert_eq!(silence_ratio(&samples, 44100), 1.0);
    }

    #[test]
    fn loud_tone_has_no_silence() {
        let samples: Vec<f64> = (0..44100)
            .map(|i| (2.0 * std::f64::consts::PI * 440.0 * i as f64 / 44100.0).sin())
            .collect();
        assert!(silence_ratio(&samples, 44100) < 0.05);
    }

    #[test]
    fn empty_flux_defaults_tempo() {
        let frame_dt = 1024.0 / 44100.0;
        assert_eq!(estimate_tempo(&[], frame_dt), DEFAULT_BPM);
    }

    #[test]
    fn click_track_tempo_is_plausible() {
        let sr = 44100;
        let samples = click_track(120.0, sr, 8.0);
        let core = SpectrumCore::compute_default(&samples, sr);
        let tempo = extract(&samples, sr, &core).tempo_bpm;
        assert!(tempo >= MIN_BPM && tempo <= MAX_BPM);
    }
}
