//! Analyzer (C4): orchestrates AudioDecoder -> SpectrumCore -> the seven
//! feature extractors, and returns one stamped, sanitized fingerprint.

use crate::audio::{load_audio_sync, AudioData};
use crate::error::AnalysisError;
use crate::models::Fingerprint;
use crate::spectrum::SpectrumCore;

use super::{dynamics, frequency, harmonic, spectral, stereo, temporal, variation};

const MIN_DURATION_SEC: f64 = 1.0;

/// Decodes `filepath` and runs the full feature-extraction pipeline,
/// single-threaded within this call (callers parallelize at the pipeline
/// level, per spec §4.4).
pub fn analyze(filepath: &str) -> Result<Fingerprint, AnalysisError> {
    let audio = load_audio_sync(filepath)?;
    analyze_audio(&audio)
}

/// Runs the extraction pipeline over already-decoded audio. Split out from
/// [`analyze`] so tests and the remote-analyzer server can both drive it
/// without touching the filesystem.
pub fn analyze_audio(audio: &AudioData) -> Result<Fingerprint, AnalysisError> {
    let duration = audio.duration_sec();
    if duration < MIN_DURATION_SEC {
        return Err(AnalysisError::InsufficientAudio(duration));
    }

    let core = SpectrumCore::compute_default(&audio.samples, audio.sample_rate);

    let freq = frequency::extract(&core);
    let dyn_ = dynamics::extract(&audio.samples, audio.sample_rate, &core);
    let temp = temporal::extract(&audio.samples, audio.sample_rate, &core);
    let spec = spectral::extract(&core);
    let harm = harmonic::extract(&audio.samples, audio.sample_rate, &core);
    let variat = variation::extract(&audio.samples, audio.sample_rate);
    let st = stereo::extract(audio.left_right());

    let mut fp = Fingerprint {
        sub_bass_pct: freq.sub_bass_pct,
        bass_pct: freq.bass_pct,
        low_mid_pct: freq.low_mid_pct,
        mid_pct: freq.mid_pct,
        upper_mid_pct: freq.upper_mid_pct,
        presence_pct: freq.presence_pct,
        air_pct: freq.air_pct,

        lufs: dyn_.lufs,
        crest_db: dyn_.crest_db,
        bass_mid_ratio: dyn_.bass_mid_ratio,

        tempo_bpm: temp.tempo_bpm,
        rhythm_stability: temp.rhythm_stability,
        transient_density: temp.transient_density,
        silence_ratio: temp.silence_ratio,

        spectral_centroid: spec.spectral_centroid,
        spectral_rolloff: spec.spectral_rolloff,
        spectral_flatness: spec.spectral_flatness,

        harmonic_ratio: harm.harmonic_ratio,
        pitch_stability: harm.pitch_stability,
        chroma_energy: harm.chroma_energy,

        dynamic_range_variation: variat.dynamic_range_variation,
        loudness_variation_std: variat.loudness_variation_std,
        peak_consistency: variat.peak_consistency,

        stereo_width: st.stereo_width,
        phase_correlation: st.phase_correlation,

        ..Fingerprint::default()
    };

    let corrected = fp.sanitize();
    if corrected > 0 {
        tracing::debug!(corrected, filepath_hint = "n/a", "fingerprint required sanitization");
    }

    if !fp.is_valid() {
        return Err(AnalysisError::NumericDegenerate(
            "fingerprint still non-finite after sanitization".to_string(),
        ));
    }

    Ok(fp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_sine(freq: f64, sample_rate: u32, seconds: f64) -> AudioData {
        let n = (sample_rate as f64 * seconds) as usize;
        let samples: Vec<f64> = (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate as f64).sin())
            .collect();
        AudioData {
            channels_raw: vec![samples.clone(), samples.clone()],
            samples,
            sample_rate,
            channels: 2,
        }
    }

    #[test]
    fn rejects_audio_under_one_second() {
        let audio = stereo_sine(440.0, 44100, 0.5);
        let err = analyze_audio(&audio).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientAudio(_)));
    }

    #[test]
    fn emits_a_valid_fingerprint_for_a_sine_tone() {
        let audio = stereo_sine(440.0, 44100, 3.0);
        let fp = analyze_audio(&audio).expect("should analyze");
        assert!(fp.is_valid());
        assert!(fp.within_bounds());
        assert!(fp.band_sum() >= 99.0 && fp.band_sum() <= 101.0);
        assert_eq!(fp.fingerprint_version, crate::models::FINGERPRINT_VERSION);
    }

    #[test]
    fn identical_left_right_channels_give_mono_stereo_defaults() {
        let audio = stereo_sine(440.0, 44100, 3.0);
        let fp = analyze_audio(&audio).expect("should analyze");
        assert!(fp.stereo_width < 0.1);
        assert!((fp.phase_correlation - 1.0).abs() < 0.05);
    }
}
