//! Constant-Q-style 12-bin chromagram.
//!
//! The vendor DSP crate's `chroma.rs` is an unimplemented stub (`TODO:
//! Implement Constant-Q chroma extraction`, returns `Array2::zeros((12, 0))`);
//! this folds the already-computed [`crate::spectrum::SpectrumCore`] power
//! spectrum into 12 pitch classes by log-frequency (semitone) binning, which
//! is the core idea of a constant-Q transform without needing a dedicated
//! geometrically-spaced filterbank.

use crate::spectrum::SpectrumCore;

const A4_HZ: f64 = 440.0;
const A4_MIDI: f64 = 69.0;
/// Below this, a bin's pitch class is too ill-defined (sub-audio / DC-ish)
/// to fold into the chromagram.
const MIN_PITCHED_HZ: f64 = 27.5; // A0

/// Energy per pitch class (C, C#, D, ..., B), folding all octaves together.
pub fn chroma_vector(core: &SpectrumCore) -> [f64; 12] {
    let mut bins = [0.0f64; 12];
    let power = core.power();
    for (i, &p) in power.iter().enumerate() {
        let freq = core.bin_freq(i);
        if freq < MIN_PITCHED_HZ || p <= 0.0 {
            continue;
        }
        let midi = A4_MIDI + 12.0 * (freq / A4_HZ).log2();
        let pitch_class = midi.round().rem_euclid(12.0) as usize;
        bins[pitch_class.min(11)] += p;
    }
    bins
}

/// Fraction of total spectral energy organized into the computed pitch
/// classes (dimension 20). Spec: "summed and normalized" — we sum the 12
/// chroma bins and normalize by total spectral energy, since the stub
/// algorithm name/contract names only the chromagram, not a further
/// concentration metric.
pub fn extract(core: &SpectrumCore) -> f64 {
    let total = core.total_power();
    if total <= 0.0 {
        return 0.0;
    }
    let vector = chroma_vector(core);
    let pitched_energy: f64 = vector.iter().sum();
    (pitched_energy / total).clamp(0.0, 1.0)
}
