use serde::{Deserialize, Serialize};

/// Schema version of the 25D fingerprint payload.
///
/// Bumping this invalidates every sidecar, persistent-cache, and
/// memory-cache entry on next access (spec §3.1, P11).
pub const FINGERPRINT_VERSION: u16 = 1;

/// 25-dimensional audio fingerprint
///
/// Organized into 7 categories covering all aspects of audio:
/// - Frequency (7D): Energy distribution across frequency bands
/// - Dynamics (3D): Loudness and dynamic range
/// - Temporal (4D): Rhythm and temporal patterns
/// - Spectral (3D): Brightness and tonal characteristics
/// - Harmonic (3D): Harmonic content and pitch
/// - Variation (3D): Dynamic variation over time
/// - Stereo (2D): Stereo field characteristics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    // Frequency Distribution (7D)
    pub sub_bass_pct: f64, // Energy in sub-bass (<60 Hz)
    pub bass_pct: f64,     // Energy in bass (60-250 Hz)
    pub low_mid_pct: f64,  // Energy in low-mids (250-500 Hz)
    pub mid_pct: f64,      // Energy in mids (500-2k Hz)
    pub upper_mid_pct: f64, // Energy in upper-mids (2k-4k Hz)
    pub presence_pct: f64, // Energy in presence (4k-8k Hz)
    pub air_pct: f64,      // Energy in air/high-freq (>8k Hz)

    // Dynamics (3D)
    pub lufs: f64,           // ITU-R BS.1770-4 integrated loudness (dB LUFS)
    pub crest_db: f64,       // Peak/RMS ratio in dB
    pub bass_mid_ratio: f64, // 10*log10(E_bass / E_mid), dB, signed

    // Temporal (4D)
    pub tempo_bpm: f64,         // Detected tempo in BPM (40-240, default 120)
    pub rhythm_stability: f64,  // 1 - normalized std of inter-onset intervals
    pub transient_density: f64, // Onsets/sec, saturating map at 10/s
    pub silence_ratio: f64,     // Fraction of 50ms windows below -60 dBFS

    // Spectral (3D), in Hz (see SPEC_FULL.md §D.2)
    pub spectral_centroid: f64,
    pub spectral_rolloff: f64,
    pub spectral_flatness: f64, // [0,1]

    // Harmonic (3D)
    pub harmonic_ratio: f64,  // E_harm / (E_harm + E_perc)
    pub pitch_stability: f64, // 1 - normalized std of voiced f0
    pub chroma_energy: f64,   // normalized chroma vector energy

    // Variation (3D)
    pub dynamic_range_variation: f64, // normalized std of per-3s crest factor
    pub loudness_variation_std: f64,  // std of per-400ms momentary LUFS, dB
    pub peak_consistency: f64,        // 1 - normalized std of per-3s peaks

    // Stereo (2D)
    pub stereo_width: f64,      // E_side / (E_mid + E_side), [0,1]
    pub phase_correlation: f64, // Pearson correlation of L/R, [-1,1]

    // Meta
    pub fingerprint_version: u16,
}

/// One declared range per dimension, used by sanitize() and by tests
/// checking P2 (bounds).
struct Bound {
    name: &'static str,
    min: f64,
    max: f64,
    default: f64,
}

impl Fingerprint {
    const BOUNDS: [Bound; 25] = [
        Bound { name: "sub_bass_pct", min: 0.0, max: 100.0, default: 0.0 },
        Bound { name: "bass_pct", min: 0.0, max: 100.0, default: 0.0 },
        Bound { name: "low_mid_pct", min: 0.0, max: 100.0, default: 0.0 },
        Bound { name: "mid_pct", min: 0.0, max: 100.0, default: 0.0 },
        Bound { name: "upper_mid_pct", min: 0.0, max: 100.0, default: 0.0 },
        Bound { name: "presence_pct", min: 0.0, max: 100.0, default: 0.0 },
        Bound { name: "air_pct", min: 0.0, max: 100.0, default: 0.0 },
        Bound { name: "lufs", min: -120.0, max: 0.0, default: -20.0 },
        Bound { name: "crest_db", min: 0.0, max: 50.0, default: 0.0 },
        Bound { name: "bass_mid_ratio", min: -40.0, max: 40.0, default: 0.0 },
        Bound { name: "tempo_bpm", min: 40.0, max: 240.0, default: 120.0 },
        Bound { name: "rhythm_stability", min: 0.0, max: 1.0, default: 0.0 },
        Bound { name: "transient_density", min: 0.0, max: 1.0, default: 0.0 },
        Bound { name: "silence_ratio", min: 0.0, max: 1.0, default: 0.0 },
        Bound { name: "spectral_centroid", min: 0.0, max: 96_000.0, default: 0.0 },
        Bound { name: "spectral_rolloff", min: 0.0, max: 96_000.0, default: 0.0 },
        Bound { name: "spectral_flatness", min: 0.0, max: 1.0, default: 0.0 },
        Bound { name: "harmonic_ratio", min: 0.0, max: 1.0, default: 0.0 },
        Bound { name: "pitch_stability", min: 0.0, max: 1.0, default: 0.0 },
        Bound { name: "chroma_energy", min: 0.0, max: 1.0, default: 0.0 },
        Bound { name: "dynamic_range_variation", min: 0.0, max: 1.0, default: 0.0 },
        Bound { name: "loudness_variation_std", min: 0.0, max: 50.0, default: 0.0 },
        Bound { name: "peak_consistency", min: 0.0, max: 1.0, default: 0.0 },
        Bound { name: "stereo_width", min: 0.0, max: 1.0, default: 0.0 },
        Bound { name: "phase_correlation", min: -1.0, max: 1.0, default: 1.0 },
    ];

    pub(crate) fn values(&self) -> [f64; 25] {
        [
            self.sub_bass_pct,
            self.bass_pct,
            self.low_mid_pct,
            self.mid_pct,
            self.upper_mid_pct,
            self.presence_pct,
            self.air_pct,
            self.lufs,
            self.crest_db,
            self.bass_mid_ratio,
            self.tempo_bpm,
            self.rhythm_stability,
            self.transient_density,
            self.silence_ratio,
            self.spectral_centroid,
            self.spectral_rolloff,
            self.spectral_flatness,
            self.harmonic_ratio,
            self.pitch_stability,
            self.chroma_energy,
            self.dynamic_range_variation,
            self.loudness_variation_std,
            self.peak_consistency,
            self.stereo_width,
            self.phase_correlation,
        ]
    }

    pub(crate) fn set_value(&mut self, index: usize, v: f64) {
        match index {
            0 => self.sub_bass_pct = v,
            1 => self.bass_pct = v,
            2 => self.low_mid_pct = v,
            3 => self.mid_pct = v,
            4 => self.upper_mid_pct = v,
            5 => self.presence_pct = v,
            6 => self.air_pct = v,
            7 => self.lufs = v,
            8 => self.crest_db = v,
            9 => self.bass_mid_ratio = v,
            10 => self.tempo_bpm = v,
            11 => self.rhythm_stability = v,
            12 => self.transient_density = v,
            13 => self.silence_ratio = v,
            14 => self.spectral_centroid = v,
            15 => self.spectral_rolloff = v,
            16 => self.spectral_flatness = v,
            17 => self.harmonic_ratio = v,
            18 => self.pitch_stability = v,
            19 => self.chroma_energy = v,
            20 => self.dynamic_range_variation = v,
            21 => self.loudness_variation_std = v,
            22 => self.peak_consistency = v,
            23 => self.stereo_width = v,
            24 => self.phase_correlation = v,
            _ => unreachable!("Fingerprint has exactly 25 dimensions"),
        }
    }

    /// Total sanitization (spec §4.3, GLOSSARY "Sanitization").
    ///
    /// Replaces any NaN/Inf dimension with its neutral default, then clamps
    /// every dimension to its declared range. Returns the number of
    /// dimensions that needed correction, for diagnostics; the count itself
    /// is never persisted.
    pub fn sanitize(&mut self) -> usize {
        let mut corrected = 0;
        let values = self.values();
        for (i, (v, bound)) in values.iter().zip(Self::BOUNDS.iter()).enumerate() {
            let mut v = *v;
            if !v.is_finite() {
                tracing::debug!(dimension = bound.name, "sanitizing non-finite value");
                v = bound.default;
                corrected += 1;
            }
            let clamped = v.clamp(bound.min, bound.max);
            if clamped != v {
                corrected += 1;
            }
            self.set_value(i, clamped);
        }
        self.fingerprint_version = FINGERPRINT_VERSION;
        corrected
    }

    /// P1: exactly 25 finite scalars.
    pub fn is_valid(&self) -> bool {
        self.valid_dimensions() == 25
    }

    pub fn valid_dimensions(&self) -> usize {
        self.values().iter().filter(|v| v.is_finite()).count()
    }

    /// P2: every dimension within its declared range.
    pub fn within_bounds(&self) -> bool {
        self.values()
            .iter()
            .zip(Self::BOUNDS.iter())
            .all(|(v, b)| *v >= b.min && *v <= b.max)
    }

    /// P3: frequency-band percentages sum to within [99.0, 101.0].
    pub fn band_sum(&self) -> f64 {
        self.sub_bass_pct
            + self.bass_pct
            + self.low_mid_pct
            + self.mid_pct
            + self.upper_mid_pct
            + self.presence_pct
            + self.air_pct
    }

    /// For mono input: `stereo_width == 0`, `phase_correlation == 1` (P5).
    pub fn apply_mono_stereo_defaults(&mut self) {
        self.stereo_width = 0.0;
        self.phase_correlation = 1.0;
    }

    /// Serializes the 25 dimensions as little-endian f64s, the same payload
    /// layout the sidecar format uses, for reuse by [`crate::cache::persistent`].
    pub(crate) fn payload_bytes(&self) -> [u8; 200] {
        let mut out = [0u8; 200];
        for (i, v) in self.values().iter().enumerate() {
            out[i * 8..i * 8 + 8].copy_from_slice(&v.to_le_bytes());
        }
        out
    }

    pub(crate) fn from_payload_bytes(bytes: &[u8], fingerprint_version: u16) -> Option<Self> {
        if bytes.len() != 200 {
            return None;
        }
        let mut fp = Fingerprint { fingerprint_version, ..Fingerprint::default() };
        for (i, chunk) in bytes.chunks_exact(8).enumerate() {
            fp.set_value(i, f64::from_le_bytes(chunk.try_into().ok()?));
        }
        Some(fp)
    }
}

impl Default for Fingerprint {
    fn default() -> Self {
        Self {
            sub_bass_pct: 0.0,
            bass_pct: 0.0,
            low_mid_pct: 0.0,
            mid_pct: 0.0,
            upper_mid_pct: 0.0,
            presence_pct: 0.0,
            air_pct: 0.0,
            lufs: -120.0,
            crest_db: 0.0,
            bass_mid_ratio: 0.0,
            tempo_bpm: 120.0,
            rhythm_stability: 0.0,
            transient_density: 0.0,
            silence_ratio: 0.0,
            spectral_centroid: 0.0,
            spectral_rolloff: 0.0,
            spectral_flatness: 0.0,
            harmonic_ratio: 0.0,
            pitch_stability: 0.0,
            chroma_energy: 0.0,
            dynamic_range_variation: 0.0,
            loudness_variation_std: 0.0,
            peak_consistency: 0.0,
            stereo_width: 0.0,
            phase_correlation: 1.0,
            fingerprint_version: FINGERPRINT_VERSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_nan_with_neutral_default() {
        let mut fp = Fingerprint {
            tempo_bpm: f64::NAN,
            lufs: f64::NEG_INFINITY,
            phase_correlation: f64::NAN,
            ..Fingerprint::default()
        };
        let corrected = fp.sanitize();
        assert!(corrected >= 3);
        assert!(fp.is_valid());
        assert_eq!(fp.tempo_bpm, 120.0);
        assert_eq!(fp.lufs, -20.0);
        assert_eq!(fp.phase_correlation, 1.0);
    }

    #[test]
    fn sanitize_clamps_out_of_range() {
        let mut fp = Fingerprint {
            crest_db: 999.0,
            phase_correlation: -5.0,
            ..Fingerprint::default()
        };
        fp.sanitize();
        assert!(fp.within_bounds());
        assert_eq!(fp.crest_db, 50.0);
        assert_eq!(fp.phase_correlation, -1.0);
    }

    #[test]
    fn mono_defaults_are_exact() {
        let mut fp = Fingerprint { stereo_width: 0.7, phase_correlation: 0.2, ..Fingerprint::default() };
        fp.apply_mono_stereo_defaults();
        assert_eq!(fp.stereo_width, 0.0);
        assert_eq!(fp.phase_correlation, 1.0);
    }

    #[test]
    fn default_is_already_valid_and_in_bounds() {
        let fp = Fingerprint::default();
        assert!(fp.is_valid());
        assert!(fp.within_bounds());
    }

    #[test]
    fn payload_byte_round_trip_preserves_every_dimension() {
        let mut fp = Fingerprint { tempo_bpm: 133.5, spectral_centroid: 2100.25, ..Fingerprint::default() };
        fp.sanitize();
        let bytes = fp.payload_bytes();
        let restored = Fingerprint::from_payload_bytes(&bytes, fp.fingerprint_version).expect("round trip");
        assert_eq!(restored.tempo_bpm, fp.tempo_bpm);
        assert_eq!(restored.spectral_centroid, fp.spectral_centroid);
    }
}
