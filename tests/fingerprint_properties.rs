//! Fingerprint shape/invariant properties (spec §8, P1-P6) and the
//! sanitize-on-NaN scenario (scenario 6).

use fingerprint_engine::models::{Fingerprint, FINGERPRINT_VERSION};

#[test]
fn default_fingerprint_has_twenty_five_dimensions_and_is_valid() {
    let fp = Fingerprint::default();
    assert!(fp.is_valid());
    assert!(fp.within_bounds());
    assert_eq!(fp.valid_dimensions(), 25);
}

#[test]
fn band_percentages_sum_to_roughly_one_hundred() {
    let fp = Fingerprint::default();
    let sum = fp.band_sum();
    assert!((99.0..=101.0).contains(&sum), "band sum {sum} outside [99, 101]");
}

#[test]
fn nan_and_infinite_dimensions_are_sanitized_to_finite_defaults() {
    let mut fp = Fingerprint {
        lufs: f64::NAN,
        crest_db: f64::INFINITY,
        tempo_bpm: f64::NEG_INFINITY,
        ..Fingerprint::default()
    };
    let corrected = fp.sanitize();
    assert!(corrected >= 3);
    assert!(fp.lufs.is_finite());
    assert!(fp.crest_db.is_finite());
    assert!(fp.tempo_bpm.is_finite());
    assert!(fp.is_valid());
}

#[test]
fn out_of_range_dimensions_are_clamped_not_rejected() {
    let mut fp = Fingerprint { sub_bass_pct: 500.0, phase_correlation: -5.0, ..Fingerprint::default() };
    fp.sanitize();
    assert!(fp.within_bounds());
    assert!(fp.phase_correlation >= -1.0 && fp.phase_correlation <= 1.0);
}

#[test]
fn mono_defaults_match_definitional_stereo_values() {
    let mut fp = Fingerprint { stereo_width: 0.7, phase_correlation: 0.2, ..Fingerprint::default() };
    fp.apply_mono_stereo_defaults();
    assert_eq!(fp.stereo_width, 0.0);
    assert_eq!(fp.phase_correlation, 1.0);
}

#[test]
fn sanitize_always_stamps_the_current_schema_version() {
    let mut fp = Fingerprint { fingerprint_version: 0, ..Fingerprint::default() };
    fp.sanitize();
    assert_eq!(fp.fingerprint_version, FINGERPRINT_VERSION);
}
