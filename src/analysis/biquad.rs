//! Minimal biquad filter primitive, RBJ-cookbook style.
//!
//! Used by [`super::dynamics`] to build the ITU-R BS.1770-4 K-weighting
//! cascade (a high-frequency shelf followed by a high-pass), since no
//! off-the-shelf biquad implementation lives in this tree.

#[derive(Debug, Clone, Copy)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Stage 1 of BS.1770 K-weighting: a high-frequency shelving filter
    /// approximating the head's acoustic response, shelf center
    /// ≈1681.97 Hz, +4 dB gain.
    pub fn k_weight_shelf(sample_rate: f64) -> Self {
        let f0 = 1681.974_450_955_533;
        let g = 3.999_843_853_973_347;
        let q = 0.707_175_236_955_419_6;

        let k = (std::f64::consts::PI * f0 / sample_rate).tan();
        let vh = 10f64.powf(g / 20.0);
        let vb = vh.powf(0.499_666_774_154_541_6);

        let a0 = 1.0 + k / q + k * k;
        Self {
            b0: (vh + vb * k / q + k * k) / a0,
            b1: 2.0 * (k * k - vh) / a0,
            b2: (vh - vb * k / q + k * k) / a0,
            a1: 2.0 * (k * k - 1.0) / a0,
            a2: (1.0 - k / q + k * k) / a0,
        }
    }

    /// Stage 2 of BS.1770 K-weighting: the RLB (revised low-frequency
    /// B-weighting) high-pass, cutoff ≈38.14 Hz.
    pub fn k_weight_highpass(sample_rate: f64) -> Self {
        let f0 = 38.135_470_876_024_44;
        let q = 0.500_327_037_323_877_3;

        let k = (std::f64::consts::PI * f0 / sample_rate).tan();
        let a0 = 1.0 + k / q + k * k;
        let b0 = 1.0 / a0;
        Self {
            b0,
            b1: -2.0 * b0,
            b2: b0,
            a1: 2.0 * (k * k - 1.0) / a0,
            a2: (1.0 - k / q + k * k) / a0,
        }
    }
}

/// Direct-form-II-transposed state for one channel of one biquad stage.
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    z1: f64,
    z2: f64,
}

/// A two-stage cascade (shelf -> high-pass), applied in place over a signal.
pub struct KWeightingFilter {
    stage1: BiquadCoeffs,
    stage2: BiquadCoeffs,
    state1: BiquadState,
    state2: BiquadState,
}

impl KWeightingFilter {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            stage1: BiquadCoeffs::k_weight_shelf(sample_rate),
            stage2: BiquadCoeffs::k_weight_highpass(sample_rate),
            state1: BiquadState::default(),
            state2: BiquadState::default(),
        }
    }

    fn process_one(coeffs: &BiquadCoeffs, state: &mut BiquadState, x: f64) -> f64 {
        let y = coeffs.b0 * x + state.z1;
        state.z1 = coeffs.b1 * x - coeffs.a1 * y + state.z2;
        state.z2 = coeffs.b2 * x - coeffs.a2 * y;
        y
    }

    pub fn process(&mut self, samples: &[f64]) -> Vec<f64> {
        samples
            .iter()
            .map(|&x| {
                let s1 = Self::process_one(&self.stage1, &mut self.state1, x);
                Self::process_one(&self.stage2, &mut self.state2, s1)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shelf_is_stable_for_common_rates() {
        for sr in [44_100.0, 48_000.0, 96_000.0] {
            let c = BiquadCoeffs::k_weight_shelf(sr);
            assert!(c.b0.is_finite() && c.a1.is_finite());
        }
    }

    #[test]
    fn filter_does_not_blow_up_on_dc() {
        let mut f = KWeightingFilter::new(44_100.0);
        let out = f.process(&vec![1.0; 1000]);
        assert!(out.iter().all(|v| v.is_finite()));
        // High-pass stage should drive a DC input toward zero.
        assert!(out[999].abs() < 0.1, "tail={}", out[999]);
    }
}
