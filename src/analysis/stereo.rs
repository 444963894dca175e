//! Stereo field extractor (dimensions 24-25), adapted near-verbatim from the
//! vendor DSP crate's stereo analysis (ported from f32 to f64 to match the
//! rest of this pipeline).

pub struct Stereo {
    pub stereo_width: f64,
    pub phase_correlation: f64,
}

/// For mono input, `stereo_width = 0` and `phase_correlation = 1` by
/// definition (spec §3.1 invariant).
pub fn extract(left_right: Option<(&[f64], &[f64])>) -> Stereo {
    match left_right {
        None => Stereo { stereo_width: 0.0, phase_correlation: 1.0 },
        Some((left, right)) => Stereo {
            stereo_width: compute_stereo_width(left, right),
            phase_correlation: compute_phase_correlation(left, right),
        },
    }
}

fn compute_midside(left: &[f64], right: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut mid = Vec::with_capacity(left.len());
    let mut side = Vec::with_capacity(left.len());
    for (l, r) in left.iter().zip(right.iter()) {
        mid.push((l + r) * 0.5);
        side.push((l - r) * 0.5);
    }
    (mid, side)
}

fn compute_energy(signal: &[f64]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|s| s * s).sum::<f64>() / signal.len() as f64).sqrt()
}

/// Width = side / (mid + side). 0.0 = pure mono, 1.0 = pure side.
fn compute_stereo_width(left: &[f64], right: &[f64]) -> f64 {
    if left.is_empty() || left.len() != right.len() {
        return 0.0;
    }
    let (mid, side) = compute_midside(left, right);
    let mid_energy = compute_energy(&mid);
    let side_energy = compute_energy(&side);
    let total_energy = mid_energy + side_energy;
    if total_energy < 1e-10 {
        return 0.0;
    }
    (side_energy / total_energy).clamp(0.0, 1.0)
}

/// Pearson correlation of zero-mean, unit-variance L/R. Range [-1, 1];
/// identical channels correlate +1, inverted channels correlate -1.
fn compute_phase_correlation(left: &[f64], right: &[f64]) -> f64 {
    if left.is_empty() || left.len() != right.len() {
        return 1.0;
    }
    let left_norm = normalize_signal(left);
    let right_norm = normalize_signal(right);

    let mut sum_product = 0.0;
    let mut sum_left2 = 0.0;
    let mut sum_right2 = 0.0;
    for (l, r) in left_norm.iter().zip(right_norm.iter()) {
        sum_product += l * r;
        sum_left2 += l * l;
        sum_right2 += r * r;
    }

    let denominator = (sum_left2 * sum_right2).sqrt();
    if denominator < 1e-10 {
        return 1.0;
    }
    (sum_product / denominator).clamp(-1.0, 1.0)
}

fn normalize_signal(signal: &[f64]) -> Vec<f64> {
    if signal.is_empty() {
        return vec![];
    }
    let mean = signal.iter().sum::<f64>() / signal.len() as f64;
    let variance = signal.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / signal.len() as f64;
    let std_dev = variance.sqrt().max(1e-10);
    signal.iter().map(|s| (s - mean) / std_dev).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_input_gives_definitional_defaults() {
        let s = extract(None);
        assert_eq!(s.stereo_width, 0.0);
        assert_eq!(s.phase_correlation, 1.0);
    }

    #[test]
    fn identical_channels_are_narrow_and_in_phase() {
        let left = vec![0.1, 0.2, 0.3, 0.4];
        let right = left.clone();
        let s = extract(Some((&left, &right)));
        assert!(s.stereo_width < 0.1);
        assert!((s.phase_correlation - 1.0).abs() < 0.01);
    }

    #[test]
    fn inverted_channels_are_wide_and_out_of_phase() {
        let left = vec![0.5, 0.5, 0.5, 0.5];
        let right = vec![-0.5, -0.5, -0.5, -0.5];
        let s = extract(Some((&left, &right)));
        assert!(s.stereo_width > 0.5);
        assert!((s.phase_correlation + 1.0).abs() < 0.01);
    }
}
