//! Readouts derived from a published frame, for the consumer side.
//!
//! None of this runs in the audio callback.

/// Floor for level readouts, in dBFS.
pub const SILENCE_DBFS: f32 = -120.0;

/// Notes on a guitar's high-E string in standard tuning, fret 0 to 24.
pub const HIGH_E_STRING: [(&str, f32); 25] = [
    ("E4", 329.63),
    ("F4", 349.23),
    ("F#4", 369.99),
    ("G4", 392.00),
    ("G#4", 415.30),
    ("A4", 440.00),
    ("A#4", 466.16),
    ("B4", 493.88),
    ("C5", 523.25),
    ("C#5", 554.37),
    ("D5", 587.33),
    ("D#5", 622.25),
    ("E5", 659.25),
    ("F5", 698.46),
    ("F#5", 739.99),
    ("G5", 783.99),
    ("G#5", 830.61),
    ("A5", 880.00),
    ("A#5", 932.33),
    ("B5", 987.77),
    ("C6", 1046.50),
    ("C#6", 1108.73),
    ("D6", 1174.66),
    ("D#6", 1244.51),
    ("E6", 1318.51),
];

/// Magnitude of every bin `0..=N/2` of a half-complex buffer of length `N`.
pub fn bin_magnitudes(half_complex: &[f32]) -> Vec<f32> {
    let n = half_complex.len();
    if n == 0 {
        return Vec::new();
    }
    (0..=n / 2)
        .map(|k| {
            let re = half_complex[k];
            let im = if k == 0 || 2 * k == n { 0.0 } else { half_complex[n - k] };
            re.hypot(im)
        })
        .collect()
}

/// Bin magnitude in dB relative to a full-scale sine, floored at -240 dB.
pub fn magnitude_db(magnitude: f32, frame_size: usize) -> f32 {
    let half = (frame_size as f32 / 2.0).max(1.0);
    20.0 * (magnitude / half).max(1e-12).log10()
}

/// RMS level of `samples` in dBFS (full scale = 1.0).
///
/// Empty or silent input reads [`SILENCE_DBFS`].
pub fn rms_dbfs(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return SILENCE_DBFS;
    }
    let mean_sq = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    let rms = mean_sq.sqrt();
    if rms <= 0.0 {
        return SILENCE_DBFS;
    }
    (20.0 * rms.log10()).max(SILENCE_DBFS)
}

/// Centre frequency of bin `k`.
pub fn bin_frequency(bin: usize, frame_size: usize, sample_rate: u32) -> f32 {
    if frame_size == 0 {
        return 0.0;
    }
    bin as f32 * sample_rate as f32 / frame_size as f32
}

/// Loudest non-DC bin and its magnitude, or `None` when every bin is zero.
pub fn peak_bin(magnitudes: &[f32]) -> Option<(usize, f32)> {
    magnitudes
        .iter()
        .copied()
        .enumerate()
        .skip(1)
        .filter(|(_, m)| *m > 0.0)
        .fold(None, |best, (k, m)| match best {
            Some((_, b)) if b >= m => best,
            _ => Some((k, m)),
        })
}

/// Nearest high-E-string note to `freq`: `(fret, name, note frequency)`.
///
/// Returns `None` for non-positive or non-finite input.
pub fn nearest_fret(freq: f32) -> Option<(usize, &'static str, f32)> {
    if !freq.is_finite() || freq <= 0.0 {
        return None;
    }
    HIGH_E_STRING
        .iter()
        .enumerate()
        .min_by(|(_, (_, a)), (_, (_, b))| {
            (a - freq).abs().total_cmp(&(b - freq).abs())
        })
        .map(|(fret, &(name, hz))| (fret, name, hz))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnitudes_unpack_half_complex() {
        // N = 4: [re0, re1, re2, im1]
        let mags = bin_magnitudes(&[1.0, 3.0, -2.0, 4.0]);
        assert_eq!(mags, vec![1.0, 5.0, 2.0]);
        assert!(bin_magnitudes(&[]).is_empty());
    }

    #[test]
    fn odd_length_has_no_nyquist_bin() {
        // N = 5: [re0, re1, re2, im2, im1]
        let mags = bin_magnitudes(&[0.0, 3.0, 0.0, 1.0, 4.0]);
        assert_eq!(mags, vec![0.0, 5.0, 1.0]);
    }

    #[test]
    fn full_scale_sine_reads_zero_db() {
        assert!(magnitude_db(256.0, 512).abs() < 1e-4);
        assert!((magnitude_db(0.0, 512) + 240.0).abs() < 1e-3);
    }

    #[test]
    fn rms_levels() {
        assert_eq!(rms_dbfs(&[]), SILENCE_DBFS);
        assert_eq!(rms_dbfs(&[0.0; 64]), SILENCE_DBFS);
        assert!(rms_dbfs(&[1.0, -1.0]).abs() < 1e-5);
        assert!((rms_dbfs(&[0.5; 16]) + 6.0206).abs() < 1e-3);
    }

    #[test]
    fn peak_skips_dc() {
        assert_eq!(peak_bin(&[10.0, 1.0, 3.0, 2.0]), Some((2, 3.0)));
        assert_eq!(peak_bin(&[10.0, 0.0, 0.0]), None);
        assert_eq!(peak_bin(&[]), None);
        // ties keep the lower bin
        assert_eq!(peak_bin(&[0.0, 2.0, 2.0]), Some((1, 2.0)));
    }

    #[test]
    fn bin_frequency_scales_with_rate() {
        assert!((bin_frequency(10, 512, 44_100) - 861.328).abs() < 1e-2);
        assert_eq!(bin_frequency(3, 0, 44_100), 0.0);
    }

    #[test]
    fn nearest_fret_lookup() {
        assert_eq!(nearest_fret(440.0), Some((5, "A4", 440.0)));
        assert_eq!(nearest_fret(100.0).map(|n| n.0), Some(0));
        assert_eq!(nearest_fret(5_000.0).map(|n| n.1), Some("E6"));
        assert_eq!(nearest_fret(0.0), None);
        assert_eq!(nearest_fret(f32::NAN), None);
    }
}
