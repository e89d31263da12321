//! Direct-form FIR filter.
//!
//! The history holds the last `taps` input samples, newest at index 0.
//! Each new sample shifts the history by one (the oldest falls off) and the
//! output is the inner product of the coefficients with the history, so
//! coefficient 0 weights the newest sample.
//!
//! # Example
//!
//! ```rust
//! use thr_spectrum::dsp::FirFilter;
//!
//! // two-tap moving average
//! let mut fir = FirFilter::new(vec![0.5, 0.5]).unwrap().expect("two taps");
//! assert_eq!(fir.process_sample(1.0), 0.5);
//! assert_eq!(fir.process_sample(1.0), 1.0);
//! assert_eq!(fir.process_sample(0.0), 0.5);
//! ```

use std::collections::TryReserveError;
use std::f32::consts::PI;

// ---------------------------------------------------------------------------
// FirFilter
// ---------------------------------------------------------------------------

/// FIR filter with its own sample history.
#[derive(Debug, Clone)]
pub struct FirFilter {
    coefficients: Vec<f32>,
    /// Newest sample first; length never changes after construction.
    history: Vec<f32>,
}

impl FirFilter {
    /// Build a filter from `coefficients` with a zeroed history.
    ///
    /// Returns `Ok(None)` for an empty coefficient list, since there is
    /// nothing to filter with.
    ///
    /// # Errors
    ///
    /// Returns the allocation error if the history cannot be reserved.
    pub fn new(coefficients: Vec<f32>) -> Result<Option<Self>, TryReserveError> {
        if coefficients.is_empty() {
            return Ok(None);
        }
        let mut history = Vec::new();
        history.try_reserve_exact(coefficients.len())?;
        history.resize(coefficients.len(), 0.0);
        Ok(Some(Self {
            coefficients,
            history,
        }))
    }

    /// Shift `sample` into the history and return the filtered value.
    #[inline]
    pub fn process_sample(&mut self, sample: f32) -> f32 {
        let last = self.history.len() - 1;
        self.history.copy_within(..last, 1);
        self.history[0] = sample;

        self.coefficients
            .iter()
            .zip(&self.history)
            .map(|(c, x)| c * x)
            .sum()
    }

    /// Filter `input` into `output` sample by sample.  Processes
    /// `min(input.len(), output.len())` samples.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        for (out, &sample) in output.iter_mut().zip(input) {
            *out = self.process_sample(sample);
        }
    }
}

// ---------------------------------------------------------------------------
// Design
// ---------------------------------------------------------------------------

/// Hamming-windowed sinc low-pass with unity gain at DC.
///
/// Returns an empty vector when `taps == 0` or `sample_rate == 0`.  A cutoff
/// at or above Nyquist yields a pass-through impulse.
pub fn design_low_pass(taps: usize, cutoff_hz: f32, sample_rate: u32) -> Vec<f32> {
    if taps == 0 || sample_rate == 0 {
        return Vec::new();
    }

    let fc = (cutoff_hz / sample_rate as f32).clamp(0.0, 0.5);
    if fc >= 0.5 || taps == 1 {
        let mut impulse = vec![0.0; taps];
        impulse[0] = 1.0;
        return impulse;
    }

    let center = (taps - 1) as f32 / 2.0;
    let mut coefficients: Vec<f32> = (0..taps)
        .map(|n| {
            let x = n as f32 - center;
            let sinc = if x == 0.0 {
                2.0 * fc
            } else {
                (2.0 * PI * fc * x).sin() / (PI * x)
            };
            let window = 0.54 - 0.46 * (2.0 * PI * n as f32 / (taps - 1) as f32).cos();
            sinc * window
        })
        .collect();

    let sum: f32 = coefficients.iter().sum();
    if sum.abs() > f32::EPSILON {
        for c in &mut coefficients {
            *c /= sum;
        }
    }
    coefficients
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
