//! Real-input DFT producing half-complex output.
//!
//! Half-complex packing for `N` inputs:
//!
//! ```text
//! out[0]       re(X0)              DC, imaginary part is always zero
//! out[k]       re(Xk)              1 <= k <= N/2
//! out[N - k]   im(Xk)              1 <= k <  (N+1)/2
//! ```
//!
//! For even `N`, `out[N/2]` is the Nyquist bin, which is also real.  The
//! output is unnormalised, matching the usual forward-DFT convention.

use std::collections::TryReserveError;
use std::fmt;
use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

/// A fixed-size real-to-half-complex transform.
///
/// Implementations do all planning and allocation up front; `process` must
/// not allocate.
pub trait RealTransform: Send {
    /// Number of input samples (and output values).
    fn size(&self) -> usize;

    /// Transform `input` into `output`.  Both slices are `size()` long.
    fn process(&mut self, input: &[f32], output: &mut [f32]);
}

fn zeroed<T: Clone>(len: usize, value: T) -> Result<Vec<T>, TryReserveError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)?;
    buf.resize(len, value);
    Ok(buf)
}

// ---------------------------------------------------------------------------
// HalfComplexFft
// ---------------------------------------------------------------------------

/// [`RealTransform`] on top of a planned `realfft` real-to-complex FFT.
///
/// The `N / 2 + 1` complex bins of the real FFT are exactly the values the
/// half-complex layout stores, so packing is a copy.
pub struct HalfComplexFft {
    size: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    /// The FFT uses its input as scratch, so the caller's frame is copied
    /// here first.
    input: Vec<f32>,
    bins: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl fmt::Debug for HalfComplexFft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HalfComplexFft")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl HalfComplexFft {
    /// Plan a forward transform of `size` samples.
    ///
    /// # Errors
    ///
    /// Returns the allocation error if the work buffers cannot be reserved.
    pub fn new(size: usize) -> Result<Self, TryReserveError> {
        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(size);
        let zero = Complex::new(0.0, 0.0);

        Ok(Self {
            size,
            input: zeroed(size, 0.0)?,
            bins: zeroed(size / 2 + 1, zero)?,
            scratch: zeroed(fft.get_scratch_len(), zero)?,
            fft,
        })
    }
}

impl RealTransform for HalfComplexFft {
    fn size(&self) -> usize {
        self.size
    }

    fn process(&mut self, input: &[f32], output: &mut [f32]) {
        let n = self.size;
        debug_assert_eq!(input.len(), n);
        debug_assert_eq!(output.len(), n);
        if n == 0 {
            return;
        }

        self.input.copy_from_slice(input);
        if self
            .fft
            .process_with_scratch(&mut self.input, &mut self.bins, &mut self.scratch)
            .is_err()
        {
            // only on a length mismatch, which the constructor rules out
            output.fill(0.0);
            return;
        }

        for k in 0..=n / 2 {
            output[k] = self.bins[k].re;
        }
        for k in 1..(n + 1) / 2 {
            output[n - k] = self.bins[k].im;
        }
    }
}
