//! The per-buffer processing run inside the audio callback.
//!
//! ```text
//! interleaved buffer → channel 0 → frame accumulator
//!   full frame → FirFilter? → HalfComplexFft → DisplayColumns → SpectrumHandoff
//! ```
//!
//! Every buffer is allocated once in [`CapturePipeline::new`]; processing a
//! frame only copies into them.  Nothing here logs: overruns and skipped
//! publishes are counted in [`CaptureStats`] and reported by the session.  Backends that deliver buffers of a
//! different length than the frame size are handled by accumulating frames
//! across callbacks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::FrameCallback;
use crate::dsp::{DisplayColumns, FirFilter, HalfComplexFft, RealTransform};

use super::config::CaptureConfig;
use super::error::CaptureError;
use super::handoff::SpectrumHandoff;
use super::stats::CaptureStats;

fn zeroed<T: Clone + Default>(len: usize, what: &'static str) -> Result<Vec<T>, CaptureError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(CaptureError::alloc(what))?;
    buf.resize(len, T::default());
    Ok(buf)
}

// ---------------------------------------------------------------------------
// CapturePipeline
// ---------------------------------------------------------------------------

/// Callback state: filter history, frame buffers and transform plan.
pub struct CapturePipeline {
    channels: usize,
    sample_rate: u32,
    /// Downmixed samples of the frame being assembled.
    input: Vec<f32>,
    filled: usize,
    filtered: Vec<f32>,
    spectrum: Vec<f32>,
    tiers: Vec<u8>,
    filter: Option<FirFilter>,
    transform: Box<dyn RealTransform>,
    columns: DisplayColumns,
    budget: Duration,
    handoff: Arc<SpectrumHandoff>,
    stats: Arc<CaptureStats>,
}

impl CapturePipeline {
    /// Allocate everything for a stream delivering `channels` interleaved
    /// channels.
    ///
    /// # Errors
    ///
    /// [`CaptureError::AllocationFailure`] when any buffer cannot be
    /// reserved.
    pub fn new(
        config: &CaptureConfig,
        channels: u16,
        handoff: Arc<SpectrumHandoff>,
        stats: Arc<CaptureStats>,
    ) -> Result<Self, CaptureError> {
        let transform = HalfComplexFft::new(config.frame_size)
            .map_err(CaptureError::alloc("transform buffers"))?;
        Self::with_transform(config, channels, Box::new(transform), handoff, stats)
    }

    /// Like [`CapturePipeline::new`] with a caller-supplied transform.
    ///
    /// # Errors
    ///
    /// [`CaptureError::InvalidConfig`] when the transform size differs from
    /// the frame size, or [`CaptureError::AllocationFailure`].
    pub fn with_transform(
        config: &CaptureConfig,
        channels: u16,
        transform: Box<dyn RealTransform>,
        handoff: Arc<SpectrumHandoff>,
        stats: Arc<CaptureStats>,
    ) -> Result<Self, CaptureError> {
        let n = config.frame_size;
        if transform.size() != n {
            return Err(CaptureError::InvalidConfig(format!(
                "transform size {} does not match frame size {n}",
                transform.size()
            )));
        }
        let filter = match &config.filter {
            Some(coefficients) => FirFilter::new(coefficients.clone())
                .map_err(CaptureError::alloc("filter history"))?,
            None => None,
        };

        Ok(Self {
            channels: usize::from(channels.max(1)),
            sample_rate: config.sample_rate,
            input: zeroed(n, "input frame")?,
            filled: 0,
            filtered: zeroed(n, "filtered frame")?,
            spectrum: zeroed(n, "transform output")?,
            tiers: zeroed(config.columns, "display columns")?,
            filter,
            transform,
            columns: DisplayColumns::new(
                config.columns,
                n,
                config.sample_rate,
                config.freq_start_hz,
                config.freq_end_hz,
            ),
            budget: config.buffer_period(),
            handoff,
            stats,
        })
    }

    /// Factory handed to the negotiator: one fresh pipeline per open attempt.
    pub fn factory(
        config: &CaptureConfig,
        handoff: Arc<SpectrumHandoff>,
        stats: Arc<CaptureStats>,
    ) -> impl FnMut(u16) -> Result<FrameCallback, CaptureError> + '_ {
        move |channels| {
            let pipeline =
                CapturePipeline::new(config, channels, Arc::clone(&handoff), Arc::clone(&stats))?;
            Ok(pipeline.into_callback())
        }
    }

    /// Consume one interleaved buffer from the backend.
    ///
    /// Takes channel 0 of each interleaved frame.  A trailing partial
    /// interleaved frame is ignored.
    pub fn on_buffer(&mut self, data: &[f32]) {
        for frame in data.chunks_exact(self.channels) {
            self.input[self.filled] = frame[0];
            self.filled += 1;
            if self.filled == self.input.len() {
                self.filled = 0;
                self.process_frame();
            }
        }
    }

    fn process_frame(&mut self) {
        let started = Instant::now();

        match self.filter.as_mut() {
            Some(filter) => filter.process(&self.input, &mut self.filtered),
            None => self.filtered.copy_from_slice(&self.input),
        }
        self.transform.process(&self.filtered, &mut self.spectrum);
        self.columns.fill_tiers(&self.spectrum, &mut self.tiers);

        if self
            .handoff
            .publish(&self.filtered, &self.spectrum, &self.tiers, self.sample_rate)
        {
            self.stats.record_frame();
        } else {
            self.stats.record_skipped_publish();
        }

        if started.elapsed() > self.budget {
            self.stats.record_overrun();
        }
    }

    pub fn into_callback(mut self) -> FrameCallback {
        Box::new(move |data: &[f32]| self.on_buffer(data))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
