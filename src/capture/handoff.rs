//! Latest-frame handoff from the capture callback to a consumer.
//!
//! One slot, one lock, one dirty flag.  The writer overwrites the slot and
//! sets the flag; the reader copies the slot out only when the flag is set
//! and clears it.  Frames the reader did not get to are overwritten and
//! never seen.
//!
//! # Example
//!
//! ```rust
//! use thr_spectrum::capture::{SpectrumFrame, SpectrumHandoff};
//!
//! let handoff = SpectrumHandoff::new(4, 2).unwrap();
//! let mut frame = SpectrumFrame::default();
//!
//! assert!(!handoff.read_into(&mut frame));
//! handoff.publish(&[0.1, 0.2, 0.3, 0.4], &[1.0, 0.0, 0.0, 0.0], &[7, 0], 44_100);
//! assert!(handoff.read_into(&mut frame));
//! assert_eq!(frame.sample_rate, 44_100);
//! assert!(!handoff.read_into(&mut frame)); // already consumed
//! ```

use std::sync::{Mutex, MutexGuard, TryLockError};

use super::error::CaptureError;

// ---------------------------------------------------------------------------
// SpectrumFrame
// ---------------------------------------------------------------------------

/// One published frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrumFrame {
    /// Filtered (or raw, when the filter is off) downmixed samples.
    pub time_domain: Vec<f32>,
    /// Half-complex transform of `time_domain`.
    pub spectrum: Vec<f32>,
    /// Quantised display tiers, one per column.
    pub tiers: Vec<u8>,
    pub sample_rate: u32,
}

impl SpectrumFrame {
    fn try_with_capacity(frame_size: usize, columns: usize) -> Result<Self, CaptureError> {
        let mut frame = Self::default();
        frame
            .time_domain
            .try_reserve_exact(frame_size)
            .map_err(CaptureError::alloc("shared time-domain buffer"))?;
        frame
            .spectrum
            .try_reserve_exact(frame_size)
            .map_err(CaptureError::alloc("shared spectrum buffer"))?;
        frame
            .tiers
            .try_reserve_exact(columns)
            .map_err(CaptureError::alloc("shared display columns"))?;
        Ok(frame)
    }

    /// Overwrite with `src`; allocation-free once capacities match.
    fn copy_from(&mut self, time_domain: &[f32], spectrum: &[f32], tiers: &[u8], sample_rate: u32) {
        self.time_domain.clear();
        self.time_domain.extend_from_slice(time_domain);
        self.spectrum.clear();
        self.spectrum.extend_from_slice(spectrum);
        self.tiers.clear();
        self.tiers.extend_from_slice(tiers);
        self.sample_rate = sample_rate;
    }
}

// ---------------------------------------------------------------------------
// SpectrumHandoff
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Slot {
    frame: SpectrumFrame,
    dirty: bool,
}

/// Single-slot, last-writer-wins exchange between two threads.
#[derive(Debug, Default)]
pub struct SpectrumHandoff {
    slot: Mutex<Slot>,
}

impl SpectrumHandoff {
    /// Handoff with room for `frame_size` samples and `columns` tiers, so
    /// publishing never allocates.
    ///
    /// # Errors
    ///
    /// [`CaptureError::AllocationFailure`] if the buffers cannot be reserved.
    pub fn new(frame_size: usize, columns: usize) -> Result<Self, CaptureError> {
        Ok(Self {
            slot: Mutex::new(Slot {
                frame: SpectrumFrame::try_with_capacity(frame_size, columns)?,
                dirty: false,
            }),
        })
    }

    // The slot holds plain buffers; a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Writer side.  Never waits: if the reader holds the lock the frame is
    /// dropped and `false` is returned.
    pub fn publish(
        &self,
        time_domain: &[f32],
        spectrum: &[f32],
        tiers: &[u8],
        sample_rate: u32,
    ) -> bool {
        let mut slot = match self.slot.try_lock() {
            Ok(slot) => slot,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
        };
        slot.frame
            .copy_from(time_domain, spectrum, tiers, sample_rate);
        slot.dirty = true;
        true
    }

    /// Reader side.  Copies the latest frame into `out` and clears the dirty
    /// flag; returns `false` without touching `out` when nothing new was
    /// published.
    pub fn read_into(&self, out: &mut SpectrumFrame) -> bool {
        let mut slot = self.lock();
        if !slot.dirty {
            return false;
        }
        out.copy_from(
            &slot.frame.time_domain,
            &slot.frame.spectrum,
            &slot.frame.tiers,
            slot.frame.sample_rate,
        );
        slot.dirty = false;
        true
    }

    /// Like [`read_into`](Self::read_into) but returns an owned frame.
    pub fn take(&self) -> Option<SpectrumFrame> {
        let mut frame = SpectrumFrame::default();
        self.read_into(&mut frame).then_some(frame)
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }
}
