//! The audio I/O capability the capture core is written against.
//!
//! [`AudioHost`] enumerates input devices and opens capture streams;
//! [`CaptureStream`] is the handle to one open stream.  The production
//! implementations live in [`crate::audio::cpal_host`] (enumerated devices)
//! and [`crate::audio::alsa_host`] (raw ALSA device strings), combined by
//! [`crate::audio::SystemHost`].

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;

// ---------------------------------------------------------------------------
// InputDeviceInfo
// ---------------------------------------------------------------------------

/// One input-capable device as reported by the host's device list.
#[derive(Debug, Clone, PartialEq)]
pub struct InputDeviceInfo {
    /// Position in the host's enumeration order.
    pub index: usize,
    /// Human-readable device name.
    pub name: String,
    /// Largest channel count any supported input config offers.
    pub max_input_channels: u16,
    /// Largest channel count any supported output config offers.
    pub max_output_channels: u16,
    /// Sample rate of the device's default input config (0 when unknown).
    pub default_sample_rate: u32,
    /// The device's own low-latency hint, when it reports one.
    pub low_latency: Option<Duration>,
}

// ---------------------------------------------------------------------------
// DeviceTarget / OpenRequest
// ---------------------------------------------------------------------------

/// What a stream open is aimed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceTarget {
    /// An OS-level device identifier such as `plughw:2,0`, opened verbatim.
    DeviceString(String),
    /// A device from [`AudioHost::input_devices`].
    Enumerated { index: usize, name: String },
}

impl DeviceTarget {
    /// Target for an entry of the host's device list.
    pub fn enumerated(info: &InputDeviceInfo) -> Self {
        Self::Enumerated {
            index: info.index,
            name: info.name.clone(),
        }
    }
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceTarget::DeviceString(s) => f.write_str(s),
            DeviceTarget::Enumerated { index, name } => write!(f, "#{index} \"{name}\""),
        }
    }
}

/// Everything needed to open one capture stream.
///
/// The sample format is always interleaved 32-bit float.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub target: DeviceTarget,
    pub channels: u16,
    pub sample_rate: u32,
    /// Frames per callback buffer.
    pub frame_size: usize,
    /// Suggested latency; `None` lets the backend choose.
    pub latency: Option<Duration>,
}

/// Per-buffer callback receiving raw interleaved `f32` samples.
///
/// Runs on the backend's audio thread.  It must not block.
pub type FrameCallback = Box<dyn FnMut(&[f32]) + Send + 'static>;

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

/// Failures reported by an audio backend.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AudioError {
    #[error("failed to enumerate input devices: {0}")]
    Enumerate(String),

    #[error("failed to open {target} with {channels} channel(s): {reason}")]
    Open {
        target: String,
        channels: u16,
        reason: String,
        /// The device was held by another client.
        busy: bool,
    },

    #[error("this backend cannot open {0}")]
    UnsupportedTarget(String),

    #[error("failed to start audio stream: {0}")]
    Start(String),

    #[error("failed to stop audio stream: {0}")]
    Stop(String),
}

impl AudioError {
    /// `true` when the failure was "device or resource busy".
    pub fn is_busy(&self) -> bool {
        matches!(self, AudioError::Open { busy: true, .. })
    }

    pub(crate) fn open(request: &OpenRequest, reason: impl fmt::Display) -> Self {
        let reason = reason.to_string();
        let busy = reason.to_ascii_lowercase().contains("busy");
        AudioError::Open {
            target: request.target.to_string(),
            channels: request.channels,
            reason,
            busy,
        }
    }
}

/// First fatal error seen by a backend's audio thread, shared with the
/// stream handle that reports it through [`CaptureStream::failure`].
#[derive(Debug, Clone, Default)]
pub(crate) struct StreamFailure(Arc<Mutex<Option<String>>>);

impl StreamFailure {
    /// Record `reason` unless an earlier failure is already recorded.
    pub(crate) fn set(&self, reason: impl fmt::Display) {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(reason.to_string());
        }
    }

    pub(crate) fn get(&self) -> Option<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Handle to an open capture stream.
///
/// Dropping the handle closes the stream and releases the callback it owns.
pub trait CaptureStream {
    /// Begin delivering buffers to the callback.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stop delivering buffers.  The stream stays open.
    fn stop(&mut self) -> Result<(), AudioError>;

    /// Why the stream stopped delivering buffers on its own, once it has.
    ///
    /// Polled by the session between buffers; a stream that cannot fail
    /// this way keeps the default.
    fn failure(&self) -> Option<String> {
        None
    }

    /// Close the stream.
    fn close(self: Box<Self>) {}
}

/// Audio I/O capability: device enumeration and stream opening.
pub trait AudioHost {
    /// All input-capable devices, in enumeration order.
    fn input_devices(&self) -> Result<Vec<InputDeviceInfo>, AudioError>;

    /// Open (but do not start) a capture stream that feeds `callback`.
    ///
    /// On failure the callback is dropped; callers build a fresh one per
    /// attempt.
    fn open_input(
        &self,
        request: &OpenRequest,
        callback: FrameCallback,
    ) -> Result<Box<dyn CaptureStream>, AudioError>;
}

// Compile-time assertion: both traits stay object-safe.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn AudioHost>, _: Box<dyn CaptureStream>) {}
};
