//! Error taxonomy of the capture pipeline.
//!
//! Resolution and negotiation failures are fatal to a session and surface
//! from [`crate::capture::CaptureSession::open`].  A stream that dies while
//! running ends [`crate::capture::CaptureSession::run`] with
//! [`CaptureError::StreamFailed`].  Overruns inside the per-buffer callback
//! never propagate: the callback only counts them, and the session's poll
//! loop reports them as [`CaptureError::CallbackOverrun`].

use std::collections::TryReserveError;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::audio::AudioError;

// ---------------------------------------------------------------------------
// NegotiationStage / FailedAttempt
// ---------------------------------------------------------------------------

/// Which negotiation path a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStage {
    /// Device-string templates for a resolved sound card.
    CardDevices { card: u32 },
    /// Shared audio-server input after every card template failed.
    SharedServer,
    /// A device found by name in the generic device list.
    GenericDevice,
}

impl fmt::Display for NegotiationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationStage::CardDevices { card } => write!(f, "card {card} device strings"),
            NegotiationStage::SharedServer => f.write_str("shared audio-server fallback"),
            NegotiationStage::GenericDevice => f.write_str("generic input device"),
        }
    }
}

/// One failed `(device, channels)` open, kept for the diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedAttempt {
    pub target: String,
    pub channels: u16,
    pub error: AudioError,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Everything that can stop a capture session from starting or running.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("invalid capture configuration: {0}")]
    InvalidConfig(String),

    /// Every resolution strategy came up empty.
    #[error("could not find {target}: no matching sound card or input device")]
    DeviceNotFound { target: String },

    /// Every candidate configuration failed to open.
    #[error("could not open a capture stream ({stage}); last attempt {last_attempt}: {source}")]
    StreamOpenFailed {
        stage: NegotiationStage,
        last_attempt: String,
        attempts: Vec<FailedAttempt>,
        /// At least one attempt failed because another client held the device.
        busy: bool,
        #[source]
        source: AudioError,
    },

    /// Processing took longer than the buffer lasts, `count` times since the
    /// last report.
    #[error("{count} frame(s) took longer than the {budget:?} buffer period")]
    CallbackOverrun { count: u64, budget: Duration },

    /// The backend stopped delivering buffers on its own.
    #[error("capture stream on {target} failed: {reason}")]
    StreamFailed { target: String, reason: String },

    #[error("failed to allocate {what}: {source}")]
    AllocationFailure {
        what: &'static str,
        #[source]
        source: TryReserveError,
    },

    #[error("audio stream control failed: {0}")]
    Stream(#[from] AudioError),

    #[error("failed to spawn capture thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    #[error("capture thread exited before reporting its setup result")]
    SetupAborted,

    #[error("capture thread panicked")]
    ThreadPanicked,
}

impl CaptureError {
    pub(crate) fn alloc(what: &'static str) -> impl FnOnce(TryReserveError) -> Self {
        move |source| CaptureError::AllocationFailure { what, source }
    }

    /// Multi-line, user-facing report: the error, every failed attempt for
    /// negotiation failures, and a hint when the device was busy.
    pub fn diagnostic(&self) -> String {
        let mut out = self.to_string();
        if let CaptureError::StreamOpenFailed { attempts, busy, .. } = self {
            for attempt in attempts {
                out.push_str(&format!(
                    "\n  - {} ({} ch): {}",
                    attempt.target, attempt.channels, attempt.error
                ));
            }
            if *busy {
                out.push_str(
                    "\nhint: another application has the input open; close DAWs, browsers \
                     or other recorders and retry",
                );
            }
        }
        out
    }
}
