//! The capture core: negotiation, the per-buffer pipeline, the handoff to
//! consumers, and the session that ties them together.
//!
//! # Flow
//!
//! ```text
//! DeviceResolver → StreamNegotiator → stream + CapturePipeline callback
//!               → SpectrumHandoff → consumer
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use thr_spectrum::audio::SystemHost;
//! use thr_spectrum::capture::{CaptureConfig, CaptureHandle, CaptureStats, SpectrumHandoff};
//! use thr_spectrum::config::AppConfig;
//! use thr_spectrum::device::ProcAsoundRegistry;
//!
//! let app = AppConfig::default();
//! let config = CaptureConfig::from_app(&app, 80).unwrap();
//! let handoff = Arc::new(SpectrumHandoff::new(config.frame_size, config.columns).unwrap());
//! let stats = Arc::new(CaptureStats::new());
//!
//! let retries = app.capture.busy_retries;
//! let handle = CaptureHandle::spawn(
//!     config,
//!     move || SystemHost::new(retries),
//!     Box::new(ProcAsoundRegistry::default()),
//!     Arc::clone(&handoff),
//!     stats,
//! )
//! .unwrap();
//!
//! if let Some(frame) = handoff.take() {
//!     println!("{} bins", frame.spectrum.len());
//! }
//! handle.join().unwrap();
//! ```

pub mod config;
pub mod error;
pub mod handoff;
pub mod negotiate;
pub mod pipeline;
pub mod session;
pub mod stats;

pub use config::CaptureConfig;
pub use error::{CaptureError, FailedAttempt, NegotiationStage};
pub use handoff::{SpectrumFrame, SpectrumHandoff};
pub use negotiate::{
    card_candidates, card_device_strings, AlsaTemplate, DeviceCandidate, NegotiatedStream,
    NegotiationSettings, StreamNegotiator,
};
pub use pipeline::CapturePipeline;
pub use session::{CaptureHandle, CaptureSession, SessionInfo};
pub use stats::{CaptureStats, StatsSnapshot};
