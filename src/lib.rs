//! Live spectrum capture for the Yamaha THR5 USB amplifier.
//!
//! ```text
//! device   find the amp: card registry, USB id, generic device list
//! capture  negotiate a stream, run the per-buffer pipeline, hand frames off
//! dsp      FIR filter, half-complex FFT, display columns, readouts
//! audio    backends: cpal (enumerated devices), ALSA (device strings)
//! config   settings.toml
//! ```

pub mod audio;
pub mod capture;
pub mod config;
pub mod device;
pub mod dsp;
