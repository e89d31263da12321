//! Audio I/O: device enumeration and capture streams.
//!
//! # Backends
//!
//! ```text
//! SystemHost ─┬─ CpalHost   devices from the enumerated list
//!             └─ AlsaHost   raw ALSA device strings (Linux)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use thr_spectrum::audio::{AudioHost, SystemHost};
//!
//! let host = SystemHost::new(25);
//! for device in host.input_devices().unwrap() {
//!     println!("{}: {} ({} ch in)", device.index, device.name, device.max_input_channels);
//! }
//! ```

#[cfg(target_os = "linux")]
pub mod alsa_host;
pub mod cpal_host;
pub mod host;
#[cfg(test)]
pub mod mock;
pub mod system_host;

#[cfg(target_os = "linux")]
pub use alsa_host::AlsaHost;
pub use cpal_host::CpalHost;
pub use host::{
    AudioError, AudioHost, CaptureStream, DeviceTarget, FrameCallback, InputDeviceInfo,
    OpenRequest,
};
pub use system_host::SystemHost;
