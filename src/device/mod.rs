//! Device resolution — finding the amplifier among the host's sound cards
//! and input devices.
//!
//! ```text
//! /proc/asound/cards ──name──┐
//! /proc/asound/cardN/usbid ──┼──▶ Resolution::Card(index)
//!                            │
//! AudioHost::input_devices ──┴──▶ Resolution::Device(info)
//! ```

pub mod registry;
pub mod resolver;

pub use registry::{CardRegistry, CardUsbId, ProcAsoundRegistry};
pub use resolver::{contains_ignore_case, DeviceResolver, Resolution};
