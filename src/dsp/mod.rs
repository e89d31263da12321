//! Signal processing for the capture callback and its consumers.
//!
//! # Pipeline
//!
//! ```text
//! downmixed frame → FirFilter (optional) → RealTransform (half-complex)
//!                 → DisplayColumns (log-warped, 8 tiers)
//! ```
//!
//! [`spectrum`] holds the readouts a renderer derives from a published
//! frame: bin magnitudes, levels, and the peak note.

pub mod display;
pub mod fir;
pub mod spectrum;
pub mod transform;

pub use display::{glyph, quantize, DisplayColumns, GLYPHS};
pub use fir::{design_low_pass, FirFilter};
pub use transform::{HalfComplexFft, RealTransform};
