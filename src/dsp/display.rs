//! Display columns for a one-line terminal spectrum.
//!
//! Column `i` of `D` samples the half-complex transform output at
//!
//! ```text
//! start + (i / D)^4 * span
//! ```
//!
//! where `start` is the bin of the lower display frequency and `span` reaches
//! the upper display frequency or Nyquist, whichever comes first.  The fourth
//! power packs most columns into the low end, where a guitar's energy is.
//! Each sampled value is quantised to one of eight tiers and drawn as a block
//! glyph.
//!
//! # Example
//!
//! ```rust
//! use thr_spectrum::dsp::DisplayColumns;
//!
//! let columns = DisplayColumns::new(80, 512, 44_100, 20.0, 20_000.0);
//! assert_eq!(columns.len(), 80);
//!
//! let spectrum = vec![0.0_f32; 512];
//! let mut tiers = vec![0_u8; 80];
//! columns.fill_tiers(&spectrum, &mut tiers);
//! assert_eq!(DisplayColumns::render(&tiers), "▁".repeat(80));
//! ```

/// Block glyphs, lowest tier first.
pub const GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Fallback width when the terminal size is unknown.
pub const DEFAULT_COLUMNS: usize = 100;

/// Narrowest spectrum line.
pub const MIN_COLUMNS: usize = 10;

/// Tier of a transform value: `floor(v * 8)` clamped to `0..=7`.
///
/// Values below `0.125`, negative values and NaN are tier 0; anything at or
/// above `0.875` is tier 7.
#[inline]
pub fn quantize(value: f32) -> u8 {
    if value.is_nan() || value < 0.125 {
        return 0;
    }
    ((value * 8.0) as u32).min(7) as u8
}

/// Glyph for a tier; tiers above 7 draw as the full block.
#[inline]
pub fn glyph(tier: u8) -> char {
    GLYPHS[usize::from(tier).min(GLYPHS.len() - 1)]
}

/// Column count for a terminal `width`: one less than the width so the
/// cursor never wraps, never below [`MIN_COLUMNS`].
pub fn columns_for_width(width: Option<usize>) -> usize {
    width
        .map(|w| w.saturating_sub(1))
        .unwrap_or(DEFAULT_COLUMNS)
        .max(MIN_COLUMNS)
}

/// Width of the controlling terminal.
///
/// Asks the terminal first and falls back to the `COLUMNS` environment
/// variable when stdout is not a tty.
pub fn terminal_width() -> Option<usize> {
    resolve_width(
        crossterm::terminal::size().ok(),
        std::env::var("COLUMNS").ok(),
    )
}

fn resolve_width(tty: Option<(u16, u16)>, env: Option<String>) -> Option<usize> {
    tty.map(|(width, _)| usize::from(width))
        .filter(|&w| w > 0)
        .or_else(|| env?.trim().parse().ok().filter(|&w: &usize| w > 0))
}

// ---------------------------------------------------------------------------
// DisplayColumns
// ---------------------------------------------------------------------------

/// Precomputed column-to-bin mapping for one frame size and sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayColumns {
    /// Transform index sampled by each column; non-decreasing.
    indices: Vec<usize>,
}

impl DisplayColumns {
    /// Map `columns` display columns onto a transform of `frame_size` points.
    ///
    /// `start = ceil(frame_size / sample_rate * freq_start)` and
    /// `span = min(ceil(frame_size / sample_rate * freq_end), frame_size / 2) - start`,
    /// saturating at zero when the range is empty.
    pub fn new(
        columns: usize,
        frame_size: usize,
        sample_rate: u32,
        freq_start: f32,
        freq_end: f32,
    ) -> Self {
        let ratio = if sample_rate == 0 {
            0.0
        } else {
            frame_size as f64 / f64::from(sample_rate)
        };
        let bin = |hz: f32| (ratio * f64::from(hz.max(0.0))).ceil() as usize;

        let nyquist = frame_size / 2;
        let start = bin(freq_start).min(nyquist);
        let span = bin(freq_end).min(nyquist).saturating_sub(start);
        let last = frame_size.saturating_sub(1);

        let indices = (0..columns)
            .map(|i| {
                let proportion = (i as f64 / columns as f64).powi(4);
                let index = start + (proportion * span as f64) as usize;
                index.min(last)
            })
            .collect();

        Self { indices }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Quantise the sampled transform values into `tiers`.
    ///
    /// Writes `min(self.len(), tiers.len())` entries.  Does not allocate.
    pub fn fill_tiers(&self, spectrum: &[f32], tiers: &mut [u8]) {
        for (tier, &index) in tiers.iter_mut().zip(&self.indices) {
            *tier = spectrum.get(index).copied().map_or(0, quantize);
        }
    }

    /// Glyph line for a slice of tiers.
    pub fn render(tiers: &[u8]) -> String {
        tiers.iter().map(|&t| glyph(t)).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_thresholds() {
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(0.124), 0);
        assert_eq!(quantize(0.125), 1);
        assert_eq!(quantize(0.25), 2);
        assert_eq!(quantize(0.5), 4);
        assert_eq!(quantize(0.874), 6);
        assert_eq!(quantize(0.875), 7);
    }

    #[test]
    fn out_of_range_values_clamp() {
        assert_eq!(quantize(-3.0), 0);
        assert_eq!(quantize(1.0), 7);
        assert_eq!(quantize(250.0), 7);
        assert_eq!(quantize(f32::INFINITY), 7);
        assert_eq!(quantize(f32::NAN), 0);
    }

    #[test]
    fn glyphs_follow_tiers() {
        assert_eq!(glyph(0), '▁');
        assert_eq!(glyph(7), '█');
        assert_eq!(glyph(200), '█');
        assert_eq!(DisplayColumns::render(&[0, 3, 7]), "▁▄█");
    }

    #[test]
    fn default_bounds_match_512_at_44100() {
        let columns = DisplayColumns::new(100, 512, 44_100, 20.0, 20_000.0);
        // ceil(512/44100*20) = 1, min(ceil(232.2), 256) - 1 = 232
        assert_eq!(columns.indices[0], 1);
        // (99/100)^4 * 232 = 222.8
        assert_eq!(columns.indices[99], 223);
    }

    #[test]
    fn span_stops_at_nyquist() {
        let columns = DisplayColumns::new(50, 64, 8_000, 20.0, 20_000.0);
        // start 1, span min(160, 32) - 1 = 31
        assert_eq!(columns.indices[0], 1);
        assert!(columns.indices.iter().all(|&i| i <= 32));
    }

    #[test]
    fn indices_never_decrease() {
        for &(d, n) in &[(10, 2), (37, 256), (100, 512), (400, 4096)] {
            let columns = DisplayColumns::new(d, n, 44_100, 20.0, 20_000.0);
            assert!(
                columns.indices.windows(2).all(|w| w[0] <= w[1]),
                "D={d} N={n}"
            );
        }
    }

    #[test]
    fn empty_range_collapses_to_start() {
        let columns = DisplayColumns::new(10, 512, 44_100, 5_000.0, 100.0);
        // ceil(512/44100*5000) = 59, span saturates to 0
        assert!(columns.indices.iter().all(|&i| i == 59));
    }

    #[test]
    fn fill_tiers_reads_mapped_bins() {
        // ratio 1, start 0, span 8: column 9 samples bin floor(0.9^4 * 8) = 5
        let columns = DisplayColumns::new(10, 16, 16, 0.0, 8.0);
        assert_eq!(columns.indices[9], 5);

        let mut spectrum = vec![0.0; 16];
        spectrum[0] = 0.9;
        spectrum[5] = 0.5;
        let mut tiers = [9_u8; 10];
        columns.fill_tiers(&spectrum, &mut tiers);
        assert_eq!(tiers[0], 7);
        assert_eq!(tiers[9], 4);
    }

    #[test]
    fn column_count_from_width() {
        assert_eq!(columns_for_width(Some(120)), 119);
        assert_eq!(columns_for_width(Some(4)), MIN_COLUMNS);
        assert_eq!(columns_for_width(None), DEFAULT_COLUMNS);
    }

    #[test]
    fn width_prefers_the_terminal() {
        assert_eq!(resolve_width(Some((132, 40)), Some("80".into())), Some(132));
        assert_eq!(resolve_width(Some((0, 0)), Some(" 80 ".into())), Some(80));
        assert_eq!(resolve_width(None, Some("80".into())), Some(80));
    }

    #[test]
    fn unknown_width_falls_back_to_default_columns() {
        assert_eq!(resolve_width(None, None), None);
        assert_eq!(resolve_width(None, Some("wide".into())), None);
        assert_eq!(resolve_width(None, Some("0".into())), None);
        assert_eq!(columns_for_width(resolve_width(None, None)), DEFAULT_COLUMNS);
    }

    #[test]
    fn zero_columns_is_empty() {
        assert!(DisplayColumns::new(0, 512, 44_100, 20.0, 20_000.0).is_empty());
    }
}
