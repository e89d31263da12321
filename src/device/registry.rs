//! The OS sound-card registry.
//!
//! On Linux this is procfs: `/proc/asound/cards` lists installed cards with
//! their index and names, and `/proc/asound/cardN/usbid` holds the
//! `vendor:product` id of USB cards.  [`ProcAsoundRegistry`] reads both
//! from a configurable root so tests can point it at a temp directory.

use std::fs;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// CardRegistry
// ---------------------------------------------------------------------------

/// USB identity of one installed card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardUsbId {
    pub card: u32,
    /// `vendor:product`, e.g. `0499:1506`.
    pub usb_id: String,
}

/// Read access to the OS list of installed sound cards.
pub trait CardRegistry {
    /// Raw text of the card listing, or `None` when it cannot be read.
    fn card_listing(&self) -> Option<String>;

    /// USB ids of every card that exposes one, ordered by card index.
    fn usb_ids(&self) -> Vec<CardUsbId>;
}

// ---------------------------------------------------------------------------
// ProcAsoundRegistry
// ---------------------------------------------------------------------------

/// [`CardRegistry`] backed by an `/proc/asound`-shaped directory.
#[derive(Debug, Clone)]
pub struct ProcAsoundRegistry {
    root: PathBuf,
}

impl ProcAsoundRegistry {
    pub const DEFAULT_ROOT: &'static str = "/proc/asound";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for ProcAsoundRegistry {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ROOT)
    }
}

impl CardRegistry for ProcAsoundRegistry {
    fn card_listing(&self) -> Option<String> {
        let path = self.root.join("cards");
        match fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) => {
                log::debug!("cannot read {}: {e}", path.display());
                None
            }
        }
    }

    fn usb_ids(&self) -> Vec<CardUsbId> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };

        let mut ids: Vec<CardUsbId> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name();
                let card: u32 = name.to_str()?.strip_prefix("card")?.parse().ok()?;
                let usb_id = fs::read_to_string(entry.path().join("usbid")).ok()?;
                Some(CardUsbId {
                    card,
                    usb_id: usb_id.trim().to_string(),
                })
            })
            .collect();

        // readdir order is unspecified
        ids.sort_by_key(|id| id.card);
        ids
    }
}

/// Leading card index of a `/proc/asound/cards` line, if it has one.
///
/// Card header lines look like ` 0 [THR5           ]: USB-Audio - THR5`;
/// continuation lines start with whitespace followed by text.
pub fn leading_card_index(line: &str) -> Option<u32> {
    let digits: &str = {
        let trimmed = line.trim_start();
        let end = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        &trimmed[..end]
    };
    digits.parse().ok()
}
