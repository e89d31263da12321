//! Locating the target hardware.
//!
//! Strategies, in order; the first that finds anything wins:
//!
//! 1. card listing, product or vendor name (case-insensitive)
//! 2. per-card USB id, exact `vendor:product` match
//! 3. the audio host's input device list, by product, then vendor, then
//!    generic class name (case-insensitive)
//!
//! Within a strategy the first match in enumeration order wins.

use crate::audio::{AudioHost, InputDeviceInfo};
use crate::capture::CaptureError;
use crate::config::TargetDevice;

use super::registry::{leading_card_index, CardRegistry};

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Where the target hardware was found.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A sound card index in the OS registry.  Index 0 is a valid card.
    Card(u32),
    /// An entry of the audio host's generic device list.
    Device(InputDeviceInfo),
}

/// `true` when `text` contains a non-empty `pattern`, ignoring case.
pub fn contains_ignore_case(text: &str, pattern: &str) -> bool {
    !pattern.is_empty() && text.to_lowercase().contains(&pattern.to_lowercase())
}

/// Card index of the first listing line naming `product` or `vendor`.
///
/// Continuation lines carry no index of their own and belong to the card
/// whose header precedes them.
pub fn find_card_in_listing(listing: &str, target: &TargetDevice) -> Option<u32> {
    let mut current = None;
    for line in listing.lines() {
        if let Some(index) = leading_card_index(line) {
            current = Some(index);
        }
        let named = contains_ignore_case(line, &target.product)
            || contains_ignore_case(line, &target.vendor);
        if named && current.is_some() {
            return current;
        }
    }
    None
}

/// First input device whose name contains `pattern`, ignoring case.
pub fn find_input_device<'a>(
    devices: &'a [InputDeviceInfo],
    pattern: &str,
) -> Option<&'a InputDeviceInfo> {
    devices
        .iter()
        .filter(|d| d.max_input_channels > 0)
        .find(|d| contains_ignore_case(&d.name, pattern))
}

// ---------------------------------------------------------------------------
// DeviceResolver
// ---------------------------------------------------------------------------

/// Runs the resolution strategies for one [`TargetDevice`].
pub struct DeviceResolver<'a> {
    target: &'a TargetDevice,
    registry: &'a dyn CardRegistry,
}

impl<'a> DeviceResolver<'a> {
    pub fn new(target: &'a TargetDevice, registry: &'a dyn CardRegistry) -> Self {
        Self { target, registry }
    }

    /// Strategies 1 and 2: the OS card registry.
    pub fn find_card(&self) -> Option<u32> {
        if let Some(listing) = self.registry.card_listing() {
            if let Some(card) = find_card_in_listing(&listing, self.target) {
                log::info!("found {} as sound card {card} by name", self.target.product);
                return Some(card);
            }
        }

        if self.target.usb_id.is_empty() {
            return None;
        }
        let card = self
            .registry
            .usb_ids()
            .into_iter()
            .find(|id| id.usb_id == self.target.usb_id)
            .map(|id| id.card)?;
        log::info!(
            "found {} as sound card {card} by USB id {}",
            self.target.product,
            self.target.usb_id
        );
        Some(card)
    }

    /// Strategy 3: the audio host's generic device list.
    pub fn find_device(&self, devices: &[InputDeviceInfo]) -> Option<InputDeviceInfo> {
        [
            &self.target.product,
            &self.target.vendor,
            &self.target.generic_class,
        ]
        .into_iter()
        .find_map(|pattern| {
            let device = find_input_device(devices, pattern)?;
            log::info!("matched input device \"{}\" on \"{pattern}\"", device.name);
            Some(device.clone())
        })
    }

    /// Run every strategy in order.
    ///
    /// # Errors
    ///
    /// [`CaptureError::DeviceNotFound`] when nothing matched.
    pub fn resolve(&self, host: &dyn AudioHost) -> Result<Resolution, CaptureError> {
        if let Some(card) = self.find_card() {
            return Ok(Resolution::Card(card));
        }

        let devices = host.input_devices().unwrap_or_else(|e| {
            log::warn!("{e}; treating the device list as empty");
            Vec::new()
        });
        if let Some(device) = self.find_device(&devices) {
            return Ok(Resolution::Device(device));
        }

        Err(CaptureError::DeviceNotFound {
            target: format!(
                "{} {} (USB {})",
                self.target.vendor, self.target.product, self.target.usb_id
            ),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::MockHost;
    use crate::device::CardUsbId;

    struct FakeRegistry {
        listing: Option<String>,
        usb_ids: Vec<CardUsbId>,
    }

    impl CardRegistry for FakeRegistry {
        fn card_listing(&self) -> Option<String> {
            self.listing.clone()
        }
        fn usb_ids(&self) -> Vec<CardUsbId> {
            self.usb_ids.clone()
        }
    }

    fn registry(listing: Option<&str>, usb_ids: &[(u32, &str)]) -> FakeRegistry {
        FakeRegistry {
            listing: listing.map(str::to_string),
            usb_ids: usb_ids
                .iter()
                .map(|(card, id)| CardUsbId {
                    card: *card,
                    usb_id: id.to_string(),
                })
                .collect(),
        }
    }

    const TWO_CARDS: &str = "\
 0 [PCH            ]: HDA-Intel - HDA Intel PCH
                      HDA Intel PCH at 0xf7f10000 irq 32
 2 [THR5           ]: USB-Audio - THR5
                      Yamaha Corporation THR5 at usb-0000:00:14.0-2, full speed
";

    #[test]
    fn card_zero_is_found() {
        let target = TargetDevice::default();
        let listing = " 0 [THR5           ]: USB-Audio - THR5\n";
        assert_eq!(find_card_in_listing(listing, &target), Some(0));

        let reg = registry(Some(listing), &[]);
        let resolution = DeviceResolver::new(&target, &reg)
            .resolve(&MockHost::new())
            .unwrap();
        assert_eq!(resolution, Resolution::Card(0));
    }

    #[test]
    fn listing_match_is_case_insensitive() {
        let mut target = TargetDevice::default();
        target.product = "thr5".into();
        assert_eq!(find_card_in_listing(TWO_CARDS, &target), Some(2));
    }

    #[test]
    fn vendor_on_continuation_line_maps_to_header_index() {
        let mut target = TargetDevice::default();
        target.product = "THR10".into();
        assert_eq!(find_card_in_listing(TWO_CARDS, &target), Some(2));
    }

    #[test]
    fn first_listed_card_wins() {
        let target = TargetDevice::default();
        let listing = " 1 [THR5 ]: USB-Audio - THR5\n 4 [THR5_1 ]: USB-Audio - THR5\n";
        assert_eq!(find_card_in_listing(listing, &target), Some(1));
    }

    #[test]
    fn empty_patterns_never_match() {
        let target = TargetDevice {
            product: String::new(),
            vendor: String::new(),
            ..TargetDevice::default()
        };
        assert_eq!(find_card_in_listing(TWO_CARDS, &target), None);
        assert!(!contains_ignore_case("anything", ""));
    }

    #[test]
    fn usb_id_fallback_matches_exactly() {
        let target = TargetDevice::default();
        let reg = registry(
            Some(" 0 [PCH ]: HDA-Intel - HDA Intel PCH\n"),
            &[(1, "0499:15060"), (3, "0499:1506")],
        );
        assert_eq!(DeviceResolver::new(&target, &reg).find_card(), Some(3));
    }

    #[test]
    fn generic_list_prefers_product_then_vendor_then_class() {
        let target = TargetDevice::default();
        let reg = registry(None, &[]);
        let resolver = DeviceResolver::new(&target, &reg);

        let host = MockHost::new()
            .with_device("USB Audio CODEC", 2)
            .with_device("Yamaha Steinberg USB", 2)
            .with_device("THR5: USB Audio (hw:3,0)", 2);
        assert_eq!(
            resolver.find_device(host.devices()).unwrap().name,
            "THR5: USB Audio (hw:3,0)"
        );

        let host = MockHost::new()
            .with_device("USB Audio CODEC", 2)
            .with_device("Yamaha Steinberg USB", 2);
        assert_eq!(
            resolver.find_device(host.devices()).unwrap().name,
            "Yamaha Steinberg USB"
        );

        let host = MockHost::new()
            .with_device("HDA Intel PCH", 2)
            .with_device("usb audio codec", 1);
        assert_eq!(
            resolver.find_device(host.devices()).unwrap().name,
            "usb audio codec"
        );
    }

    #[test]
    fn output_only_devices_are_skipped() {
        let host = MockHost::new().with_device("THR5 playback", 0);
        assert!(find_input_device(host.devices(), "THR5").is_none());
    }

    #[test]
    fn resolve_falls_back_to_generic_device() {
        let target = TargetDevice::default();
        let reg = registry(None, &[]);
        let host = MockHost::new()
            .with_device("default", 2)
            .with_device("THR5", 2);

        match DeviceResolver::new(&target, &reg).resolve(&host).unwrap() {
            Resolution::Device(info) => {
                assert_eq!(info.name, "THR5");
                assert_eq!(info.index, 1);
            }
            other => panic!("expected a device, got {other:?}"),
        }
    }

    #[test]
    fn nothing_found_is_device_not_found() {
        let target = TargetDevice::default();
        let reg = registry(Some(TWO_CARDS.replace("THR5", "XYZ").replace("Yamaha", "Acme").as_str()), &[]);
        let host = MockHost::new().with_device("HDA Intel PCH", 2);

        let err = DeviceResolver::new(&target, &reg).resolve(&host).unwrap_err();
        assert!(matches!(err, CaptureError::DeviceNotFound { .. }));
    }
}
