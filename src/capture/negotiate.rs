//! Stream negotiation: turning a [`Resolution`] into an open capture stream.
//!
//! For a resolved card `K` the candidates are, in order,
//!
//! ```text
//! plughw:K,0  hw:K,0  dsnoop:K,0  sysdefault:K,0  sysdefault:K
//! ```
//!
//! each tried with the requested channel count and then mono.  When all of
//! them fail, the first shared audio-server input (PulseAudio, PipeWire,
//! the ALSA `default` route) found in the host's device list gets one
//! attempt.  A generic device found by name is opened once, with no
//! fallback.

use std::fmt;
use std::time::Duration;

use crate::audio::{
    AudioError, AudioHost, CaptureStream, DeviceTarget, FrameCallback, InputDeviceInfo,
    OpenRequest,
};
use crate::device::resolver::find_input_device;
use crate::device::Resolution;

use super::error::{CaptureError, FailedAttempt, NegotiationStage};

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

/// Device-string templates for a resolved card, most exclusive first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlsaTemplate {
    /// `plughw:K,0` — hardware with format/rate conversion.
    PlugHw,
    /// `hw:K,0` — raw hardware.
    Hw,
    /// `dsnoop:K,0` — shared software-mixed capture.
    DSnoop,
    /// `sysdefault:K,0` — the card's default route, device given.
    SysDefaultDevice,
    /// `sysdefault:K` — the card's default route.
    SysDefault,
}

impl AlsaTemplate {
    pub const ORDER: [AlsaTemplate; 5] = [
        AlsaTemplate::PlugHw,
        AlsaTemplate::Hw,
        AlsaTemplate::DSnoop,
        AlsaTemplate::SysDefaultDevice,
        AlsaTemplate::SysDefault,
    ];

    pub fn device_string(self, card: u32) -> String {
        match self {
            AlsaTemplate::PlugHw => format!("plughw:{card},0"),
            AlsaTemplate::Hw => format!("hw:{card},0"),
            AlsaTemplate::DSnoop => format!("dsnoop:{card},0"),
            AlsaTemplate::SysDefaultDevice => format!("sysdefault:{card},0"),
            AlsaTemplate::SysDefault => format!("sysdefault:{card}"),
        }
    }
}

/// The five device strings for `card`, in negotiation order.
pub fn card_device_strings(card: u32) -> [String; 5] {
    AlsaTemplate::ORDER.map(|template| template.device_string(card))
}

/// One `(device, channels)` pair to try.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCandidate {
    pub target: DeviceTarget,
    pub channels: u16,
    pub latency: Option<Duration>,
}

impl fmt::Display for DeviceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} ch)", self.target, self.channels)
    }
}

/// Lazily yields the card candidates: device string outer, channel count
/// inner (`channels` first, then mono).
pub fn card_candidates(
    card: u32,
    channels: u16,
    latency: Option<Duration>,
) -> impl Iterator<Item = DeviceCandidate> {
    let per_device = if channels > 1 { 2 } else { 1 };
    AlsaTemplate::ORDER.into_iter().flat_map(move |template| {
        let device = template.device_string(card);
        [channels, 1]
            .into_iter()
            .take(per_device)
            .map(move |channels| DeviceCandidate {
                target: DeviceTarget::DeviceString(device.clone()),
                channels,
                latency,
            })
    })
}

// ---------------------------------------------------------------------------
// StreamNegotiator
// ---------------------------------------------------------------------------

/// Stream parameters fixed for the whole negotiation.
#[derive(Debug, Clone)]
pub struct NegotiationSettings {
    pub sample_rate: u32,
    pub frame_size: usize,
    /// Channel count tried first.
    pub channels: u16,
    /// Suggested latency for card device strings.
    pub alsa_latency: Duration,
    /// Name fragments of shared audio-server inputs, in preference order.
    pub shared_servers: Vec<String>,
}

/// The stream that opened and how it was reached.
pub struct NegotiatedStream {
    pub stream: Box<dyn CaptureStream>,
    pub target: DeviceTarget,
    /// Channel count the stream actually delivers; drives the downmix.
    pub channels: u16,
    /// Attempts that failed before this one, in order.
    pub failed_attempts: Vec<FailedAttempt>,
}

impl fmt::Debug for NegotiatedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiatedStream")
            .field("target", &self.target)
            .field("channels", &self.channels)
            .field("failed_attempts", &self.failed_attempts.len())
            .finish_non_exhaustive()
    }
}

/// Builds the frame callback for a given channel count.  Called once per
/// attempt because a failed open consumes the callback.
pub type CallbackFactory<'a> = dyn FnMut(u16) -> Result<FrameCallback, CaptureError> + 'a;

/// Tries candidates against an [`AudioHost`] until one opens.
pub struct StreamNegotiator<'a> {
    host: &'a dyn AudioHost,
    settings: &'a NegotiationSettings,
}

#[derive(Default)]
struct AttemptLog {
    failed: Vec<FailedAttempt>,
    last: Option<(NegotiationStage, DeviceCandidate)>,
}

impl<'a> StreamNegotiator<'a> {
    pub fn new(host: &'a dyn AudioHost, settings: &'a NegotiationSettings) -> Self {
        Self { host, settings }
    }

    /// Open a stream for `resolution`.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::StreamOpenFailed`] with the last backend error when
    ///   every candidate failed.
    /// - Whatever `make_callback` returns (allocation failures) immediately.
    pub fn negotiate(
        &self,
        resolution: &Resolution,
        make_callback: &mut CallbackFactory<'_>,
    ) -> Result<NegotiatedStream, CaptureError> {
        let mut tried = AttemptLog::default();

        match resolution {
            Resolution::Card(card) => {
                let stage = NegotiationStage::CardDevices { card: *card };
                let latency = Some(self.settings.alsa_latency);
                for candidate in card_candidates(*card, self.settings.channels, latency) {
                    if let Some(opened) = self.attempt(stage, candidate, make_callback, &mut tried)? {
                        return Ok(opened);
                    }
                }

                match self.shared_server_candidate() {
                    Some(candidate) => {
                        let stage = NegotiationStage::SharedServer;
                        if let Some(opened) = self.attempt(stage, candidate, make_callback, &mut tried)? {
                            return Ok(opened);
                        }
                    }
                    None => log::warn!("no shared audio-server input to fall back to"),
                }
            }
            Resolution::Device(info) => {
                let stage = NegotiationStage::GenericDevice;
                let candidate = self.device_candidate(info);
                if let Some(opened) = self.attempt(stage, candidate, make_callback, &mut tried)? {
                    return Ok(opened);
                }
            }
        }

        Err(Self::exhausted(tried))
    }

    fn device_candidate(&self, info: &InputDeviceInfo) -> DeviceCandidate {
        DeviceCandidate {
            target: DeviceTarget::enumerated(info),
            channels: info.max_input_channels.min(self.settings.channels).max(1),
            latency: info.low_latency,
        }
    }

    fn shared_server_candidate(&self) -> Option<DeviceCandidate> {
        let devices = self
            .host
            .input_devices()
            .map_err(|e| log::warn!("{e}"))
            .ok()?;
        self.settings
            .shared_servers
            .iter()
            .find_map(|name| find_input_device(&devices, name))
            .map(|info| self.device_candidate(info))
    }

    /// `Ok(None)` when the backend rejected the candidate.
    fn attempt(
        &self,
        stage: NegotiationStage,
        candidate: DeviceCandidate,
        make_callback: &mut CallbackFactory<'_>,
        tried: &mut AttemptLog,
    ) -> Result<Option<NegotiatedStream>, CaptureError> {
        let request = OpenRequest {
            target: candidate.target.clone(),
            channels: candidate.channels,
            sample_rate: self.settings.sample_rate,
            frame_size: self.settings.frame_size,
            latency: candidate.latency,
        };
        let callback = make_callback(candidate.channels)?;

        match self.host.open_input(&request, callback) {
            Ok(stream) => {
                log::info!("opened {candidate} via {stage}");
                Ok(Some(NegotiatedStream {
                    stream,
                    target: candidate.target,
                    channels: candidate.channels,
                    failed_attempts: std::mem::take(&mut tried.failed),
                }))
            }
            Err(error) => {
                log::debug!("{stage}: {error}");
                tried.failed.push(FailedAttempt {
                    target: candidate.target.to_string(),
                    channels: candidate.channels,
                    error,
                });
                tried.last = Some((stage, candidate));
                Ok(None)
            }
        }
    }

    fn exhausted(tried: AttemptLog) -> CaptureError {
        let busy = tried.failed.iter().any(|a| a.error.is_busy());
        let Some((stage, last)) = tried.last else {
            return CaptureError::InvalidConfig("no stream candidates to negotiate".into());
        };
        let source = tried
            .failed
            .last()
            .map(|a| a.error.clone())
            .unwrap_or_else(|| AudioError::UnsupportedTarget(last.target.to_string()));

        CaptureError::StreamOpenFailed {
            stage,
            last_attempt: last.to_string(),
            attempts: tried.failed,
            busy,
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::MockHost;

    fn settings() -> NegotiationSettings {
        NegotiationSettings {
            sample_rate: 44_100,
            frame_size: 512,
            channels: 2,
            alsa_latency: Duration::from_millis(10),
            shared_servers: vec!["pulse".into(), "pipewire".into(), "default".into()],
        }
    }

    fn noop_callbacks() -> impl FnMut(u16) -> Result<FrameCallback, CaptureError> {
        |_| Ok(Box::new(|_: &[f32]| {}) as FrameCallback)
    }

    #[test]
    fn five_device_strings_in_fixed_order() {
        for card in [0, 2, 17] {
            let strings = card_device_strings(card);
            assert_eq!(
                strings,
                [
                    format!("plughw:{card},0"),
                    format!("hw:{card},0"),
                    format!("dsnoop:{card},0"),
                    format!("sysdefault:{card},0"),
                    format!("sysdefault:{card}"),
                ]
            );
            assert!(strings.iter().all(|s| s.contains(&card.to_string())));
        }
    }

    #[test]
    fn candidates_try_full_channels_before_mono() {
        let candidates: Vec<(String, u16)> = card_candidates(2, 2, None)
            .map(|c| (c.target.to_string(), c.channels))
            .collect();
        assert_eq!(candidates.len(), 10);
        assert_eq!(candidates[0], ("plughw:2,0".into(), 2));
        assert_eq!(candidates[1], ("plughw:2,0".into(), 1));
        assert_eq!(candidates[8], ("sysdefault:2".into(), 2));
        assert_eq!(candidates[9], ("sysdefault:2".into(), 1));
    }

    #[test]
    fn mono_request_does_not_repeat_mono() {
        assert_eq!(card_candidates(0, 1, None).count(), 5);
    }

    #[test]
    fn only_dsnoop_mono_opens_after_five_failures() {
        let host = MockHost::new().accepting("dsnoop:2,0", 1);
        let settings = settings();
        let negotiator = StreamNegotiator::new(&host, &settings);

        let opened = negotiator
            .negotiate(&Resolution::Card(2), &mut noop_callbacks())
            .unwrap();

        assert_eq!(opened.target, DeviceTarget::DeviceString("dsnoop:2,0".into()));
        assert_eq!(opened.channels, 1);
        assert_eq!(opened.failed_attempts.len(), 5);
        assert_eq!(
            host.attempts(),
            vec![
                ("plughw:2,0".to_string(), 2),
                ("plughw:2,0".to_string(), 1),
                ("hw:2,0".to_string(), 2),
                ("hw:2,0".to_string(), 1),
                ("dsnoop:2,0".to_string(), 2),
                ("dsnoop:2,0".to_string(), 1),
            ]
        );
    }

    #[test]
    fn callback_is_built_for_each_attempts_channel_count() {
        let host = MockHost::new().accepting("hw:0,0", 1);
        let settings = settings();
        let mut built = Vec::new();
        let mut factory = |channels: u16| -> Result<FrameCallback, CaptureError> {
            built.push(channels);
            Ok(Box::new(|_: &[f32]| {}) as FrameCallback)
        };

        StreamNegotiator::new(&host, &settings)
            .negotiate(&Resolution::Card(0), &mut factory)
            .unwrap();
        assert_eq!(built, vec![2, 1, 2, 1]);
    }

    #[test]
    fn card_attempts_use_alsa_latency() {
        let host = MockHost::new().accepting("plughw:1,0", 2);
        let settings = settings();
        StreamNegotiator::new(&host, &settings)
            .negotiate(&Resolution::Card(1), &mut noop_callbacks())
            .unwrap();

        let request = &host.requests()[0];
        assert_eq!(request.latency, Some(Duration::from_millis(10)));
        assert_eq!(request.sample_rate, 44_100);
        assert_eq!(request.frame_size, 512);
    }

    #[test]
    fn shared_server_is_tried_after_all_card_strings() {
        let host = MockHost::new()
            .with_device("HDA Intel PCH", 2)
            .with_device("pulse", 32)
            .accepting("#1 \"pulse\"", 2);
        let settings = settings();

        let opened = StreamNegotiator::new(&host, &settings)
            .negotiate(&Resolution::Card(3), &mut noop_callbacks())
            .unwrap();

        let attempts = host.attempts();
        assert_eq!(attempts.len(), 11);
        assert!(attempts[..10].iter().all(|(t, _)| t.contains('3')));
        assert_eq!(attempts[10], ("#1 \"pulse\"".to_string(), 2));
        assert_eq!(opened.channels, 2);
        // the server's own latency hint is used
        assert_eq!(host.requests()[10].latency, Some(Duration::from_millis(8)));
    }

    #[test]
    fn shared_server_channels_are_capped_by_its_maximum() {
        let host = MockHost::new()
            .with_device("pipewire", 1)
            .accepting("#0 \"pipewire\"", 1);
        let settings = settings();

        let opened = StreamNegotiator::new(&host, &settings)
            .negotiate(&Resolution::Card(0), &mut noop_callbacks())
            .unwrap();
        assert_eq!(opened.channels, 1);
    }

    #[test]
    fn exhaustion_reports_last_error_and_busy_hint() {
        let host = MockHost::new()
            .with_device("pulse", 2)
            .busy("hw:2,0");
        let settings = settings();

        let err = StreamNegotiator::new(&host, &settings)
            .negotiate(&Resolution::Card(2), &mut noop_callbacks())
            .err()
            .expect("negotiation must fail");

        match err {
            CaptureError::StreamOpenFailed {
                stage,
                last_attempt,
                attempts,
                busy,
                source,
            } => {
                assert_eq!(stage, NegotiationStage::SharedServer);
                assert_eq!(last_attempt, "#0 \"pulse\" (2 ch)");
                assert_eq!(attempts.len(), 11);
                assert!(busy);
                assert!(source.to_string().contains("pulse"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn exhaustion_without_shared_server_stays_on_card_stage() {
        let host = MockHost::new();
        let settings = settings();

        let err = StreamNegotiator::new(&host, &settings)
            .negotiate(&Resolution::Card(0), &mut noop_callbacks())
            .err()
            .expect("negotiation must fail");
        match err {
            CaptureError::StreamOpenFailed {
                stage, last_attempt, busy, ..
            } => {
                assert_eq!(stage, NegotiationStage::CardDevices { card: 0 });
                assert_eq!(last_attempt, "sysdefault:0 (1 ch)");
                assert!(!busy);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn generic_device_is_opened_once_with_capped_channels() {
        let host = MockHost::new().with_device("Yamaha THR5", 1);
        let settings = settings();
        let info = host.devices()[0].clone();

        let err = StreamNegotiator::new(&host, &settings)
            .negotiate(&Resolution::Device(info.clone()), &mut noop_callbacks())
            .err()
            .expect("no fallback for generic devices");
        assert!(matches!(
            err,
            CaptureError::StreamOpenFailed {
                stage: NegotiationStage::GenericDevice,
                ..
            }
        ));
        assert_eq!(host.attempts(), vec![("#0 \"Yamaha THR5\"".to_string(), 1)]);
        assert_eq!(host.requests()[0].latency, info.low_latency);
    }

    #[test]
    fn callback_factory_errors_abort_negotiation() {
        let host = MockHost::new().accepting("plughw:0,0", 2);
        let settings = settings();
        let mut failing = |_: u16| -> Result<FrameCallback, CaptureError> {
            Err(CaptureError::InvalidConfig("no buffers".into()))
        };

        let err = StreamNegotiator::new(&host, &settings)
            .negotiate(&Resolution::Card(0), &mut failing)
            .err()
            .expect("factory error propagates");
        assert!(matches!(err, CaptureError::InvalidConfig(_)));
        assert!(host.attempts().is_empty());
    }
}
