//! The immutable per-session capture configuration.

use std::time::Duration;

use crate::config::{AppConfig, TargetDevice};
use crate::dsp::design_low_pass;

use super::error::CaptureError;
use super::negotiate::NegotiationSettings;

/// Everything a capture session needs, derived once from [`AppConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub frame_size: usize,
    /// Channel count requested first; the negotiated count may be lower.
    pub channels: u16,
    pub poll_interval: Duration,
    pub alsa_latency: Duration,
    pub target: TargetDevice,
    /// FIR coefficients, `None` when the filter stage is off.
    pub filter: Option<Vec<f32>>,
    /// Display columns computed per frame.
    pub columns: usize,
    pub freq_start_hz: f32,
    pub freq_end_hz: f32,
}

impl CaptureConfig {
    /// Derive the session configuration.
    ///
    /// `columns` is the display width chosen by the caller (terminal width or
    /// the configured override).
    ///
    /// # Errors
    ///
    /// [`CaptureError::InvalidConfig`] for a frame size below 2, zero
    /// channels, a zero sample rate or a filter longer than a frame.
    pub fn from_app(app: &AppConfig, columns: usize) -> Result<Self, CaptureError> {
        let capture = &app.capture;
        if capture.frame_size < 2 {
            return Err(CaptureError::InvalidConfig(format!(
                "frame_size must be at least 2, got {}",
                capture.frame_size
            )));
        }
        if capture.channels == 0 {
            return Err(CaptureError::InvalidConfig("channels must be at least 1".into()));
        }
        if capture.sample_rate == 0 {
            return Err(CaptureError::InvalidConfig("sample_rate must be positive".into()));
        }

        let filter = if app.filter.enabled {
            let coefficients = match &app.filter.coefficients {
                Some(explicit) => explicit.clone(),
                None => design_low_pass(app.filter.taps, app.filter.cutoff_hz, capture.sample_rate),
            };
            if coefficients.is_empty() {
                return Err(CaptureError::InvalidConfig(
                    "filter is enabled but has no taps".into(),
                ));
            }
            if coefficients.len() > capture.frame_size {
                return Err(CaptureError::InvalidConfig(format!(
                    "filter has {} taps, more than the {}-sample frame",
                    coefficients.len(),
                    capture.frame_size
                )));
            }
            Some(coefficients)
        } else {
            None
        };

        Ok(Self {
            sample_rate: capture.sample_rate,
            frame_size: capture.frame_size,
            channels: capture.channels,
            poll_interval: Duration::from_millis(capture.poll_interval_ms.max(1)),
            alsa_latency: Duration::from_millis(capture.alsa_latency_ms),
            target: app.target.clone(),
            filter,
            columns,
            freq_start_hz: app.display.freq_start_hz,
            freq_end_hz: app.display.freq_end_hz,
        })
    }

    /// How long one buffer lasts at the configured rate.
    pub fn buffer_period(&self) -> Duration {
        Duration::from_secs_f64(self.frame_size as f64 / f64::from(self.sample_rate))
    }

    pub fn negotiation_settings(&self) -> NegotiationSettings {
        NegotiationSettings {
            sample_rate: self.sample_rate,
            frame_size: self.frame_size,
            channels: self.channels,
            alsa_latency: self.alsa_latency,
            shared_servers: self.target.shared_servers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_derive_cleanly() {
        let config = CaptureConfig::from_app(&AppConfig::default(), 80).unwrap();
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.frame_size, 512);
        assert_eq!(config.channels, 2);
        assert_eq!(config.columns, 80);
        assert!(config.filter.is_none());
        assert_eq!(config.poll_interval, Duration::from_millis(100));

        let period = config.buffer_period().as_secs_f64();
        assert!((period - 0.011_61).abs() < 1e-4, "{period}");
    }

    #[test]
    fn filter_uses_explicit_coefficients_first() {
        let mut app = AppConfig::default();
        app.filter.enabled = true;
        app.filter.coefficients = Some(vec![0.5, 0.5]);
        let config = CaptureConfig::from_app(&app, 10).unwrap();
        assert_eq!(config.filter, Some(vec![0.5, 0.5]));

        app.filter.coefficients = None;
        let config = CaptureConfig::from_app(&app, 10).unwrap();
        assert_eq!(config.filter.map(|c| c.len()), Some(31));
    }

    #[test]
    fn rejects_unusable_settings() {
        let mut app = AppConfig::default();
        app.capture.frame_size = 1;
        assert!(matches!(
            CaptureConfig::from_app(&app, 10),
            Err(CaptureError::InvalidConfig(_))
        ));

        let mut app = AppConfig::default();
        app.capture.channels = 0;
        assert!(CaptureConfig::from_app(&app, 10).is_err());

        let mut app = AppConfig::default();
        app.filter.enabled = true;
        app.filter.coefficients = Some(vec![0.1; 600]);
        assert!(CaptureConfig::from_app(&app, 10).is_err());

        let mut app = AppConfig::default();
        app.filter.enabled = true;
        app.filter.coefficients = Some(Vec::new());
        assert!(CaptureConfig::from_app(&app, 10).is_err());
    }

    #[test]
    fn negotiation_settings_carry_target_servers() {
        let config = CaptureConfig::from_app(&AppConfig::default(), 10).unwrap();
        let settings = config.negotiation_settings();
        assert_eq!(settings.channels, 2);
        assert_eq!(settings.alsa_latency, Duration::from_millis(10));
        assert_eq!(settings.shared_servers[0], "pulse");
    }
}
