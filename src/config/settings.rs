//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and handed to the
//! capture thread.  Every section is `#[serde(default)]`, so a settings file
//! only needs the keys it changes.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// CaptureSettings
// ---------------------------------------------------------------------------

/// Stream parameters requested from the audio stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Sample rate in Hz requested for the capture stream.
    pub sample_rate: u32,
    /// Frames delivered to the processing callback per buffer.
    pub frame_size: usize,
    /// Channel count tried first during negotiation (mono is the fallback).
    pub channels: u16,
    /// How often the capture thread checks the stop flag, in milliseconds.
    pub poll_interval_ms: u64,
    /// Suggested latency for device-string (ALSA) candidates, in milliseconds.
    pub alsa_latency_ms: u64,
    /// Extra open attempts on a device string that reports "busy".
    pub busy_retries: u32,
    /// How long the CLI captures before shutting down.  `0` runs until the
    /// process is killed.
    pub run_secs: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            frame_size: 512,
            channels: 2,
            poll_interval_ms: 100,
            alsa_latency_ms: 10,
            busy_retries: 25,
            run_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// TargetDevice
// ---------------------------------------------------------------------------

/// Identity of the hardware the resolver looks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetDevice {
    /// Product name, matched case-insensitively (e.g. `"THR5"`).
    pub product: String,
    /// Vendor name, matched case-insensitively (e.g. `"Yamaha"`).
    pub vendor: String,
    /// USB `vendor:product` id, matched exactly (e.g. `"0499:1506"`).
    pub usb_id: String,
    /// Last-resort class name for generic device lists (e.g. `"USB"`).
    pub generic_class: String,
    /// Name fragments identifying shared audio-server inputs, tried in order
    /// when every hardware device string fails to open.
    pub shared_servers: Vec<String>,
}

impl Default for TargetDevice {
    fn default() -> Self {
        Self {
            product: "THR5".into(),
            vendor: "Yamaha".into(),
            usb_id: "0499:1506".into(),
            generic_class: "USB".into(),
            shared_servers: vec!["pulse".into(), "pipewire".into(), "default".into()],
        }
    }
}

// ---------------------------------------------------------------------------
// FilterSettings
// ---------------------------------------------------------------------------

/// FIR stage applied to the downmixed signal before the transform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Whether the filter stage runs at all.
    pub enabled: bool,
    /// Number of taps for the designed low-pass.
    pub taps: usize,
    /// Cutoff of the designed low-pass in Hz.
    pub cutoff_hz: f32,
    /// Explicit coefficients; when present they replace the designed
    /// low-pass.  Coefficient 0 pairs with the newest sample.
    pub coefficients: Option<Vec<f32>>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            taps: 31,
            cutoff_hz: 5_000.0,
            coefficients: None,
        }
    }
}

// ---------------------------------------------------------------------------
// DisplaySettings
// ---------------------------------------------------------------------------

/// Terminal spectrum line settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Lower bound of the displayed band in Hz.
    pub freq_start_hz: f32,
    /// Upper bound of the displayed band in Hz (capped at Nyquist).
    pub freq_end_hz: f32,
    /// Number of glyph columns.  `None` means terminal width minus one.
    pub columns: Option<usize>,
    /// Redraw interval of the consumer loop, in milliseconds.
    pub refresh_ms: u64,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            freq_start_hz: 20.0,
            freq_end_hz: 20_000.0,
            columns: None,
            refresh_ms: 33,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use thr_spectrum::config::AppConfig;
///
/// // Load (returns Default when the file is missing)
/// let config = AppConfig::load().unwrap();
/// assert!(config.capture.frame_size > 0);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Capture stream parameters.
    pub capture: CaptureSettings,
    /// Hardware the resolver searches for.
    pub target: TargetDevice,
    /// Optional FIR stage.
    pub filter: FilterSettings,
    /// Terminal display settings.
    pub display: DisplaySettings,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
