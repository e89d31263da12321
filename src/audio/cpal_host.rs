//! Enumerated-device capture via `cpal`.
//!
//! [`CpalHost`] wraps the cpal host/device/stream lifecycle.  It lists every
//! input-capable device and opens [`DeviceTarget::Enumerated`] targets;
//! raw OS device strings are left to the ALSA backend.

use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::host::{
    AudioError, AudioHost, CaptureStream, DeviceTarget, FrameCallback, InputDeviceInfo,
    OpenRequest, StreamFailure,
};

// ---------------------------------------------------------------------------
// CpalStream
// ---------------------------------------------------------------------------

/// An open cpal input stream.
///
/// Dropping this value drops the `cpal::Stream`, which stops the hardware
/// stream and releases the callback.
pub struct CpalStream {
    stream: cpal::Stream,
    failure: StreamFailure,
}

impl CaptureStream for CpalStream {
    fn start(&mut self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::Start(e.to_string()))
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.stream
            .pause()
            .map_err(|e| AudioError::Stop(e.to_string()))
    }

    fn failure(&self) -> Option<String> {
        self.failure.get()
    }
}

// ---------------------------------------------------------------------------
// CpalHost
// ---------------------------------------------------------------------------

/// Device enumeration and stream opening on the platform default cpal host.
pub struct CpalHost {
    host: cpal::Host,
}

impl CpalHost {
    /// Use the platform default host (ALSA on Linux).
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    fn describe(index: usize, device: &cpal::Device) -> Option<InputDeviceInfo> {
        let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());

        let max_input_channels = match device.supported_input_configs() {
            Ok(configs) => configs.map(|c| c.channels()).max().unwrap_or(0),
            Err(e) => {
                log::debug!("skipping \"{name}\": cannot query input configs: {e}");
                0
            }
        };
        if max_input_channels == 0 {
            return None;
        }

        let max_output_channels = device
            .supported_output_configs()
            .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
            .unwrap_or(0);

        let default = device.default_input_config().ok();
        let default_sample_rate = default.as_ref().map_or(0, |c| c.sample_rate().0);
        let low_latency = default.as_ref().and_then(|c| match c.buffer_size() {
            cpal::SupportedBufferSize::Range { min, .. } if default_sample_rate > 0 => Some(
                Duration::from_secs_f64(f64::from(*min) / f64::from(default_sample_rate)),
            ),
            _ => None,
        });

        Some(InputDeviceInfo {
            index,
            name,
            max_input_channels,
            max_output_channels,
            default_sample_rate,
            low_latency,
        })
    }

    /// Find the device an enumerated target points at.  Enumeration order is
    /// not guaranteed to be stable, so a name mismatch at `index` falls back
    /// to a search by name.
    fn find_device(&self, index: usize, name: &str) -> Result<Option<cpal::Device>, AudioError> {
        let devices: Vec<cpal::Device> = self
            .host
            .input_devices()
            .map_err(|e| AudioError::Enumerate(e.to_string()))?
            .collect();

        let by_index = devices
            .get(index)
            .filter(|d| d.name().map(|n| n == name).unwrap_or(false))
            .cloned();
        if by_index.is_some() {
            return Ok(by_index);
        }

        Ok(devices
            .into_iter()
            .find(|d| d.name().map(|n| n == name).unwrap_or(false)))
    }
}

impl Default for CpalHost {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioHost for CpalHost {
    fn input_devices(&self) -> Result<Vec<InputDeviceInfo>, AudioError> {
        let devices = self
            .host
            .input_devices()
            .map_err(|e| AudioError::Enumerate(e.to_string()))?;

        Ok(devices
            .enumerate()
            .filter_map(|(index, device)| Self::describe(index, &device))
            .collect())
    }

    fn open_input(
        &self,
        request: &OpenRequest,
        mut callback: FrameCallback,
    ) -> Result<Box<dyn CaptureStream>, AudioError> {
        let (index, name) = match &request.target {
            DeviceTarget::Enumerated { index, name } => (*index, name.as_str()),
            other => return Err(AudioError::UnsupportedTarget(other.to_string())),
        };

        let device = self
            .find_device(index, name)?
            .ok_or_else(|| AudioError::open(request, "device is no longer present"))?;

        let frames = u32::try_from(request.frame_size)
            .map_err(|_| AudioError::open(request, "frame size out of range"))?;
        let config = cpal::StreamConfig {
            channels: request.channels,
            sample_rate: cpal::SampleRate(request.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(frames),
        };

        if let Some(latency) = request.latency {
            log::debug!(
                "cpal has no latency parameter; {:?} hint for {} is covered by the fixed buffer size",
                latency,
                request.target
            );
        }

        let target = request.target.to_string();
        let failure = StreamFailure::default();
        let error_failure = failure.clone();
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| callback(data),
                move |err: cpal::StreamError| {
                    log::error!("cpal stream error on {target}: {err}");
                    // backend-specific errors are transient xruns; a vanished
                    // device is not
                    if let cpal::StreamError::DeviceNotAvailable = err {
                        error_failure.set(err);
                    }
                },
                None, // no timeout
            )
            .map_err(|e| AudioError::open(request, e))?;

        Ok(Box::new(CpalStream { stream, failure }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
