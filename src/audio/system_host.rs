//! The production [`AudioHost`]: cpal for enumerated devices, ALSA for raw
//! device strings (Linux only).

use super::cpal_host::CpalHost;
use super::host::{
    AudioError, AudioHost, CaptureStream, DeviceTarget, FrameCallback, InputDeviceInfo,
    OpenRequest,
};

#[cfg(target_os = "linux")]
use super::alsa_host::AlsaHost;

/// Routes each open request to the backend that understands its target.
pub struct SystemHost {
    cpal: CpalHost,
    #[cfg(target_os = "linux")]
    alsa: AlsaHost,
}

impl SystemHost {
    pub fn new(busy_retries: u32) -> Self {
        #[cfg(not(target_os = "linux"))]
        let _ = busy_retries;

        Self {
            cpal: CpalHost::new(),
            #[cfg(target_os = "linux")]
            alsa: AlsaHost::new(busy_retries),
        }
    }
}

impl AudioHost for SystemHost {
    fn input_devices(&self) -> Result<Vec<InputDeviceInfo>, AudioError> {
        self.cpal.input_devices()
    }

    fn open_input(
        &self,
        request: &OpenRequest,
        callback: FrameCallback,
    ) -> Result<Box<dyn CaptureStream>, AudioError> {
        match &request.target {
            DeviceTarget::Enumerated { .. } => self.cpal.open_input(request, callback),
            #[cfg(target_os = "linux")]
            DeviceTarget::DeviceString(_) => self.alsa.open_input(request, callback),
            #[cfg(not(target_os = "linux"))]
            DeviceTarget::DeviceString(s) => Err(AudioError::UnsupportedTarget(s.clone())),
        }
    }
}
