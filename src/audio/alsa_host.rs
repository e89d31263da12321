//! ALSA device-string capture.
//!
//! cpal only opens devices from its own enumeration, so the card-index
//! templates (`plughw:K,0`, `hw:K,0`, `dsnoop:K,0`, …) go straight to ALSA.
//! The PCM is opened and its hardware parameters are fixed in
//! [`AlsaHost::open_input`], which is where an unusable configuration is
//! rejected.  [`AlsaStream::start`] moves the PCM onto a dedicated reader
//! thread that hands each period to the frame callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use alsa::pcm::{Access, Format, Frames, HwParams, PCM};
use alsa::{Direction, ValueOr};

use super::host::{
    AudioError, AudioHost, CaptureStream, DeviceTarget, FrameCallback, InputDeviceInfo,
    OpenRequest, StreamFailure,
};

const EBUSY: i32 = 16;
/// Pause between open attempts on a busy device.
const BUSY_RETRY_DELAY: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// AlsaHost
// ---------------------------------------------------------------------------

/// Opens raw ALSA device strings for capture.
#[derive(Debug, Clone)]
pub struct AlsaHost {
    busy_retries: u32,
}

impl AlsaHost {
    /// `busy_retries` extra opens are attempted while the device reports
    /// `EBUSY` before the open counts as failed.
    pub fn new(busy_retries: u32) -> Self {
        Self { busy_retries }
    }

    fn open_pcm(&self, device: &str, request: &OpenRequest) -> Result<PCM, AudioError> {
        let mut retries = self.busy_retries;
        loop {
            match PCM::new(device, Direction::Capture, false) {
                Ok(pcm) => return Ok(pcm),
                Err(e) if e.errno().abs() == EBUSY && retries > 0 => {
                    retries -= 1;
                    thread::sleep(BUSY_RETRY_DELAY);
                }
                Err(e) => {
                    let errno_busy = e.errno().abs() == EBUSY;
                    let mut err = AudioError::open(request, e);
                    if let AudioError::Open { busy, .. } = &mut err {
                        *busy |= errno_busy;
                    }
                    return Err(err);
                }
            }
        }
    }

    fn configure(pcm: &PCM, request: &OpenRequest) -> alsa::Result<Frames> {
        let hwp = HwParams::any(pcm)?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(Format::FloatLE)?;
        hwp.set_channels(u32::from(request.channels))?;
        hwp.set_rate(request.sample_rate, ValueOr::Nearest)?;

        let period = hwp.set_period_size_near(request.frame_size as Frames, ValueOr::Nearest)?;
        let latency_frames = request
            .latency
            .map(|l| (l.as_secs_f64() * f64::from(request.sample_rate)) as Frames)
            .unwrap_or(0);
        hwp.set_buffer_size_near(latency_frames.max(period * 2))?;
        pcm.hw_params(&hwp)?;

        let current = pcm.hw_params_current()?;
        current.get_period_size()
    }
}

impl AudioHost for AlsaHost {
    /// ALSA device strings are addressed by template, not by enumeration.
    fn input_devices(&self) -> Result<Vec<InputDeviceInfo>, AudioError> {
        Ok(Vec::new())
    }

    fn open_input(
        &self,
        request: &OpenRequest,
        callback: FrameCallback,
    ) -> Result<Box<dyn CaptureStream>, AudioError> {
        let device = match &request.target {
            DeviceTarget::DeviceString(device) => device.as_str(),
            other => return Err(AudioError::UnsupportedTarget(other.to_string())),
        };

        let pcm = self.open_pcm(device, request)?;
        let period = Self::configure(&pcm, request).map_err(|e| AudioError::open(request, e))?;

        log::info!(
            "ALSA capture: device={}, rate={}, channels={}, period_size={}",
            device,
            request.sample_rate,
            request.channels,
            period,
        );

        Ok(Box::new(AlsaStream {
            device: device.to_string(),
            channels: usize::from(request.channels),
            period: usize::try_from(period).unwrap_or(request.frame_size).max(1),
            idle: Some((pcm, callback)),
            running: Arc::new(AtomicBool::new(false)),
            failure: StreamFailure::default(),
            reader: None,
        }))
    }
}

// ---------------------------------------------------------------------------
// AlsaStream
// ---------------------------------------------------------------------------

/// An open ALSA capture PCM plus the callback it feeds.
///
/// While stopped the PCM and callback sit in `idle`; while running they are
/// owned by the reader thread and come back when it is joined.
pub struct AlsaStream {
    device: String,
    channels: usize,
    period: usize,
    idle: Option<(PCM, FrameCallback)>,
    running: Arc<AtomicBool>,
    failure: StreamFailure,
    reader: Option<JoinHandle<(PCM, FrameCallback)>>,
}

impl CaptureStream for AlsaStream {
    fn start(&mut self) -> Result<(), AudioError> {
        let Some((pcm, callback)) = self.idle.take() else {
            return Ok(()); // already running
        };

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let failure = self.failure.clone();
        let channels = self.channels;
        let period = self.period;
        let device = self.device.clone();

        let reader = thread::Builder::new()
            .name("alsa-capture".into())
            .spawn(move || {
                read_loop(pcm, callback, channels, period, &device, &running, &failure)
            })
            .map_err(|e| AudioError::Start(e.to_string()))?;

        self.reader = Some(reader);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::SeqCst);
        let Some(reader) = self.reader.take() else {
            return Ok(());
        };
        let (pcm, callback) = reader
            .join()
            .map_err(|_| AudioError::Stop(format!("reader thread for {} panicked", self.device)))?;
        self.idle = Some((pcm, callback));
        Ok(())
    }

    fn failure(&self) -> Option<String> {
        self.failure.get()
    }

    fn close(mut self: Box<Self>) {
        if let Err(e) = self.stop() {
            log::warn!("{e}");
        }
        log::debug!("ALSA capture on {} closed", self.device);
    }
}

impl Drop for AlsaStream {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

/// Reader thread body: one `readi` per period until `running` clears.
///
/// Overruns are logged and recovered with `prepare`; the callback never
/// sees an error.  When recovery fails the loop ends and the reason is left
/// in `failure` for the session to pick up.
fn read_loop(
    pcm: PCM,
    mut callback: FrameCallback,
    channels: usize,
    period: usize,
    device: &str,
    running: &AtomicBool,
    failure: &StreamFailure,
) -> (PCM, FrameCallback) {
    let mut read_buf = vec![0.0_f32; period * channels];

    match pcm.io_f32() {
        Ok(io) => {
            while running.load(Ordering::Relaxed) {
                match io.readi(&mut read_buf) {
                    Ok(frames) => callback(&read_buf[..frames * channels]),
                    Err(e) => {
                        log::warn!("ALSA capture error on {device}: {e}, recovering...");
                        if let Err(e2) = pcm.prepare() {
                            log::error!("failed to recover ALSA capture on {device}: {e2}");
                            failure.set(format_args!("{e}; recovery failed: {e2}"));
                            break;
                        }
                    }
                }
            }
        }
        Err(e) => {
            log::error!("ALSA capture on {device}: no f32 I/O: {e}");
            failure.set(format_args!("no f32 I/O: {e}"));
        }
    }

    (pcm, callback)
}
