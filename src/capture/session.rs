//! Capture session lifecycle.
//!
//! [`CaptureSession`] resolves the device, negotiates a stream and owns it
//! until teardown.  The pipeline (filter history, frame buffers, transform
//! plan) lives inside the stream's callback, so closing the stream frees it.
//! The callback never logs; the session's poll loop turns the counters in
//! [`CaptureStats`] into log lines and notices a stream that has died.
//!
//! [`CaptureHandle`] runs a session on its own thread: setup happens there,
//! the result is reported back once, and the thread then polls the stop flag
//! until told to shut down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use crate::audio::{AudioHost, CaptureStream, DeviceTarget};
use crate::device::{CardRegistry, DeviceResolver};

use super::config::CaptureConfig;
use super::error::CaptureError;
use super::handoff::SpectrumHandoff;
use super::negotiate::StreamNegotiator;
use super::pipeline::CapturePipeline;
use super::stats::{CaptureStats, StatsSnapshot};

/// What negotiation settled on.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub target: DeviceTarget,
    /// Channel count of the open stream.
    pub channels: u16,
    /// Open attempts that failed before the one that succeeded.
    pub failed_attempts: usize,
}

// ---------------------------------------------------------------------------
// CaptureSession
// ---------------------------------------------------------------------------

/// An open capture stream plus the configuration and stop flag that govern
/// it.
pub struct CaptureSession {
    config: CaptureConfig,
    info: SessionInfo,
    stream: Option<Box<dyn CaptureStream>>,
    running: bool,
    stop: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
}

impl CaptureSession {
    /// Resolve the target device and negotiate a stream feeding `handoff`.
    ///
    /// The stream is open but not started.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::DeviceNotFound`] when resolution fails.
    /// - [`CaptureError::StreamOpenFailed`] when every candidate fails.
    /// - [`CaptureError::AllocationFailure`] when the pipeline buffers
    ///   cannot be allocated.
    pub fn open(
        config: CaptureConfig,
        host: &dyn AudioHost,
        registry: &dyn CardRegistry,
        handoff: Arc<SpectrumHandoff>,
        stats: Arc<CaptureStats>,
        stop: Arc<AtomicBool>,
    ) -> Result<Self, CaptureError> {
        let resolution = DeviceResolver::new(&config.target, registry).resolve(host)?;
        log::debug!("resolved target as {resolution:?}");

        let settings = config.negotiation_settings();
        let negotiated = {
            let mut factory = CapturePipeline::factory(&config, handoff, Arc::clone(&stats));
            StreamNegotiator::new(host, &settings).negotiate(&resolution, &mut factory)?
        };

        let info = SessionInfo {
            target: negotiated.target,
            channels: negotiated.channels,
            failed_attempts: negotiated.failed_attempts.len(),
        };
        log::info!(
            "capturing from {} with {} channel(s) at {} Hz, {} frames per buffer",
            info.target,
            info.channels,
            config.sample_rate,
            config.frame_size
        );

        Ok(Self {
            config,
            info,
            stream: Some(negotiated.stream),
            running: false,
            stop,
            stats,
        })
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    /// Start delivering buffers.  Starting twice is a no-op.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.running {
            return Ok(());
        }
        if let Some(stream) = self.stream.as_mut() {
            stream.start()?;
            self.running = true;
        }
        Ok(())
    }

    /// Start if needed, then block until the stop flag is raised, checking it
    /// every poll interval.  Tears the stream down before returning.
    ///
    /// Each poll logs the overruns and skipped publishes counted since the
    /// previous one.
    ///
    /// # Errors
    ///
    /// [`CaptureError::StreamFailed`] when the stream stops delivering
    /// buffers on its own; the failure is also counted in [`CaptureStats`].
    pub fn run(&mut self) -> Result<(), CaptureError> {
        self.start()?;
        let mut reported = self.stats.snapshot();
        while !self.stop.load(Ordering::Acquire) {
            thread::sleep(self.config.poll_interval);
            reported = self.report_degradations(reported);

            let failure = self.stream.as_ref().and_then(|stream| stream.failure());
            if let Some(reason) = failure {
                self.stats.record_stream_failure();
                let err = CaptureError::StreamFailed {
                    target: self.info.target.to_string(),
                    reason,
                };
                log::error!("{err}");
                self.teardown();
                return Err(err);
            }
        }
        log::info!("stop requested, shutting down capture");
        self.teardown();
        Ok(())
    }

    fn report_degradations(&self, last: StatsSnapshot) -> StatsSnapshot {
        let now = self.stats.snapshot();
        let delta = now.since(&last);
        if delta.overruns > 0 {
            log::warn!(
                "{}",
                CaptureError::CallbackOverrun {
                    count: delta.overruns,
                    budget: self.config.buffer_period(),
                }
            );
        }
        if delta.skipped_publishes > 0 {
            log::debug!(
                "{} frame(s) not published while the reader held the handoff",
                delta.skipped_publishes
            );
        }
        now
    }

    /// Stop the stream if it is running, then close it.  Idempotent.
    pub fn teardown(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        if self.running {
            if let Err(e) = stream.stop() {
                log::warn!("{e}");
            }
            self.running = false;
        }
        stream.close();
        log::debug!("capture stream closed");
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

// ---------------------------------------------------------------------------
// CaptureHandle
// ---------------------------------------------------------------------------

/// Owner-side handle to a session running on a dedicated thread.
///
/// Dropping the handle raises the stop flag and joins the thread.
pub struct CaptureHandle {
    info: SessionInfo,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<(), CaptureError>>>,
}

impl CaptureHandle {
    /// Spawn the capture thread and wait for its setup result.
    ///
    /// The host is built on the capture thread because backend stream
    /// handles may not be sendable.
    ///
    /// # Errors
    ///
    /// Whatever [`CaptureSession::open`] or starting the stream returned, or
    /// [`CaptureError::ThreadSpawn`] / [`CaptureError::SetupAborted`] when
    /// the thread could not run setup at all.
    pub fn spawn<H, F>(
        config: CaptureConfig,
        make_host: F,
        registry: Box<dyn CardRegistry + Send>,
        handoff: Arc<SpectrumHandoff>,
        stats: Arc<CaptureStats>,
    ) -> Result<Self, CaptureError>
    where
        H: AudioHost,
        F: FnOnce() -> H + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let (setup_tx, setup_rx) = mpsc::sync_channel::<Result<SessionInfo, CaptureError>>(1);

        let thread_stop = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("capture".into())
            .spawn(move || {
                let host = make_host();
                let opened = CaptureSession::open(
                    config,
                    &host,
                    registry.as_ref(),
                    handoff,
                    stats,
                    thread_stop,
                );
                let mut session = match opened {
                    Ok(session) => session,
                    Err(e) => {
                        let _ = setup_tx.send(Err(e));
                        return Ok(());
                    }
                };
                if let Err(e) = session.start() {
                    let _ = setup_tx.send(Err(e));
                    return Ok(());
                }
                let _ = setup_tx.send(Ok(session.info().clone()));
                session.run()
            })?;

        match setup_rx.recv() {
            Ok(Ok(info)) => Ok(Self {
                info,
                stop,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(CaptureError::SetupAborted)
            }
        }
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    /// Raise the stop flag.  The capture thread notices within one poll
    /// interval.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop and wait for the capture thread to finish its teardown.
    pub fn join(mut self) -> Result<(), CaptureError> {
        self.stop();
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| CaptureError::ThreadPanicked)?,
            None => Ok(()),
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
