//! Scripted [`AudioHost`] for tests.
//!
//! [`MockHost`] records every open attempt as `(target, channels)` and
//! succeeds only for the pairs it was told to accept.  The callback of the
//! stream that opened is kept so tests can push buffers through it with
//! [`MockHost::feed`].

use std::sync::{Arc, Mutex};

use super::host::{
    AudioError, AudioHost, CaptureStream, FrameCallback, InputDeviceInfo, OpenRequest,
    StreamFailure,
};

#[derive(Default)]
struct MockState {
    attempts: Vec<(String, u16)>,
    requests: Vec<OpenRequest>,
    callback: Option<FrameCallback>,
    started: usize,
    stopped: usize,
    closed: usize,
}

/// Audio host whose behaviour is fixed up front.  Clones share recorded
/// state, so a test can keep one clone while the capture thread owns another.
#[derive(Default, Clone)]
pub struct MockHost {
    devices: Vec<InputDeviceInfo>,
    accept: Vec<(String, u16)>,
    busy: Vec<String>,
    state: Arc<Mutex<MockState>>,
    failure: StreamFailure,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input device to the enumeration.
    pub fn with_device(mut self, name: &str, max_input_channels: u16) -> Self {
        let index = self.devices.len();
        self.devices.push(InputDeviceInfo {
            index,
            name: name.into(),
            max_input_channels,
            max_output_channels: 0,
            default_sample_rate: 44_100,
            low_latency: Some(std::time::Duration::from_millis(8)),
        });
        self
    }

    /// Let opens of `target` (its `Display` form) with `channels` succeed.
    pub fn accepting(mut self, target: &str, channels: u16) -> Self {
        self.accept.push((target.into(), channels));
        self
    }

    /// Make failed opens of `target` report "device or resource busy".
    pub fn busy(mut self, target: &str) -> Self {
        self.busy.push(target.into());
        self
    }

    pub fn devices(&self) -> &[InputDeviceInfo] {
        &self.devices
    }

    pub fn attempts(&self) -> Vec<(String, u16)> {
        self.state.lock().unwrap().attempts.clone()
    }

    pub fn requests(&self) -> Vec<OpenRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// `(started, stopped, closed)` counts across all streams.
    pub fn lifecycle(&self) -> (usize, usize, usize) {
        let state = self.state.lock().unwrap();
        (state.started, state.stopped, state.closed)
    }

    /// Make the open stream report that it died, as a backend does when the
    /// device disappears mid-capture.
    pub fn fail_stream(&self, reason: &str) {
        self.failure.set(reason);
    }

    /// Run the open stream's callback with `data`.  Returns `false` when no
    /// stream is open.
    pub fn feed(&self, data: &[f32]) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.callback.as_mut() {
            Some(callback) => {
                callback(data);
                true
            }
            None => false,
        }
    }
}

impl AudioHost for MockHost {
    fn input_devices(&self) -> Result<Vec<InputDeviceInfo>, AudioError> {
        Ok(self.devices.clone())
    }

    fn open_input(
        &self,
        request: &OpenRequest,
        callback: FrameCallback,
    ) -> Result<Box<dyn CaptureStream>, AudioError> {
        let target = request.target.to_string();
        let mut state = self.state.lock().unwrap();
        state.attempts.push((target.clone(), request.channels));
        state.requests.push(request.clone());

        if self.accept.contains(&(target.clone(), request.channels)) {
            state.callback = Some(callback);
            Ok(Box::new(MockStream {
                state: Arc::clone(&self.state),
                failure: self.failure.clone(),
            }))
        } else if self.busy.contains(&target) {
            Err(AudioError::open(request, "Device or resource busy"))
        } else {
            Err(AudioError::open(request, "Invalid argument"))
        }
    }
}

struct MockStream {
    state: Arc<Mutex<MockState>>,
    failure: StreamFailure,
}

impl CaptureStream for MockStream {
    fn start(&mut self) -> Result<(), AudioError> {
        self.state.lock().unwrap().started += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.state.lock().unwrap().stopped += 1;
        Ok(())
    }

    fn failure(&self) -> Option<String> {
        self.failure.get()
    }

    fn close(self: Box<Self>) {
        let mut state = self.state.lock().unwrap();
        state.closed += 1;
        state.callback = None;
    }
}
