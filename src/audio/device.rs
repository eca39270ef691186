use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Microphone input source.
///
/// Implementations deliver mono f32 sample blocks (device-native block sizes)
/// over a channel until stopped. Stopping releases the underlying device; no
/// block is delivered after `stop` returns.
pub trait InputDevice: Send {
    /// Start capturing. Returns the channel the device writes sample blocks to.
    fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>>;

    /// Stop capturing and release the device. Idempotent.
    fn stop(&mut self);

    fn sample_rate(&self) -> u32;
}

/// Output playback timeline.
///
/// `now` is the current time in seconds on the sink's monotonic output clock
/// (zero when the sink was opened). `play` schedules a decoded buffer to begin
/// at an absolute time on that clock; overlapping buffers are mixed.
pub trait OutputSink: Send + Sync {
    fn now(&self) -> f64;

    /// Schedule `samples` to start playing at `start` seconds on the output
    /// clock. Returns a handle that can cancel the buffer mid-flight.
    fn play(&self, samples: Vec<f32>, start: f64) -> SinkHandle;

    fn sample_rate(&self) -> u32;
}

/// Handle to one scheduled buffer on an output sink.
///
/// Cancellation takes effect at the sink's next render quantum; natural
/// completion is flagged by the sink so the scheduler can prune its active set.
#[derive(Debug, Clone, Default)]
pub struct SinkHandle {
    cancelled: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
}

impl SinkHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop this buffer immediately.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// True once the buffer has fully played or was cancelled.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst) || self.is_cancelled()
    }

    pub(crate) fn mark_done(&self) {
        self.done.store(true, Ordering::SeqCst);
    }
}

/// Factory for the audio devices a session owns.
///
/// The production implementation is [`CpalDevices`](super::CpalDevices); tests
/// and offline demos use [`ManualDevices`] to run without hardware.
pub trait DeviceFactory: Send + Sync {
    fn input(&self, sample_rate: u32) -> Result<Box<dyn InputDevice>>;

    fn output(&self, sample_rate: u32) -> Result<Arc<dyn OutputSink>>;
}

// ---------------------------------------------------------------------------
// Manual devices (deterministic, no hardware) for tests and offline demos
// ---------------------------------------------------------------------------

/// Deterministic output sink with a manually advanced clock.
///
/// Records every scheduled buffer instead of playing it, so tests can assert
/// on start times, durations, and cancellation.
pub struct ManualSink {
    sample_rate: u32,
    clock: Mutex<f64>,
    scheduled: Mutex<Vec<ScheduledBuffer>>,
}

/// One buffer recorded by a [`ManualSink`].
#[derive(Debug, Clone)]
pub struct ScheduledBuffer {
    pub start: f64,
    pub samples: usize,
    pub handle: SinkHandle,
}

impl ManualSink {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            clock: Mutex::new(0.0),
            scheduled: Mutex::new(Vec::new()),
        }
    }

    /// Move the output clock to `seconds`.
    pub fn set_time(&self, seconds: f64) {
        *self.clock.lock().unwrap() = seconds;
    }

    /// Everything scheduled so far, in call order.
    pub fn scheduled(&self) -> Vec<ScheduledBuffer> {
        self.scheduled.lock().unwrap().clone()
    }

    /// Mark a scheduled buffer as naturally finished.
    pub fn finish(&self, index: usize) {
        self.scheduled.lock().unwrap()[index].handle.mark_done();
    }
}

impl OutputSink for ManualSink {
    fn now(&self) -> f64 {
        *self.clock.lock().unwrap()
    }

    fn play(&self, samples: Vec<f32>, start: f64) -> SinkHandle {
        let handle = SinkHandle::new();
        self.scheduled.lock().unwrap().push(ScheduledBuffer {
            start,
            samples: samples.len(),
            handle: handle.clone(),
        });
        handle
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Scripted input device: the test pushes sample blocks through a channel.
pub struct ManualInput {
    sample_rate: u32,
    stream: Arc<Mutex<Option<mpsc::Sender<Vec<f32>>>>>,
    receiver: Option<mpsc::Receiver<Vec<f32>>>,
}

impl InputDevice for ManualInput {
    fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>> {
        self.receiver
            .take()
            .ok_or_else(|| Error::Device("manual input already started".to_string()))
    }

    fn stop(&mut self) {
        // Dropping the sender closes the stream; the encoder drains and exits.
        self.stream.lock().unwrap().take();
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Hardware-free [`DeviceFactory`] for tests and offline demos.
///
/// Hands out [`ManualInput`]s fed through [`ManualDevices::push_samples`] and
/// a shared [`ManualSink`].
pub struct ManualDevices {
    sink: Arc<ManualSink>,
    stream: Arc<Mutex<Option<mpsc::Sender<Vec<f32>>>>>,
    fail_next_input: AtomicBool,
}

impl ManualDevices {
    pub fn new(playback_sample_rate: u32) -> Arc<Self> {
        Arc::new(Self {
            sink: Arc::new(ManualSink::new(playback_sample_rate)),
            stream: Arc::new(Mutex::new(None)),
            fail_next_input: AtomicBool::new(false),
        })
    }

    pub fn sink(&self) -> Arc<ManualSink> {
        Arc::clone(&self.sink)
    }

    /// Feed a block of microphone samples into the live input stream.
    ///
    /// Returns false if no input device is currently capturing.
    pub fn push_samples(&self, samples: Vec<f32>) -> bool {
        match self.stream.lock().unwrap().as_ref() {
            Some(tx) => tx.try_send(samples).is_ok(),
            None => false,
        }
    }

    /// Make the next `input()` call fail with a device error.
    pub fn fail_next_input(&self) {
        self.fail_next_input.store(true, Ordering::SeqCst);
    }
}

impl DeviceFactory for ManualDevices {
    fn input(&self, sample_rate: u32) -> Result<Box<dyn InputDevice>> {
        if self.fail_next_input.swap(false, Ordering::SeqCst) {
            return Err(Error::Device("no input device available".to_string()));
        }
        let (tx, rx) = mpsc::channel(32);
        *self.stream.lock().unwrap() = Some(tx);
        Ok(Box::new(ManualInput {
            sample_rate,
            stream: Arc::clone(&self.stream),
            receiver: Some(rx),
        }))
    }

    fn output(&self, _sample_rate: u32) -> Result<Arc<dyn OutputSink>> {
        Ok(Arc::clone(&self.sink) as Arc<dyn OutputSink>)
    }
}
