//! cpal-backed audio devices.
//!
//! cpal streams are not `Send`, so each device runs its stream on a dedicated
//! worker thread and hands data across thread boundaries through channels and
//! shared atomics. The worker owns the stream for its whole life; dropping the
//! stream on shutdown releases the hardware deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::device::{DeviceFactory, InputDevice, OutputSink, SinkHandle};
use crate::error::{Error, Result};

struct Worker {
    join: Option<JoinHandle<()>>,
    shutdown: std_mpsc::Sender<()>,
}

impl Worker {
    fn stop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Microphone capture from the default input device (mono f32).
pub struct CpalInput {
    sample_rate: u32,
    worker: Option<Worker>,
}

impl CpalInput {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            worker: None,
        }
    }
}

impl InputDevice for CpalInput {
    fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>> {
        if self.worker.is_some() {
            return Err(Error::Device("capture already started".to_string()));
        }

        let (blocks_tx, blocks_rx) = mpsc::channel::<Vec<f32>>(32);
        let (shutdown_tx, shutdown_rx) = std_mpsc::channel::<()>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<()>>();
        let sample_rate = self.sample_rate;

        let join = std::thread::spawn(move || {
            let stream = match open_input_stream(sample_rate, blocks_tx) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            // Hold the stream until shutdown; dropping it stops the callback.
            let _ = shutdown_rx.recv();
            drop(stream);
            debug!("audio capture stopped");
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(Worker {
                    join: Some(join),
                    shutdown: shutdown_tx,
                });
                debug!(sample_rate, "audio capture started");
                Ok(blocks_rx)
            }
            Ok(Err(e)) => {
                let _ = join.join();
                Err(e)
            }
            Err(_) => Err(Error::Device("capture worker died during setup".to_string())),
        }
    }

    fn stop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for CpalInput {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_input_stream(sample_rate: u32, blocks_tx: mpsc::Sender<Vec<f32>>) -> Result<Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Device("no input device available".to_string()))?;

    let supported = device
        .supported_input_configs()
        .map_err(|e| Error::Device(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        })
        .ok_or_else(|| Error::Device("no suitable input config found".to_string()))?;

    let config = supported.with_sample_rate(SampleRate(sample_rate)).config();

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Submission is non-blocking; if the encoder falls behind the
                // block is dropped rather than stalling the audio thread.
                if blocks_tx.try_send(data.to_vec()).is_err() {
                    warn!("capture block dropped: encoder not keeping up");
                }
            },
            |err| {
                error!(error = %err, "audio capture error");
            },
            None,
        )
        .map_err(|e| Error::Device(e.to_string()))?;

    stream.play().map_err(|e| Error::Device(e.to_string()))?;
    Ok(stream)
}

// ---------------------------------------------------------------------------
// Output sink
// ---------------------------------------------------------------------------

struct Segment {
    start_frame: u64,
    samples: Vec<f32>,
    handle: SinkHandle,
}

struct SinkShared {
    /// Frames rendered since the sink opened; the output clock.
    frames: AtomicU64,
    segments: Mutex<Vec<Segment>>,
}

/// Output timeline on the default output device.
///
/// The render callback keeps a global frame counter (the output clock) and
/// mixes every scheduled segment at its absolute frame offset, so back-to-back
/// buffers play gaplessly and cancellation silences a segment at the next
/// render quantum.
pub struct CpalSink {
    sample_rate: u32,
    shared: Arc<SinkShared>,
    worker: Mutex<Option<Worker>>,
}

impl CpalSink {
    pub fn open(sample_rate: u32) -> Result<Self> {
        let shared = Arc::new(SinkShared {
            frames: AtomicU64::new(0),
            segments: Mutex::new(Vec::new()),
        });

        let (shutdown_tx, shutdown_rx) = std_mpsc::channel::<()>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<()>>();
        let worker_shared = Arc::clone(&shared);

        let join = std::thread::spawn(move || {
            let stream = match open_output_stream(sample_rate, worker_shared) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = shutdown_rx.recv();
            drop(stream);
            debug!("audio output closed");
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                debug!(sample_rate, "audio output opened");
                Ok(Self {
                    sample_rate,
                    shared,
                    worker: Mutex::new(Some(Worker {
                        join: Some(join),
                        shutdown: shutdown_tx,
                    })),
                })
            }
            Ok(Err(e)) => {
                let _ = join.join();
                Err(e)
            }
            Err(_) => Err(Error::Device("output worker died during setup".to_string())),
        }
    }
}

impl OutputSink for CpalSink {
    fn now(&self) -> f64 {
        self.shared.frames.load(Ordering::SeqCst) as f64 / f64::from(self.sample_rate)
    }

    fn play(&self, samples: Vec<f32>, start: f64) -> SinkHandle {
        let handle = SinkHandle::new();
        let start_frame = (start * f64::from(self.sample_rate)).round() as u64;
        self.shared.segments.lock().unwrap().push(Segment {
            start_frame,
            samples,
            handle: handle.clone(),
        });
        handle
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        if let Some(mut worker) = self.worker.lock().unwrap().take() {
            worker.stop();
        }
    }
}

fn open_output_stream(sample_rate: u32, shared: Arc<SinkShared>) -> Result<Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Device("no output device available".to_string()))?;

    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Device(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        })
        .or_else(|| {
            // Fallback: mono content replicated onto a stereo device.
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == 2
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
        })
        .ok_or_else(|| Error::Device("no suitable output config found".to_string()))?;

    let config = supported.with_sample_rate(SampleRate(sample_rate)).config();
    let channels = config.channels as usize;

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let base = shared.frames.load(Ordering::SeqCst);
                let mut segments = shared.segments.lock().unwrap();

                for (i, frame) in data.chunks_mut(channels).enumerate() {
                    let t = base + i as u64;
                    let mut value = 0.0f32;
                    for segment in segments.iter() {
                        if segment.handle.is_cancelled() || t < segment.start_frame {
                            continue;
                        }
                        if let Some(sample) =
                            segment.samples.get((t - segment.start_frame) as usize)
                        {
                            value += sample;
                        }
                    }
                    for out in frame.iter_mut() {
                        *out = value;
                    }
                }

                let rendered = (data.len() / channels) as u64;
                let end = base + rendered;
                shared.frames.store(end, Ordering::SeqCst);

                segments.retain(|segment| {
                    let finished = segment.handle.is_cancelled()
                        || end >= segment.start_frame + segment.samples.len() as u64;
                    if finished {
                        segment.handle.mark_done();
                    }
                    !finished
                });
            },
            |err| {
                error!(error = %err, "audio output error");
            },
            None,
        )
        .map_err(|e| Error::Device(e.to_string()))?;

    stream.play().map_err(|e| Error::Device(e.to_string()))?;
    Ok(stream)
}

/// Production [`DeviceFactory`] backed by the system's default audio devices.
pub struct CpalDevices;

impl DeviceFactory for CpalDevices {
    fn input(&self, sample_rate: u32) -> Result<Box<dyn InputDevice>> {
        Ok(Box::new(CpalInput::new(sample_rate)))
    }

    fn output(&self, sample_rate: u32) -> Result<Arc<dyn OutputSink>> {
        Ok(Arc::new(CpalSink::open(sample_rate)?))
    }
}
