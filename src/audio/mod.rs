pub mod capture;
pub mod codec;
pub mod device;
pub mod hw;
pub mod playback;

pub use capture::{AudioChunk, CaptureEncoder, BLOCK_SAMPLES};
pub use device::{DeviceFactory, InputDevice, ManualDevices, ManualSink, OutputSink, SinkHandle};
pub use hw::{CpalDevices, CpalInput, CpalSink};
pub use playback::PlaybackScheduler;
