//! Audio subsystem module

pub mod backend;
pub mod buffer;
pub mod capture;
pub mod device;
pub mod playback;

pub use backend::{AudioBackend, CallbackStatus, CpalBackend, FrameCallback, InputStream, OutputStream};
pub use buffer::FrameBuffer;
pub use capture::CpalInputStream;
pub use device::{list_devices, AudioDeviceInfo};
pub use playback::CpalOutputStream;
