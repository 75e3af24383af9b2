//! PCM frame serialization
//!
//! One frame travels as one transport payload, with no header and no
//! checksum. Samples are written frame-major, channel-minor.

pub mod assembler;
pub mod frame;

pub use assembler::FrameAssembler;
pub use frame::{decode_frame, encode_frame, WireFormat, SAMPLE_SILENCE};
