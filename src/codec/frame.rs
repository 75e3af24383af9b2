//! Frame encoding and decoding
//!
//! Two payload layouts are supported:
//!
//! - [`WireFormat::Binary`]: every sample as a little-endian `i16`.
//! - [`WireFormat::Text`]: every sample as decimal ASCII followed by `\n`,
//!   readable by peers that still speak the older textual layout.
//!
//! Decoding never fails. Whatever cannot be read becomes silence, since the
//! decoder runs on a transport thread that feeds real-time playback.

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// The sample value that represents silence
pub const SAMPLE_SILENCE: i16 = 0;

/// Widest textual sample: `-32768\n`
const TEXT_SAMPLE_WIDTH: usize = 7;

/// Payload layout of one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    #[default]
    Binary,
    Text,
}

impl WireFormat {
    /// Upper bound of the payload size for `samples` interleaved samples
    pub fn max_payload_len(&self, samples: usize) -> usize {
        match self {
            WireFormat::Binary => samples * std::mem::size_of::<i16>(),
            WireFormat::Text => samples * TEXT_SAMPLE_WIDTH,
        }
    }
}

/// Serialize `samples` into `out`, returning the number of bytes written.
///
/// Size `out` with [`WireFormat::max_payload_len`]; samples that do not fit
/// are left out.
pub fn encode_frame(format: WireFormat, samples: &[i16], out: &mut [u8]) -> usize {
    let capacity = out.len();

    match format {
        WireFormat::Binary => {
            let mut buf = &mut out[..];
            for &sample in samples {
                if buf.remaining_mut() < 2 {
                    break;
                }
                buf.put_i16_le(sample);
            }
            capacity - buf.remaining_mut()
        }
        WireFormat::Text => {
            let mut cursor = &mut out[..];
            for &sample in samples {
                // A partial write leaves a truncated token the decoder ignores
                if writeln!(cursor, "{}", sample).is_err() {
                    break;
                }
            }
            capacity - cursor.len()
        }
    }
}

/// Deserialize `payload` into `out`, returning how many samples were read.
///
/// Samples past the end of a short payload are silence. Extra bytes are
/// ignored.
pub fn decode_frame(format: WireFormat, payload: &[u8], out: &mut [i16]) -> usize {
    match format {
        WireFormat::Binary => {
            let mut buf = payload;
            let mut decoded = 0;
            for slot in out.iter_mut() {
                if buf.remaining() >= 2 {
                    *slot = buf.get_i16_le();
                    decoded += 1;
                } else {
                    *slot = SAMPLE_SILENCE;
                }
            }
            decoded
        }
        WireFormat::Text => {
            let mut tokens = payload
                .split(|b| b.is_ascii_whitespace())
                .filter(|token| !token.is_empty());
            let mut decoded = 0;
            for slot in out.iter_mut() {
                *slot = match tokens.next() {
                    Some(token) => {
                        decoded += 1;
                        parse_sample(token)
                    }
                    None => SAMPLE_SILENCE,
                };
            }
            decoded
        }
    }
}

fn parse_sample(token: &[u8]) -> i16 {
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(SAMPLE_SILENCE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn stereo_frame() -> Vec<i16> {
        // 16 frames x 2 channels with distinguishable values
        (0..32).map(|i| (i * 1000 - 16000) as i16).collect()
    }

    #[test]
    fn test_binary_layout_is_little_endian_frame_major() {
        let samples = [0x0102i16, -2, i16::MAX, i16::MIN];
        let mut out = [0u8; 8];

        let written = encode_frame(WireFormat::Binary, &samples, &mut out);

        assert_eq!(written, 8);
        assert_eq!(out, [0x02, 0x01, 0xfe, 0xff, 0xff, 0x7f, 0x00, 0x80]);
    }

    #[test]
    fn test_binary_round_trip() {
        let samples = stereo_frame();
        let mut payload = vec![0u8; WireFormat::Binary.max_payload_len(samples.len())];
        let written = encode_frame(WireFormat::Binary, &samples, &mut payload);

        let mut decoded = vec![1i16; samples.len()];
        let count = decode_frame(WireFormat::Binary, &payload[..written], &mut decoded);

        assert_eq!(count, samples.len());
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_text_round_trip_and_layout() {
        let samples = [12i16, -32768, 0];
        let mut payload = [0u8; 21];
        let written = encode_frame(WireFormat::Text, &samples, &mut payload);
        assert_eq!(&payload[..written], b"12\n-32768\n0\n");

        let mut decoded = [7i16; 3];
        decode_frame(WireFormat::Text, &payload[..written], &mut decoded);
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_short_payload_pads_with_silence() {
        let mut decoded = [9i16; 4];
        // One full sample plus a dangling byte
        let count = decode_frame(WireFormat::Binary, &[0x10, 0x00, 0x33], &mut decoded);

        assert_eq!(count, 1);
        assert_eq!(decoded, [0x10, 0, 0, 0]);
    }

    #[test]
    fn test_long_payload_is_truncated() {
        let mut decoded = [0i16; 2];
        let count = decode_frame(WireFormat::Binary, &[1, 0, 2, 0, 3, 0], &mut decoded);

        assert_eq!(count, 2);
        assert_eq!(decoded, [1, 2]);
    }

    #[test]
    fn test_malformed_text_degrades_to_silence() {
        let mut decoded = [5i16; 4];
        decode_frame(WireFormat::Text, b"100 abc\n99999 \xff\xfe", &mut decoded);

        assert_eq!(decoded, [100, 0, 0, 0]);
    }

    #[test]
    fn test_encode_stops_at_capacity() {
        let samples = [1i16, 2, 3];
        let mut out = [0u8; 5];
        assert_eq!(encode_frame(WireFormat::Binary, &samples, &mut out), 4);
    }

    proptest! {
        #[test]
        fn prop_frame_fidelity(samples in proptest::collection::vec(any::<i16>(), 1..256),
                               text in any::<bool>()) {
            let format = if text { WireFormat::Text } else { WireFormat::Binary };
            let mut payload = vec![0u8; format.max_payload_len(samples.len())];
            let written = encode_frame(format, &samples, &mut payload);

            let mut decoded = vec![0i16; samples.len()];
            let count = decode_frame(format, &payload[..written], &mut decoded);

            prop_assert_eq!(count, samples.len());
            prop_assert_eq!(decoded, samples);
        }
    }
}
