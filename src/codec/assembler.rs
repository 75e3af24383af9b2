//! Frame reassembly for stream transports
//!
//! A wireless-serial link is a byte stream: the chunks it delivers are not
//! aligned to payload boundaries. The assembler buffers chunks and hands out
//! whole frames.

use bytes::{Buf, BytesMut};

use super::frame::{decode_frame, WireFormat};

/// Accumulates stream chunks into complete frames
pub struct FrameAssembler {
    format: WireFormat,
    samples_per_frame: usize,
    pending: BytesMut,
    /// Bytes kept before stale data is discarded
    limit: usize,
    discarded: u64,
}

impl FrameAssembler {
    /// Create an assembler for frames of `samples_per_frame` interleaved samples
    pub fn new(format: WireFormat, samples_per_frame: usize) -> Self {
        let frame_bytes = format.max_payload_len(samples_per_frame);
        let limit = frame_bytes * 64;
        Self {
            format,
            samples_per_frame,
            pending: BytesMut::with_capacity(frame_bytes * 4),
            limit,
            discarded: 0,
        }
    }

    /// Append a received chunk.
    ///
    /// When the backlog would pass the limit, whole frames are dropped from
    /// the front. A partial frame is never cut, so later frames stay aligned.
    pub fn push(&mut self, chunk: &[u8]) {
        // Room for one more full chunk behind a partial frame
        let limit = self.limit.max(chunk.len() + self.frame_bytes());
        let overflow = (self.pending.len() + chunk.len()).saturating_sub(limit);
        if overflow > 0 {
            let stale = self.stale_prefix(overflow);
            if stale > 0 {
                // Consumer fell far behind; drop the oldest frames rather than grow
                self.discarded += stale as u64;
                tracing::debug!("Frame assembler discarding {} stale bytes", stale);
                self.pending.advance(stale);
            }
        }
        self.pending.extend_from_slice(chunk);
    }

    /// Decode the next complete frame into `out`, if one is buffered
    pub fn next_frame(&mut self, out: &mut [i16]) -> bool {
        let Some(end) = self.frame_end() else {
            return false;
        };

        let payload = self.pending.split_to(end);
        decode_frame(self.format, &payload, out);
        true
    }

    /// Bytes waiting for the rest of their frame
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Bytes dropped because the backlog overflowed
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    fn frame_bytes(&self) -> usize {
        self.format.max_payload_len(self.samples_per_frame)
    }

    /// Length of the shortest run of whole frames at the front of the
    /// backlog covering `wanted` bytes, or of all whole frames if fewer
    fn stale_prefix(&self, wanted: usize) -> usize {
        match self.format {
            WireFormat::Binary => {
                let frame_bytes = self.frame_bytes();
                let whole = self.pending.len() / frame_bytes * frame_bytes;
                wanted.div_ceil(frame_bytes).saturating_mul(frame_bytes).min(whole)
            }
            WireFormat::Text => {
                let mut last = 0;
                let frame_ends = self
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, b)| **b == b'\n')
                    .skip(self.samples_per_frame - 1)
                    .step_by(self.samples_per_frame)
                    .map(|(i, _)| i + 1);
                for end in frame_ends {
                    last = end;
                    if end >= wanted {
                        break;
                    }
                }
                last
            }
        }
    }

    fn frame_end(&self) -> Option<usize> {
        match self.format {
            WireFormat::Binary => {
                let frame_bytes = self.frame_bytes();
                (self.pending.len() >= frame_bytes).then_some(frame_bytes)
            }
            // Every textual sample ends with a newline
            WireFormat::Text => self
                .pending
                .iter()
                .enumerate()
                .filter(|(_, b)| **b == b'\n')
                .nth(self.samples_per_frame - 1)
                .map(|(i, _)| i + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_frame;

    fn binary_payload(samples: &[i16]) -> Vec<u8> {
        let mut out = vec![0u8; samples.len() * 2];
        encode_frame(WireFormat::Binary, samples, &mut out);
        out
    }

    #[test]
    fn test_split_chunks_form_one_frame() {
        let mut assembler = FrameAssembler::new(WireFormat::Binary, 4);
        let payload = binary_payload(&[1, -1, 2, -2]);
        let mut out = [0i16; 4];

        assembler.push(&payload[..3]);
        assert!(!assembler.next_frame(&mut out));

        assembler.push(&payload[3..]);
        assert!(assembler.next_frame(&mut out));
        assert_eq!(out, [1, -1, 2, -2]);
        assert_eq!(assembler.pending_len(), 0);
    }

    #[test]
    fn test_coalesced_chunk_yields_several_frames() {
        let mut assembler = FrameAssembler::new(WireFormat::Binary, 2);
        let mut joined = binary_payload(&[10, 11]);
        joined.extend(binary_payload(&[20, 21]));
        joined.push(0x7f);

        assembler.push(&joined);

        let mut out = [0i16; 2];
        assert!(assembler.next_frame(&mut out));
        assert_eq!(out, [10, 11]);
        assert!(assembler.next_frame(&mut out));
        assert_eq!(out, [20, 21]);
        assert!(!assembler.next_frame(&mut out));
        assert_eq!(assembler.pending_len(), 1);
    }

    #[test]
    fn test_text_frames_split_on_newlines() {
        let mut assembler = FrameAssembler::new(WireFormat::Text, 2);
        let mut out = [0i16; 2];

        assembler.push(b"5\n-6\n7");
        assert!(assembler.next_frame(&mut out));
        assert_eq!(out, [5, -6]);
        assert!(!assembler.next_frame(&mut out));

        assembler.push(b"\n8\n");
        assert!(assembler.next_frame(&mut out));
        assert_eq!(out, [7, 8]);
    }

    #[test]
    fn test_backlog_is_bounded() {
        let mut assembler = FrameAssembler::new(WireFormat::Binary, 1);
        // limit is 64 frames of 2 bytes
        assembler.push(&[0u8; 127]);
        assembler.push(&[0u8; 2]);

        // One whole frame goes; the trailing odd byte stays
        assert_eq!(assembler.discarded(), 2);
        assert_eq!(assembler.pending_len(), 127);
    }

    #[test]
    fn test_overflow_keeps_frames_aligned() {
        let mut assembler = FrameAssembler::new(WireFormat::Binary, 2);
        let mut stream = Vec::new();
        for seq in 1..=200i16 {
            stream.extend(binary_payload(&[seq, -seq]));
        }

        // A partial frame, then a chunk that overflows the 256-byte backlog
        assembler.push(&stream[..3]);
        assembler.push(&stream[3..257]);
        assembler.push(&stream[257..]);
        assert!(assembler.discarded() > 0);
        assert_eq!(assembler.discarded() % 4, 0);

        let mut out = [0i16; 2];
        let mut decoded = 0;
        while assembler.next_frame(&mut out) {
            assert_eq!(out[1], -out[0], "misaligned frame {:?}", out);
            decoded += 1;
        }
        assert!(decoded > 0);
        assert_eq!(out, [200, -200]);
        assert_eq!(assembler.pending_len(), 0);
    }

    #[test]
    fn test_text_overflow_drops_whole_frames() {
        let mut assembler = FrameAssembler::new(WireFormat::Text, 2);
        let mut stream = Vec::new();
        for seq in 1..=400i16 {
            stream.extend(format!("{}\n{}\n", seq, -seq).into_bytes());
        }

        for chunk in stream.chunks(97) {
            assembler.push(chunk);
        }
        assert!(assembler.discarded() > 0);

        let mut out = [0i16; 2];
        while assembler.next_frame(&mut out) {
            assert_eq!(out[1], -out[0], "misaligned frame {:?}", out);
        }
        assert_eq!(out, [400, -400]);
    }

    #[test]
    fn test_chunk_larger_than_backlog_is_kept() {
        let mut assembler = FrameAssembler::new(WireFormat::Binary, 1);
        let stream: Vec<u8> = (1..=300i16).flat_map(|s| s.to_le_bytes()).collect();

        assembler.push(&stream[..1]);
        assembler.push(&stream[1..]);
        assert_eq!(assembler.discarded(), 0);

        let mut out = [0i16; 1];
        let mut expected = 1;
        while assembler.next_frame(&mut out) {
            assert_eq!(out[0], expected);
            expected += 1;
        }
        assert_eq!(expected, 301);
    }
}
