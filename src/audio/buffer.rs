//! Fixed-size frame accumulation
//!
//! Audio drivers hand over whatever block size suits them. [`FrameBuffer`]
//! regroups those samples into frames of exactly the configured length,
//! without allocating after construction.

use crate::codec::SAMPLE_SILENCE;

/// Collects interleaved samples into fixed-size frames
pub struct FrameBuffer {
    samples: Box<[i16]>,
    filled: usize,
}

impl FrameBuffer {
    /// Create a buffer for frames of `samples_per_frame` interleaved samples
    pub fn new(samples_per_frame: usize) -> Self {
        Self {
            samples: vec![SAMPLE_SILENCE; samples_per_frame].into_boxed_slice(),
            filled: 0,
        }
    }

    /// Append one sample. Returns the completed frame when this sample
    /// fills it; the buffer then starts over.
    pub fn push(&mut self, sample: i16) -> Option<&[i16]> {
        self.samples[self.filled] = sample;
        self.filled += 1;

        if self.filled == self.samples.len() {
            self.filled = 0;
            Some(&self.samples)
        } else {
            None
        }
    }

    /// Samples in one frame
    pub fn frame_len(&self) -> usize {
        self.samples.len()
    }

    /// Samples waiting for the rest of their frame
    pub fn pending(&self) -> usize {
        self.filled
    }

    /// Drop a partially filled frame
    pub fn clear(&mut self) {
        self.filled = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_complete_at_exact_length() {
        let mut buffer = FrameBuffer::new(4);
        let mut frames = Vec::new();

        for sample in 0..10i16 {
            if let Some(frame) = buffer.push(sample) {
                frames.push(frame.to_vec());
            }
        }

        assert_eq!(frames, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
        assert_eq!(buffer.pending(), 2);

        buffer.clear();
        assert_eq!(buffer.pending(), 0);
        assert_eq!(buffer.frame_len(), 4);
    }
}
