//! Encoded frame carried between the pipelines and the network side

use bytes::Bytes;

/// One encoded audio unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Frame sequence number, assigned by the encode pipeline
    pub sequence: u64,
    /// Granule position: samples at the 48 kHz reference clock preceding this frame
    pub position: u64,
    /// Number of 48 kHz samples in this frame
    pub samples: u16,
    /// Encoded payload
    pub payload: Bytes,
}

impl EncodedFrame {
    pub fn new(position: u64, samples: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence: 0,
            position,
            samples,
            payload: payload.into(),
        }
    }

    /// Position of the frame that follows this one
    pub fn end_position(&self) -> u64 {
        self.position + self.samples as u64
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
