//! Opus decoder adapter
//!
//! Mono 16-bit decoding with in-band FEC recovery of the previous frame.

use opus::{Channels, Decoder};

use crate::audio::format::{frame_size, FrameDuration};
use crate::codec::FrameDecoder;
use crate::error::CodecError;

/// Opus decoder wrapper
pub struct OpusDecoder {
    decoder: Decoder,
    sample_rate: u32,
    frame_size: usize,
    /// Frames decoded
    frames_decoded: u64,
    /// Frames rebuilt from FEC data
    frames_recovered: u64,
    /// Total samples produced
    samples_produced: u64,
}

impl OpusDecoder {
    /// Create a new mono Opus decoder
    pub fn new(sample_rate: u32, duration: FrameDuration) -> Result<Self, CodecError> {
        let frame_size =
            frame_size(sample_rate, duration).map_err(|e| CodecError::DecoderInit(e.to_string()))?;

        let decoder = Decoder::new(sample_rate, Channels::Mono)
            .map_err(|e| CodecError::DecoderInit(e.to_string()))?;

        Ok(Self {
            decoder,
            sample_rate,
            frame_size,
            frames_decoded: 0,
            frames_recovered: 0,
            samples_produced: 0,
        })
    }

    /// Reset decoder state
    pub fn reset(&mut self) -> Result<(), CodecError> {
        self.decoder
            .reset_state()
            .map_err(|e| CodecError::DecoderInit(e.to_string()))
    }

    /// Get sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get frame size in samples
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Get statistics
    pub fn stats(&self) -> DecoderStats {
        DecoderStats {
            frames_decoded: self.frames_decoded,
            frames_recovered: self.frames_recovered,
            samples_produced: self.samples_produced,
        }
    }
}

impl FrameDecoder for OpusDecoder {
    fn decode(&mut self, payload: &[u8], pcm: &mut [i16]) -> Result<usize, CodecError> {
        let samples = self
            .decoder
            .decode(payload, pcm, false)
            .map_err(|e| CodecError::DecodingFailed(e.to_string()))?;

        self.frames_decoded += 1;
        self.samples_produced += samples as u64;
        Ok(samples)
    }

    fn decode_fec(&mut self, payload: &[u8], pcm: &mut [i16]) -> Result<usize, CodecError> {
        if pcm.len() != self.frame_size * 2 {
            return Err(CodecError::InvalidFrameSize(pcm.len()));
        }
        let (lost, current) = pcm.split_at_mut(self.frame_size);

        let recovered = self
            .decoder
            .decode(payload, lost, true)
            .map_err(|e| CodecError::DecodingFailed(e.to_string()))?;
        let decoded = self
            .decoder
            .decode(payload, current, false)
            .map_err(|e| CodecError::DecodingFailed(e.to_string()))?;

        self.frames_recovered += 1;
        self.frames_decoded += 1;
        self.samples_produced += (recovered + decoded) as u64;
        Ok(recovered + decoded)
    }
}

/// Decoder statistics
#[derive(Debug, Clone)]
pub struct DecoderStats {
    pub frames_decoded: u64,
    pub frames_recovered: u64,
    pub samples_produced: u64,
}
