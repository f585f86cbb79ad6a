//! Encode pipeline
//!
//! Takes fixed-size PCM frames from the application and buffers encoded
//! units, stamped with their reference-clock position, for the network side.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::audio::format::{encoded_frame_size, frame_size, samples_to_duration, FrameDuration};
use crate::audio::pool::{FramePool, PooledFrame};
use crate::codec::FrameEncoder;
use crate::config::TranscodeConfig;
use crate::constants::MAX_ENCODED_FRAME_SIZE;
use crate::error::TranscodeError;
use crate::transcode::frame::EncodedFrame;
use crate::transcode::ring::{FrameRing, Publisher, RingState};

struct EncodeState<E> {
    codec: E,
    /// Encoder output before it is copied into a right-sized payload
    scratch: Vec<u8>,
    sequence: u64,
    encoded_samples_written: u64,
    encoded_samples_read: u64,
    pcm_samples_written: u64,
    pcm_samples_read: u64,
    frames_read: u64,
    bytes_produced: u64,
}

/// Encode pipeline statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeStats {
    pub frames_encoded: u64,
    pub frames_read: u64,
    pub bytes_produced: u64,
    pub encoded_samples_written: u64,
    pub encoded_samples_read: u64,
    pub pcm_samples_written: u64,
    pub pcm_samples_read: u64,
    pub buffered: usize,
    pub max_buffered: usize,
}

/// Bounded encoder between a PCM writer and a network reader
pub struct EncodePipeline<E> {
    ring: FrameRing<EncodedFrame, EncodeState<E>>,
    pool: Arc<FramePool>,
    sample_rate: u32,
    frame_duration: FrameDuration,
    frame_size: usize,
    encoded_frame_size: u64,
}

impl<E: FrameEncoder> EncodePipeline<E> {
    pub fn new(config: &TranscodeConfig, codec: E) -> Result<Self, TranscodeError> {
        let pool = FramePool::of(config.sample_rate, config.frame_duration)?;
        Self::with_pool(config, codec, pool)
    }

    /// Create a pipeline whose `alloc` hands out frames from `pool`
    pub fn with_pool(
        config: &TranscodeConfig,
        codec: E,
        pool: Arc<FramePool>,
    ) -> Result<Self, TranscodeError> {
        let frame_size = frame_size(config.sample_rate, config.frame_duration)?;
        if pool.frame_size() != frame_size {
            return Err(TranscodeError::PoolMismatch {
                expected: frame_size,
                actual: pool.frame_size(),
            });
        }

        let state = EncodeState {
            codec,
            scratch: vec![0; MAX_ENCODED_FRAME_SIZE],
            sequence: 0,
            encoded_samples_written: 0,
            encoded_samples_read: 0,
            pcm_samples_written: 0,
            pcm_samples_read: 0,
            frames_read: 0,
            bytes_produced: 0,
        };

        debug!(
            sample_rate = config.sample_rate,
            ptime = %config.frame_duration,
            max_frames = config.max_frames,
            "encode pipeline created"
        );

        Ok(Self {
            ring: FrameRing::new(config.max_frames, state),
            pool,
            sample_rate: config.sample_rate,
            frame_duration: config.frame_duration,
            frame_size,
            encoded_frame_size: encoded_frame_size(config.frame_duration),
        })
    }

    /// Encode a frame without blocking
    pub fn write(&self, pcm: &[i16]) -> Result<(), TranscodeError> {
        self.check_frame_size(pcm)?;
        self.ring
            .try_write_with(|state, out| self.encode_frame(state, out, pcm))
    }

    /// Encode a frame, waiting for the reader when the ring is full
    pub fn write_blocking(&self, pcm: &[i16]) -> Result<(), TranscodeError> {
        self.check_frame_size(pcm)?;
        self.ring
            .write_blocking_with(|state, out| self.encode_frame(state, out, pcm))
    }

    fn check_frame_size(&self, pcm: &[i16]) -> Result<(), TranscodeError> {
        if pcm.len() != self.frame_size {
            return Err(TranscodeError::WrongFrameSize {
                expected: self.frame_size,
                actual: pcm.len(),
            });
        }
        Ok(())
    }

    fn encode_frame(
        &self,
        state: &mut EncodeState<E>,
        out: &mut Publisher<'_, EncodedFrame>,
        pcm: &[i16],
    ) -> Result<(), TranscodeError> {
        let len = state.codec.encode(pcm, &mut state.scratch)?;
        let payload = Bytes::copy_from_slice(&state.scratch[..len]);

        out.push(EncodedFrame {
            sequence: state.sequence,
            position: state.encoded_samples_written,
            samples: self.encoded_frame_size as u16,
            payload,
        })?;
        trace!(
            sequence = state.sequence,
            position = state.encoded_samples_written,
            bytes = len,
            "encoded frame"
        );

        state.sequence += 1;
        state.encoded_samples_written += self.encoded_frame_size;
        state.pcm_samples_written += pcm.len() as u64;
        state.bytes_produced += len as u64;
        Ok(())
    }

    /// Read the next encoded unit
    pub fn read_frame(&self) -> Result<EncodedFrame, TranscodeError> {
        let frame_size = self.frame_size as u64;
        self.ring
            .read_blocking_with(|state, frame| {
                state.frames_read += 1;
                state.encoded_samples_read += frame.samples as u64;
                state.pcm_samples_read += frame_size;
            })
            .map(|(frame, ())| frame)
    }

    /// Signal that no more PCM frames will be written
    pub fn finalize(&self) -> Result<(), TranscodeError> {
        self.ring.finalize()
    }

    /// Close the pipeline, dropping every buffered unit
    pub fn close(&self) -> Result<(), TranscodeError> {
        self.ring.close_with(|state| state.scratch = Vec::new())
    }

    /// Wake a writer blocked on a full ring. Returns whether one was waiting.
    pub fn unblock_writer(&self) -> bool {
        self.ring.unblock_writer()
    }

    /// Stream time of the units read so far
    pub fn elapsed(&self) -> Duration {
        let samples = self.ring.inspect(|state| state.pcm_samples_read);
        samples_to_duration(samples, self.sample_rate)
    }

    /// Borrow a PCM frame of the right size from the pipeline's pool
    pub fn alloc(&self) -> PooledFrame {
        self.pool.acquire()
    }

    pub fn release(&self, frame: PooledFrame) {
        self.pool.release(frame);
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// PCM samples per frame
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Reference-clock samples per frame
    pub fn encoded_frame_size(&self) -> u64 {
        self.encoded_frame_size
    }

    pub fn ptime(&self) -> Duration {
        self.frame_duration.as_duration()
    }

    pub fn state(&self) -> RingState {
        self.ring.state()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn stats(&self) -> EncodeStats {
        let mut stats = self.ring.inspect(|state| EncodeStats {
            frames_encoded: state.sequence,
            frames_read: state.frames_read,
            bytes_produced: state.bytes_produced,
            encoded_samples_written: state.encoded_samples_written,
            encoded_samples_read: state.encoded_samples_read,
            pcm_samples_written: state.pcm_samples_written,
            pcm_samples_read: state.pcm_samples_read,
            ..Default::default()
        });
        stats.buffered = self.ring.len();
        stats.max_buffered = self.ring.max_buffered();
        stats
    }
}

#[cfg(feature = "opus-codec")]
impl EncodePipeline<crate::codec::OpusEncoder> {
    /// Create a pipeline backed by an Opus encoder configured from `config.opus`
    pub fn opus(config: &TranscodeConfig) -> Result<Self, TranscodeError> {
        let codec =
            crate::codec::OpusEncoder::new(config.sample_rate, config.frame_duration, &config.opus)?;
        Self::new(config, codec)
    }
}
