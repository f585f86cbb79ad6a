//! Decode pipeline
//!
//! Turns encoded units from the network into fixed-size PCM frames for the
//! application. Loss is detected from the gap between a unit's position and
//! the number of reference-clock samples written so far. With FEC enabled the
//! frame just before the gap's end is rebuilt from the redundancy carried by
//! the arriving unit; anything older is skipped and shows up to the reader as
//! a jump in the frame position.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::audio::format::{encoded_frame_size, frame_size, samples_to_duration, FrameDuration};
use crate::audio::pool::{FramePool, PooledFrame};
use crate::codec::FrameDecoder;
use crate::config::TranscodeConfig;
use crate::error::TranscodeError;
use crate::transcode::frame::EncodedFrame;
use crate::transcode::ring::{FrameRing, Publisher, RingState};

struct DecodedSlot {
    frame: PooledFrame,
    /// Sample offset of the frame in the decoded stream, skipped frames included
    position: u64,
}

struct DecodeState<D> {
    codec: D,
    /// Two frames, filled by FEC decoding
    scratch: Vec<i16>,
    encoded_samples_written: u64,
    encoded_samples_read: u64,
    pcm_samples_written: u64,
    pcm_samples_read: u64,
    frames_read: u64,
    frames_decoded: u64,
    frames_recovered: u64,
    frames_lost: u64,
}

/// Decode pipeline statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub frames_decoded: u64,
    pub frames_recovered: u64,
    pub frames_lost: u64,
    pub frames_read: u64,
    pub encoded_samples_written: u64,
    pub encoded_samples_read: u64,
    pub pcm_samples_written: u64,
    pub pcm_samples_read: u64,
    pub buffered: usize,
    pub max_buffered: usize,
}

/// Bounded decoder between a network writer and a PCM reader
pub struct DecodePipeline<D> {
    ring: FrameRing<DecodedSlot, DecodeState<D>>,
    pool: Arc<FramePool>,
    sample_rate: u32,
    frame_duration: FrameDuration,
    frame_size: usize,
    encoded_frame_size: u64,
    fec: bool,
}

impl<D: FrameDecoder> DecodePipeline<D> {
    /// Create a pipeline drawing frames from the shared pool for its format
    pub fn new(config: &TranscodeConfig, codec: D) -> Result<Self, TranscodeError> {
        let pool = FramePool::of(config.sample_rate, config.frame_duration)?;
        Self::with_pool(config, codec, pool)
    }

    /// Create a pipeline drawing frames from `pool`
    pub fn with_pool(
        config: &TranscodeConfig,
        codec: D,
        pool: Arc<FramePool>,
    ) -> Result<Self, TranscodeError> {
        let frame_size = frame_size(config.sample_rate, config.frame_duration)?;
        if pool.frame_size() != frame_size {
            return Err(TranscodeError::PoolMismatch {
                expected: frame_size,
                actual: pool.frame_size(),
            });
        }

        let state = DecodeState {
            codec,
            scratch: vec![0; frame_size * 2],
            encoded_samples_written: 0,
            encoded_samples_read: 0,
            pcm_samples_written: 0,
            pcm_samples_read: 0,
            frames_read: 0,
            frames_decoded: 0,
            frames_recovered: 0,
            frames_lost: 0,
        };

        debug!(
            sample_rate = config.sample_rate,
            ptime = %config.frame_duration,
            max_frames = config.max_frames,
            fec = config.fec,
            "decode pipeline created"
        );

        Ok(Self {
            ring: FrameRing::new(config.max_frames, state),
            pool,
            sample_rate: config.sample_rate,
            frame_duration: config.frame_duration,
            frame_size,
            encoded_frame_size: encoded_frame_size(config.frame_duration),
            fec: config.fec,
        })
    }

    /// Decode a unit without blocking. Fails with `BufferFull` when the ring
    /// can't take the result; the unit has not been decoded in that case.
    pub fn write(&self, unit: &EncodedFrame) -> Result<(), TranscodeError> {
        self.ring
            .try_write_with(|state, out| self.decode_unit(state, out, unit))
    }

    /// Decode a unit, waiting for the reader to make room when the ring is full
    pub fn write_blocking(&self, unit: &EncodedFrame) -> Result<(), TranscodeError> {
        self.ring
            .write_blocking_with(|state, out| self.decode_unit(state, out, unit))
    }

    fn decode_unit(
        &self,
        state: &mut DecodeState<D>,
        out: &mut Publisher<'_, DecodedSlot>,
        unit: &EncodedFrame,
    ) -> Result<(), TranscodeError> {
        let written = state.encoded_samples_written;
        let frame_size = self.frame_size as u64;
        let Some(next_written) = unit.position.max(written).checked_add(self.encoded_frame_size)
        else {
            warn!(position = unit.position, "unit position overflows the stream clock");
            return Err(TranscodeError::Corrupted {
                gap: unit.position.saturating_sub(written),
                frame_size: self.encoded_frame_size,
            });
        };

        if unit.position <= written {
            let frame = self.decode_frame(state, &unit.payload)?;
            let position = state.pcm_samples_written;
            out.push(DecodedSlot { frame, position })?;

            state.pcm_samples_written += frame_size;
            state.encoded_samples_written = next_written;
            state.frames_decoded += 1;
            trace!(position = unit.position, "decoded frame");
            return Ok(());
        }

        let gap = unit.position - written;
        if gap % self.encoded_frame_size != 0 {
            warn!(
                position = unit.position,
                expected = written,
                "gap is not a whole number of frames"
            );
            return Err(TranscodeError::Corrupted {
                gap,
                frame_size: self.encoded_frame_size,
            });
        }
        let missing = gap / self.encoded_frame_size;

        if self.fec {
            let (recovered, current) = self.decode_fec_frames(state, &unit.payload)?;
            let skipped = missing - 1;
            let position = state.pcm_samples_written + skipped * frame_size;
            out.push(DecodedSlot {
                frame: recovered,
                position,
            })?;
            out.push(DecodedSlot {
                frame: current,
                position: position + frame_size,
            })?;

            state.pcm_samples_written = position + 2 * frame_size;
            state.frames_recovered += 1;
            state.frames_lost += skipped;
            if skipped > 0 {
                warn!(skipped, "lost frames beyond FEC reach");
            }
            debug!(position = unit.position, "recovered lost frame from FEC");
        } else {
            let frame = self.decode_frame(state, &unit.payload)?;
            let position = state.pcm_samples_written + missing * frame_size;
            out.push(DecodedSlot { frame, position })?;

            state.pcm_samples_written = position + frame_size;
            state.frames_lost += missing;
            debug!(missing, position = unit.position, "skipped lost frames");
        }

        state.encoded_samples_written = next_written;
        state.frames_decoded += 1;
        Ok(())
    }

    fn decode_frame(
        &self,
        state: &mut DecodeState<D>,
        payload: &[u8],
    ) -> Result<PooledFrame, TranscodeError> {
        let mut frame = self.pool.acquire();
        let samples = state.codec.decode(payload, &mut frame)?;
        if samples != frame.len() {
            return Err(TranscodeError::ShortFrame {
                expected: frame.len(),
                actual: samples,
            });
        }
        Ok(frame)
    }

    fn decode_fec_frames(
        &self,
        state: &mut DecodeState<D>,
        payload: &[u8],
    ) -> Result<(PooledFrame, PooledFrame), TranscodeError> {
        let samples = state.codec.decode_fec(payload, &mut state.scratch)?;
        if samples != state.scratch.len() {
            return Err(TranscodeError::ShortFrame {
                expected: state.scratch.len(),
                actual: samples,
            });
        }

        let (first, second) = state.scratch.split_at(self.frame_size);
        let mut recovered = self.pool.acquire();
        recovered.copy_from_slice(first);
        let mut current = self.pool.acquire();
        current.copy_from_slice(second);
        Ok((recovered, current))
    }

    /// Read the next PCM frame.
    ///
    /// Also returns the frame's sample offset in the decoded stream. The offset
    /// jumps ahead when frames were lost and could not be recovered; it is up
    /// to the reader to fill the hole. The frame goes back to the pool when dropped.
    pub fn read_frame(&self) -> Result<(PooledFrame, u64), TranscodeError> {
        let frame_size = self.frame_size as u64;
        let encoded_frame_size = self.encoded_frame_size;
        let (slot, position) = self.ring.read_blocking_with(|state, slot| {
            state.frames_read += 1;
            state.pcm_samples_read = slot.position + frame_size;
            state.encoded_samples_read = (slot.position / frame_size + 1) * encoded_frame_size;
            slot.position
        })?;
        Ok((slot.frame, position))
    }

    /// Signal that no more units will be written
    pub fn finalize(&self) -> Result<(), TranscodeError> {
        self.ring.finalize()
    }

    /// Close the pipeline, releasing every buffered frame back to the pool
    pub fn close(&self) -> Result<(), TranscodeError> {
        self.ring.close_with(|state| state.scratch = Vec::new())
    }

    /// Wake a writer blocked on a full ring. Returns whether one was waiting.
    pub fn unblock_writer(&self) -> bool {
        self.ring.unblock_writer()
    }

    /// Playout time of the frames read so far
    pub fn elapsed(&self) -> Duration {
        let samples = self.ring.inspect(|state| state.pcm_samples_read);
        samples_to_duration(samples, self.sample_rate)
    }

    /// Borrow a frame from the pipeline's pool
    pub fn alloc(&self) -> PooledFrame {
        self.pool.acquire()
    }

    /// Return a frame to the pipeline's pool
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

    pub fn fec_enabled(&self) -> bool {
        self.fec
    }

    pub fn state(&self) -> RingState {
        self.ring.state()
    }

    /// Frames waiting to be read
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn stats(&self) -> DecodeStats {
        let mut stats = self.ring.inspect(|state| DecodeStats {
            frames_decoded: state.frames_decoded,
            frames_recovered: state.frames_recovered,
            frames_lost: state.frames_lost,
            frames_read: state.frames_read,
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
impl DecodePipeline<crate::codec::OpusDecoder> {
    /// Create a pipeline backed by an Opus decoder
    pub fn opus(config: &TranscodeConfig) -> Result<Self, TranscodeError> {
        let codec = crate::codec::OpusDecoder::new(config.sample_rate, config.frame_duration)?;
        Self::new(config, codec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::mock::MockDecoder;
    use crate::error::CodecError;
    use proptest::prelude::*;
    use std::thread;

    // 16 kHz, 20 ms: 320 PCM samples per frame, 960 reference-clock samples
    const PCM: u64 = 320;
    const ENC: u64 = 960;

    fn config(max_frames: usize, fec: bool) -> TranscodeConfig {
        TranscodeConfig::new(16000, FrameDuration::Ms20, max_frames, fec)
    }

    fn new_pipeline(max_frames: usize, fec: bool) -> (DecodePipeline<MockDecoder>, Arc<FramePool>) {
        let pool = FramePool::new(PCM as usize, 32);
        let pipeline =
            DecodePipeline::with_pool(&config(max_frames, fec), MockDecoder::default(), pool.clone())
                .unwrap();
        (pipeline, pool)
    }

    fn unit(index: u64, tag: u8) -> EncodedFrame {
        EncodedFrame::new(index * ENC, ENC as u16, vec![tag])
    }

    fn drain(pipeline: &DecodePipeline<MockDecoder>) -> Vec<(i16, u64)> {
        pipeline.finalize().unwrap();
        let mut frames = Vec::new();
        loop {
            match pipeline.read_frame() {
                Ok((frame, position)) => {
                    assert!(frame.iter().all(|&s| s == frame[0]));
                    frames.push((frame[0], position));
                }
                Err(TranscodeError::EndOfStream) => return frames,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
    }

    #[test]
    fn test_in_order_units() {
        let (pipeline, _pool) = new_pipeline(8, true);
        for (i, tag) in [1u8, 2, 3].into_iter().enumerate() {
            pipeline.write(&unit(i as u64, tag)).unwrap();
        }
        assert_eq!(drain(&pipeline), vec![(1, 0), (2, PCM), (3, 2 * PCM)]);

        let stats = pipeline.stats();
        assert_eq!(stats.frames_decoded, 3);
        assert_eq!(stats.frames_lost, 0);
        assert_eq!(stats.encoded_samples_written, 3 * ENC);
        assert_eq!(stats.max_buffered, 3);
    }

    #[test]
    fn test_gap_recovered_with_fec() {
        let (pipeline, _pool) = new_pipeline(8, true);
        pipeline.write(&unit(0, 1)).unwrap();
        pipeline.write(&unit(1, 2)).unwrap();
        pipeline.write(&unit(3, 4)).unwrap();

        // The rebuilt frame comes first, then the unit itself
        assert_eq!(
            drain(&pipeline),
            vec![(1, 0), (2, PCM), (-4, 2 * PCM), (4, 3 * PCM)]
        );
        let stats = pipeline.stats();
        assert_eq!(stats.frames_recovered, 1);
        assert_eq!(stats.frames_lost, 0);
        assert_eq!(stats.pcm_samples_written, 4 * PCM);
        assert_eq!(stats.encoded_samples_written, 4 * ENC);
    }

    #[test]
    fn test_gap_skipped_without_fec() {
        let (pipeline, _pool) = new_pipeline(8, false);
        pipeline.write(&unit(0, 1)).unwrap();
        pipeline.write(&unit(1, 2)).unwrap();
        pipeline.write(&unit(3, 4)).unwrap();

        assert_eq!(drain(&pipeline), vec![(1, 0), (2, PCM), (4, 3 * PCM)]);
        let stats = pipeline.stats();
        assert_eq!(stats.frames_lost, 1);
        assert_eq!(stats.frames_recovered, 0);
        assert_eq!(stats.pcm_samples_read, 4 * PCM);
        assert_eq!(stats.encoded_samples_read, 4 * ENC);
    }

    #[test]
    fn test_fec_only_rebuilds_the_latest_frame() {
        let (pipeline, _pool) = new_pipeline(8, true);
        pipeline.write(&unit(0, 1)).unwrap();
        pipeline.write(&unit(4, 5)).unwrap();

        assert_eq!(drain(&pipeline), vec![(1, 0), (-5, 3 * PCM), (5, 4 * PCM)]);
        assert_eq!(pipeline.stats().frames_lost, 2);
    }

    #[test]
    fn test_stream_starting_late() {
        let (pipeline, _pool) = new_pipeline(8, false);
        pipeline.write(&unit(2, 3)).unwrap();
        assert_eq!(drain(&pipeline), vec![(3, 2 * PCM)]);
    }

    #[test]
    fn test_misaligned_gap_is_corrupted() {
        let (pipeline, pool) = new_pipeline(8, true);
        pipeline.write(&unit(0, 1)).unwrap();
        let before = pipeline.stats();

        let bad = EncodedFrame::new(ENC + 1, ENC as u16, vec![2]);
        assert_eq!(
            pipeline.write(&bad),
            Err(TranscodeError::Corrupted { gap: 1, frame_size: ENC })
        );
        assert_eq!(pipeline.stats(), before);
        assert_eq!(pipeline.len(), 1);
        assert_eq!(pool.stats().outstanding(), 1);

        // The stream carries on once a well-formed unit arrives
        pipeline.write(&unit(1, 2)).unwrap();
        assert_eq!(drain(&pipeline), vec![(1, 0), (2, PCM)]);
    }

    #[test]
    fn test_late_unit_decoded_in_place() {
        let (pipeline, _pool) = new_pipeline(8, false);
        pipeline.write(&unit(0, 1)).unwrap();
        pipeline.write(&unit(1, 2)).unwrap();
        pipeline.write(&unit(0, 9)).unwrap();
        assert_eq!(drain(&pipeline), vec![(1, 0), (2, PCM), (9, 2 * PCM)]);
    }

    #[test]
    fn test_codec_error_propagates_without_leaking() {
        let (pipeline, pool) = new_pipeline(8, false);
        let empty = EncodedFrame::new(0, ENC as u16, Vec::new());
        let err = pipeline.write(&empty).unwrap_err();
        assert_eq!(
            err,
            TranscodeError::Codec(CodecError::DecodingFailed("empty payload".into()))
        );
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.stats().encoded_samples_written, 0);
        assert_eq!(pool.stats().outstanding(), 0);

        // Same on the FEC path
        let (pipeline, pool) = new_pipeline(8, true);
        let gap = EncodedFrame::new(ENC, ENC as u16, Vec::new());
        assert!(matches!(pipeline.write(&gap), Err(TranscodeError::Codec(_))));
        assert_eq!(pool.stats().outstanding(), 0);
    }

    #[test]
    fn test_short_decode_rejected() {
        let pool = FramePool::new(PCM as usize, 4);
        let pipeline = DecodePipeline::with_pool(
            &config(8, false),
            MockDecoder { short: true },
            pool.clone(),
        )
        .unwrap();

        assert_eq!(
            pipeline.write(&unit(0, 1)),
            Err(TranscodeError::ShortFrame { expected: 320, actual: 319 })
        );
        assert!(pipeline.is_empty());
        assert_eq!(pool.stats().outstanding(), 0);
    }

    #[test]
    fn test_buffer_full_leaves_room_for_fec() {
        let (pipeline, _pool) = new_pipeline(3, true);
        pipeline.write(&unit(0, 1)).unwrap();
        // Two free slots left: enough for a recovered frame plus the unit
        pipeline.write(&unit(2, 3)).unwrap();
        assert_eq!(pipeline.len(), 3);
        assert_eq!(pipeline.write(&unit(3, 4)), Err(TranscodeError::BufferFull));

        let (pipeline, _pool) = new_pipeline(3, false);
        pipeline.write(&unit(0, 1)).unwrap();
        pipeline.write(&unit(1, 2)).unwrap();
        assert_eq!(pipeline.write(&unit(2, 3)), Err(TranscodeError::BufferFull));
        assert_eq!(pipeline.stats().encoded_samples_written, 2 * ENC);
    }

    #[test]
    fn test_close_releases_buffered_frames() {
        let (pipeline, pool) = new_pipeline(8, true);
        for i in 0..3 {
            pipeline.write(&unit(i, 1)).unwrap();
        }
        let (held, _) = pipeline.read_frame().unwrap();

        pipeline.close().unwrap();
        let stats = pool.stats();
        assert_eq!(stats.acquired, 3);
        assert_eq!(stats.released, 2);

        // The reader's frame is still its own
        assert_eq!(held.len(), 320);
        pipeline.release(held);
        assert_eq!(pool.stats().released, 3);

        assert_eq!(pipeline.close(), Err(TranscodeError::AlreadyClosed));
        assert_eq!(pipeline.write(&unit(3, 1)), Err(TranscodeError::Closed));
        assert_eq!(pipeline.write_blocking(&unit(3, 1)), Err(TranscodeError::Closed));
        assert!(matches!(pipeline.read_frame(), Err(TranscodeError::Closed)));
        assert_eq!(pipeline.finalize(), Err(TranscodeError::Closed));
        assert_eq!(pipeline.state(), RingState::Closed);
    }

    #[test]
    fn test_finalize_drains_then_ends() {
        let (pipeline, _pool) = new_pipeline(4, true);
        pipeline.write(&unit(0, 1)).unwrap();
        pipeline.finalize().unwrap();

        assert_eq!(pipeline.write(&unit(1, 2)), Err(TranscodeError::EndOfStream));
        assert!(pipeline.read_frame().is_ok());
        assert!(matches!(pipeline.read_frame(), Err(TranscodeError::EndOfStream)));
    }

    #[test]
    fn test_blocking_write_waits_for_reader() {
        let (pipeline, _pool) = new_pipeline(3, false);
        let pipeline = Arc::new(pipeline);
        pipeline.write(&unit(0, 1)).unwrap();
        pipeline.write(&unit(1, 2)).unwrap();

        let writer = {
            let pipeline = pipeline.clone();
            thread::spawn(move || pipeline.write_blocking(&unit(2, 3)))
        };
        while !pipeline.ring.has_parked_writer() {
            thread::yield_now();
        }

        let (frame, _) = pipeline.read_frame().unwrap();
        assert_eq!(frame[0], 1);
        assert_eq!(writer.join().unwrap(), Ok(()));
        assert_eq!(pipeline.len(), 2);
    }

    #[test]
    fn test_threaded_decode_with_loss() {
        let (pipeline, pool) = new_pipeline(4, true);
        let pipeline = Arc::new(pipeline);

        let writer = {
            let pipeline = pipeline.clone();
            thread::spawn(move || {
                for i in 0..200u64 {
                    if i % 7 == 3 {
                        continue;
                    }
                    pipeline.write_blocking(&unit(i, (i % 100) as u8)).unwrap();
                }
                pipeline.finalize().unwrap();
            })
        };

        let mut expected = 0u64;
        loop {
            match pipeline.read_frame() {
                Ok((frame, position)) => {
                    assert_eq!(position, expected * PCM);
                    // A rebuilt frame carries the negated tag of the unit after it
                    let tag = (expected + u64::from(expected % 7 == 3)) % 100;
                    assert_eq!(frame[0].unsigned_abs() as u64, tag);
                    expected += 1;
                }
                Err(TranscodeError::EndOfStream) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        writer.join().unwrap();
        // Unit 199 is dropped and nothing follows it to carry its FEC data
        assert_eq!(expected, 199);
        assert_eq!(pipeline.stats().frames_recovered, 28);
        assert_eq!(pool.stats().outstanding(), 0);
        assert!(pipeline.stats().max_buffered <= 4);
    }

    #[test]
    fn test_accessors() {
        let (pipeline, _pool) = new_pipeline(8, true);
        assert_eq!(pipeline.sample_rate(), 16000);
        assert_eq!(pipeline.frame_size(), 320);
        assert_eq!(pipeline.encoded_frame_size(), 960);
        assert_eq!(pipeline.ptime(), Duration::from_millis(20));
        assert!(pipeline.fec_enabled());
        assert_eq!(pipeline.alloc().len(), 320);

        pipeline.write(&unit(0, 1)).unwrap();
        pipeline.write(&unit(1, 1)).unwrap();
        pipeline.read_frame().unwrap();
        pipeline.read_frame().unwrap();
        assert_eq!(pipeline.elapsed(), Duration::from_millis(40));
    }

    #[test]
    fn test_pool_size_must_match_format() {
        let pool = FramePool::new(160, 4);
        let result = DecodePipeline::with_pool(&config(8, true), MockDecoder::default(), pool);
        assert!(matches!(
            result,
            Err(TranscodeError::PoolMismatch { expected: 320, actual: 160 })
        ));
    }

    #[test]
    fn test_elapsed_days_into_stream() {
        let pool = FramePool::new(960, 4);
        let config = TranscodeConfig::new(48000, FrameDuration::Ms20, 8, false);
        let pipeline = DecodePipeline::with_pool(&config, MockDecoder::default(), pool).unwrap();

        // Five days of 20 ms frames before the first unit arrives
        let index = 5 * 24 * 3600 * 50u64;
        pipeline
            .write(&EncodedFrame::new(index * 960, 960, vec![1u8]))
            .unwrap();
        let (_, position) = pipeline.read_frame().unwrap();
        assert_eq!(position, index * 960);
        assert_eq!(
            pipeline.elapsed(),
            Duration::from_secs(5 * 24 * 3600) + Duration::from_millis(20)
        );
    }

    #[test]
    fn test_position_at_end_of_clock_is_corrupted() {
        let (pipeline, pool) = new_pipeline(8, false);
        pipeline.write(&unit(0, 1)).unwrap();

        let last = EncodedFrame::new((u64::MAX / ENC) * ENC, ENC as u16, vec![2u8]);
        assert!(matches!(
            pipeline.write(&last),
            Err(TranscodeError::Corrupted { .. })
        ));
        assert_eq!(pipeline.len(), 1);
        assert_eq!(pipeline.stats().encoded_samples_written, ENC);

        pipeline.write(&unit(1, 3)).unwrap();
        assert_eq!(drain(&pipeline), vec![(1, 0), (3, PCM)]);
        assert_eq!(pool.stats().outstanding(), 0);
    }

    proptest! {
        #[test]
        fn prop_positions_track_input(gaps in prop::collection::vec(0u64..4, 1..40), fec in any::<bool>()) {
            let (pipeline, pool) = new_pipeline(10_000, fec);
            let mut index = 0u64;
            let mut expected = Vec::new();
            let mut last = None;

            for gap in gaps {
                index += gap;
                let missing = match last {
                    Some(prev) => index - prev - 1,
                    None => index,
                };
                if fec && missing > 0 {
                    expected.push((index - 1) * PCM);
                }
                expected.push(index * PCM);
                pipeline.write(&unit(index, 1)).unwrap();
                last = Some(index);
                index += 1;
            }

            let positions: Vec<u64> = drain(&pipeline).into_iter().map(|(_, p)| p).collect();
            prop_assert_eq!(positions, expected);
            prop_assert_eq!(pool.stats().outstanding(), 0);
        }
    }
}
