//! # Opus Transcode
//!
//! Bounded, blocking frame pipelines between a network side that speaks
//! encoded units and an application side that speaks fixed-size PCM frames.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────── SEND ──────────────────────────────┐
//! │                                                                  │
//! │  PCM producer ──► EncodePipeline ───────────────► network sender │
//! │   (app thread)    ┌──────────────┐  EncodedFrame  (net thread)   │
//! │                   │ FrameEncoder │  {pos, samples, payload}      │
//! │                   │ FrameRing    │                               │
//! │                   └──────────────┘                               │
//! └──────────────────────────────────────────────────────────────────┘
//!
//! ┌──────────────────────────── RECEIVE ────────────────────────────┐
//! │                                                                  │
//! │  network ──► DecodePipeline ─────────────────────► PCM consumer  │
//! │  (net thread) ┌────────────────────────┐ PooledFrame (app thread)│
//! │               │ gap detection          │ + sample offset         │
//! │               │ FEC recovery           │                         │
//! │               │ FrameDecoder           │                         │
//! │               │ FrameRing ◄── FramePool│                         │
//! │               └────────────────────────┘                         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both pipelines share [`transcode::FrameRing`]: a fixed-capacity FIFO with
//! non-blocking and blocking writes, blocking reads, and a two-step shutdown
//! (`finalize`, then `close`).

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;
pub mod transcode;

pub use error::{CodecError, Error, Result, TranscodeError};

/// Crate-wide constants
pub mod constants {
    /// Clock rate of encoded stream positions
    pub const REFERENCE_CLOCK_RATE: u32 = 48000;

    /// Clock rates Opus can decode to and encode from
    pub const SUPPORTED_SAMPLE_RATES: [u32; 5] = [8000, 12000, 16000, 24000, 48000];

    /// Default PCM sample rate
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

    /// Default ring capacity in frames (one second of 20 ms frames)
    pub const DEFAULT_MAX_FRAMES: usize = 50;

    /// Smallest ring: one usable slot plus the one kept for FEC
    pub const MIN_BUFFERED_FRAMES: usize = 2;

    /// Largest ring
    pub const MAX_BUFFERED_FRAMES: usize = 10_000;

    /// Released buffers each frame pool keeps for reuse
    pub const POOL_IDLE_CAPACITY: usize = 256;

    /// Encoder scratch size (60 ms at 48 kHz, two bytes per sample)
    pub const MAX_ENCODED_FRAME_SIZE: usize = 2880 * 2;

    /// Default expected packet loss for FEC tuning, in percent
    pub const DEFAULT_PACKET_LOSS_PERC: u8 = 10;
}
