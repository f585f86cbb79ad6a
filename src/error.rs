//! Error types for the transcoding pipelines

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Codec adapter errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Encoder initialization failed: {0}")]
    EncoderInit(String),

    #[error("Decoder initialization failed: {0}")]
    DecoderInit(String),

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Invalid frame size: {0}")]
    InvalidFrameSize(usize),
}

/// Pipeline errors
///
/// `BufferFull` is the only transient condition. Everything else is terminal
/// for the call that observed it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscodeError {
    #[error("pipeline is closed")]
    Closed,

    #[error("pipeline already closed")]
    AlreadyClosed,

    #[error("end of stream")]
    EndOfStream,

    #[error("frame buffer full")]
    BufferFull,

    #[error("corrupted stream: gap of {gap} samples is not a multiple of {frame_size}")]
    Corrupted { gap: u64, frame_size: u64 },

    #[error("wrong frame size: expected {expected} samples, got {actual}")]
    WrongFrameSize { expected: usize, actual: usize },

    #[error("short frame: codec produced {actual} samples, expected {expected}")]
    ShortFrame { expected: usize, actual: usize },

    #[error("another caller is already waiting on this side of the pipeline")]
    WaiterBusy,

    #[error("frame pool hands out {actual}-sample frames, format needs {expected}")]
    PoolMismatch { expected: usize, actual: usize },

    #[error("unsupported format: {sample_rate} Hz with {ptime}")]
    Unsupported { sample_rate: u32, ptime: String },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl TranscodeError {
    /// Backpressure; the caller may retry or use the blocking variant.
    pub fn is_transient(&self) -> bool {
        matches!(self, TranscodeError::BufferFull)
    }

    /// The pipeline will never accept or yield another frame.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TranscodeError::Closed | TranscodeError::AlreadyClosed | TranscodeError::EndOfStream
        )
    }
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
