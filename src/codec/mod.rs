//! Codec adapters
//!
//! The pipelines treat the codec as a black box behind [`FrameDecoder`] and
//! [`FrameEncoder`]. The Opus implementations live behind the `opus-codec`
//! feature.

use crate::error::CodecError;

#[cfg(feature = "opus-codec")]
pub mod decoder;
#[cfg(feature = "opus-codec")]
pub mod encoder;

#[cfg(feature = "opus-codec")]
pub use decoder::OpusDecoder;
#[cfg(feature = "opus-codec")]
pub use encoder::OpusEncoder;

/// Decoding half of a codec
pub trait FrameDecoder: Send {
    /// Decode one payload into `pcm`, returning the number of samples written.
    fn decode(&mut self, payload: &[u8], pcm: &mut [i16]) -> Result<usize, CodecError>;

    /// Reconstruct the frame lost just before `payload` from the redundancy it
    /// carries, then decode `payload` itself.
    ///
    /// `pcm` holds two frames: the recovered one first, the current one second.
    fn decode_fec(&mut self, payload: &[u8], pcm: &mut [i16]) -> Result<usize, CodecError>;
}

/// Encoding half of a codec
pub trait FrameEncoder: Send {
    /// Encode one frame of samples into `out`, returning the payload length.
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize, CodecError>;
}

impl<T: FrameDecoder + ?Sized> FrameDecoder for Box<T> {
    fn decode(&mut self, payload: &[u8], pcm: &mut [i16]) -> Result<usize, CodecError> {
        (**self).decode(payload, pcm)
    }

    fn decode_fec(&mut self, payload: &[u8], pcm: &mut [i16]) -> Result<usize, CodecError> {
        (**self).decode_fec(payload, pcm)
    }
}

impl<T: FrameEncoder + ?Sized> FrameEncoder for Box<T> {
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize, CodecError> {
        (**self).encode(pcm, out)
    }
}
