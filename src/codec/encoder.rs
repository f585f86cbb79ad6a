//! Opus encoder adapter
//!
//! Mono 16-bit encoding configured from [`OpusConfig`].

use opus::{Application, Channels, Encoder};

use crate::audio::format::{frame_size, FrameDuration};
use crate::codec::FrameEncoder;
use crate::config::{OpusApplication, OpusConfig};
use crate::error::CodecError;

/// Opus encoder wrapper
pub struct OpusEncoder {
    encoder: Encoder,
    sample_rate: u32,
    frame_size: usize,
    /// Frame counter for statistics
    frames_encoded: u64,
    /// Total bytes produced
    bytes_produced: u64,
}

impl OpusEncoder {
    /// Create a new mono Opus encoder
    pub fn new(
        sample_rate: u32,
        duration: FrameDuration,
        config: &OpusConfig,
    ) -> Result<Self, CodecError> {
        let frame_size =
            frame_size(sample_rate, duration).map_err(|e| CodecError::EncoderInit(e.to_string()))?;

        let application = match config.application {
            OpusApplication::Voip => Application::Voip,
            OpusApplication::Audio => Application::Audio,
            OpusApplication::LowDelay => Application::LowDelay,
        };

        let mut encoder = Encoder::new(sample_rate, Channels::Mono, application)
            .map_err(|e| CodecError::EncoderInit(e.to_string()))?;

        Self::configure_encoder(&mut encoder, config)?;

        Ok(Self {
            encoder,
            sample_rate,
            frame_size,
            frames_encoded: 0,
            bytes_produced: 0,
        })
    }

    fn configure_encoder(encoder: &mut Encoder, config: &OpusConfig) -> Result<(), CodecError> {
        if let Some(bitrate) = config.bitrate {
            encoder
                .set_bitrate(opus::Bitrate::Bits(bitrate as i32))
                .map_err(|e| CodecError::EncoderInit(format!("Failed to set bitrate: {}", e)))?;
        }

        encoder
            .set_inband_fec(config.fec)
            .map_err(|e| CodecError::EncoderInit(format!("Failed to set FEC: {}", e)))?;

        if config.fec {
            encoder
                .set_packet_loss_perc(config.packet_loss_perc as i32)
                .map_err(|e| CodecError::EncoderInit(format!("Failed to set packet loss: {}", e)))?;
        }

        Ok(())
    }

    /// Get sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get expected frame size in samples
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Get statistics
    pub fn stats(&self) -> EncoderStats {
        EncoderStats {
            frames_encoded: self.frames_encoded,
            bytes_produced: self.bytes_produced,
            average_frame_size: if self.frames_encoded > 0 {
                self.bytes_produced as f32 / self.frames_encoded as f32
            } else {
                0.0
            },
        }
    }
}

impl FrameEncoder for OpusEncoder {
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize, CodecError> {
        if pcm.len() != self.frame_size {
            return Err(CodecError::InvalidFrameSize(pcm.len()));
        }

        let size = self
            .encoder
            .encode(pcm, out)
            .map_err(|e| CodecError::EncodingFailed(e.to_string()))?;

        self.frames_encoded += 1;
        self.bytes_produced += size as u64;
        Ok(size)
    }
}

/// Encoder statistics
#[derive(Debug, Clone)]
pub struct EncoderStats {
    pub frames_encoded: u64,
    pub bytes_produced: u64,
    pub average_frame_size: f32,
}
