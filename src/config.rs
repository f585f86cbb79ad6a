//! Pipeline configuration
//!
//! Loaded from TOML, e.g.
//!
//! ```toml
//! sample_rate = 16000
//! frame_duration_ms = 20
//! max_frames = 50
//! fec = true
//!
//! [opus]
//! application = "voip"
//! bitrate = 24000
//! packet_loss_perc = 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::audio::format::{frame_size, FrameDuration};
use crate::constants::{
    DEFAULT_MAX_FRAMES, DEFAULT_PACKET_LOSS_PERC, DEFAULT_SAMPLE_RATE, MAX_BUFFERED_FRAMES,
    MIN_BUFFERED_FRAMES,
};
use crate::error::{Error, Result};

/// Settings shared by the encode and decode pipelines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// PCM clock rate of the application side
    pub sample_rate: u32,
    /// Frame duration
    #[serde(rename = "frame_duration_ms")]
    pub frame_duration: FrameDuration,
    /// Capacity of the frame ring
    pub max_frames: usize,
    /// Recover lost frames from in-band FEC on the decode side
    pub fec: bool,
    /// Encoder settings
    pub opus: OpusConfig,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_duration: FrameDuration::default(),
            max_frames: DEFAULT_MAX_FRAMES,
            fec: true,
            opus: OpusConfig::default(),
        }
    }
}

impl TranscodeConfig {
    pub fn new(sample_rate: u32, frame_duration: FrameDuration, max_frames: usize, fec: bool) -> Self {
        Self {
            sample_rate,
            frame_duration,
            max_frames,
            fec,
            opus: OpusConfig::default(),
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: TranscodeConfig =
            toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Clamp the ring capacity and reject formats the codec can't handle
    pub fn validate(mut self) -> Result<Self> {
        frame_size(self.sample_rate, self.frame_duration).map_err(|e| Error::Config(e.to_string()))?;
        if self.opus.packet_loss_perc > 100 {
            return Err(Error::Config(format!(
                "packet_loss_perc must be at most 100, got {}",
                self.opus.packet_loss_perc
            )));
        }
        self.max_frames = clamp_max_frames(self.max_frames);
        Ok(self)
    }
}

/// Ring capacity bounds
pub fn clamp_max_frames(max_frames: usize) -> usize {
    max_frames.clamp(MIN_BUFFERED_FRAMES, MAX_BUFFERED_FRAMES)
}

/// Opus application profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpusApplication {
    #[default]
    Voip,
    Audio,
    LowDelay,
}

/// Opus encoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpusConfig {
    pub application: OpusApplication,
    /// Target bitrate in bits per second; codec default when unset
    pub bitrate: Option<u32>,
    /// Embed in-band FEC in encoded frames
    pub fec: bool,
    /// Expected packet loss, drives how much redundancy FEC carries
    pub packet_loss_perc: u8,
}

impl Default for OpusConfig {
    fn default() -> Self {
        Self {
            application: OpusApplication::Voip,
            bitrate: None,
            fec: true,
            packet_loss_perc: DEFAULT_PACKET_LOSS_PERC,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TranscodeConfig::default();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.frame_duration, FrameDuration::Ms20);
        assert!(config.fec);
        assert_eq!(config.opus.application, OpusApplication::Voip);
    }

    #[test]
    fn test_from_toml() {
        let config = TranscodeConfig::from_toml_str(
            r#"
            sample_rate = 16000
            frame_duration_ms = 2.5
            max_frames = 100000
            fec = false

            [opus]
            application = "low_delay"
            bitrate = 24000
            "#,
        )
        .unwrap();

        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.frame_duration, FrameDuration::Ms2_5);
        assert_eq!(config.max_frames, MAX_BUFFERED_FRAMES);
        assert!(!config.fec);
        assert_eq!(config.opus.application, OpusApplication::LowDelay);
        assert_eq!(config.opus.bitrate, Some(24000));
        assert!(config.opus.fec);
    }

    #[test]
    fn test_integer_duration_and_min_clamp() {
        let config = TranscodeConfig::from_toml_str("frame_duration_ms = 60\nmax_frames = 0").unwrap();
        assert_eq!(config.frame_duration, FrameDuration::Ms60);
        assert_eq!(config.max_frames, MIN_BUFFERED_FRAMES);
    }

    #[test]
    fn test_rejects_unsupported_format() {
        assert!(TranscodeConfig::from_toml_str("sample_rate = 44100").is_err());
        assert!(TranscodeConfig::from_toml_str("frame_duration_ms = 15").is_err());
        assert!(TranscodeConfig::from_toml_str("[opus]\npacket_loss_perc = 101").is_err());
    }
}
