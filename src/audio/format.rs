//! Frame geometry
//!
//! Opus only ever works with a handful of frame durations and clock rates,
//! so frame sizes are computed from the pair instead of being tabulated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::constants::{REFERENCE_CLOCK_RATE, SUPPORTED_SAMPLE_RATES};
use crate::error::TranscodeError;

/// Duration of one audio frame (Opus "ptime")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub enum FrameDuration {
    Ms2_5,
    Ms5,
    Ms10,
    Ms20,
    Ms40,
    Ms60,
}

impl FrameDuration {
    pub const ALL: [FrameDuration; 6] = [
        FrameDuration::Ms2_5,
        FrameDuration::Ms5,
        FrameDuration::Ms10,
        FrameDuration::Ms20,
        FrameDuration::Ms40,
        FrameDuration::Ms60,
    ];

    /// Parse a duration in milliseconds. `3` is accepted as 2.5 ms since
    /// integer ptime values round it up.
    pub fn from_millis(ms: f32) -> Option<Self> {
        match ms {
            m if (m - 2.5).abs() < 0.01 || (m - 3.0).abs() < 0.01 => Some(FrameDuration::Ms2_5),
            m if (m - 5.0).abs() < 0.01 => Some(FrameDuration::Ms5),
            m if (m - 10.0).abs() < 0.01 => Some(FrameDuration::Ms10),
            m if (m - 20.0).abs() < 0.01 => Some(FrameDuration::Ms20),
            m if (m - 40.0).abs() < 0.01 => Some(FrameDuration::Ms40),
            m if (m - 60.0).abs() < 0.01 => Some(FrameDuration::Ms60),
            _ => None,
        }
    }

    /// Duration in tenths of a millisecond
    fn tenths(self) -> u32 {
        match self {
            FrameDuration::Ms2_5 => 25,
            FrameDuration::Ms5 => 50,
            FrameDuration::Ms10 => 100,
            FrameDuration::Ms20 => 200,
            FrameDuration::Ms40 => 400,
            FrameDuration::Ms60 => 600,
        }
    }

    pub fn as_millis_f32(self) -> f32 {
        self.tenths() as f32 / 10.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_micros(self.tenths() as u64 * 100)
    }

    /// Samples per channel in one frame at `sample_rate`
    pub fn samples(self, sample_rate: u32) -> usize {
        (sample_rate as u64 * self.tenths() as u64 / 10_000) as usize
    }
}

impl Default for FrameDuration {
    fn default() -> Self {
        FrameDuration::Ms20
    }
}

impl fmt::Display for FrameDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.as_millis_f32())
    }
}

impl TryFrom<f32> for FrameDuration {
    type Error = String;

    fn try_from(ms: f32) -> Result<Self, Self::Error> {
        FrameDuration::from_millis(ms).ok_or_else(|| format!("unsupported frame duration: {ms}ms"))
    }
}

impl From<FrameDuration> for f32 {
    fn from(d: FrameDuration) -> f32 {
        d.as_millis_f32()
    }
}

/// PCM frame size for a clock rate and frame duration
pub fn frame_size(sample_rate: u32, duration: FrameDuration) -> Result<usize, TranscodeError> {
    if !SUPPORTED_SAMPLE_RATES.contains(&sample_rate) {
        return Err(TranscodeError::Unsupported {
            sample_rate,
            ptime: duration.to_string(),
        });
    }
    Ok(duration.samples(sample_rate))
}

/// Frame size on the 48 kHz reference clock used for stream positions
pub fn encoded_frame_size(duration: FrameDuration) -> u64 {
    duration.samples(REFERENCE_CLOCK_RATE) as u64
}

/// Playout time of `samples` at `sample_rate`, exact for any stream length
pub fn samples_to_duration(samples: u64, sample_rate: u32) -> Duration {
    let rate = u64::from(sample_rate.max(1));
    Duration::from_secs(samples / rate)
        + Duration::from_nanos((samples % rate) * 1_000_000_000 / rate)
}
