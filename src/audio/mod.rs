//! Audio frame geometry and buffer pooling

pub mod format;
pub mod pool;

pub use format::{encoded_frame_size, frame_size, samples_to_duration, FrameDuration};
pub use pool::{FramePool, PoolStats, PooledFrame};
