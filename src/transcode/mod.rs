//! Frame pipelines between the network and the application
//!
//! [`DecodePipeline`] and [`EncodePipeline`] are both a codec in front of a
//! [`FrameRing`]. Each instance expects one writer thread and one reader
//! thread. Frames come out in exactly the order they went in; reordering
//! belongs upstream.

pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod ring;

pub use decoder::{DecodePipeline, DecodeStats};
pub use encoder::{EncodePipeline, EncodeStats};
pub use frame::EncodedFrame;
pub use ring::{FrameRing, Publisher, RingState};
