//! Frame pool for reusing fixed-size PCM buffers
//!
//! Keeps decoded frames off the allocator in the audio hot path. Buffers are
//! handed out as [`PooledFrame`] handles which go back to their pool when
//! dropped, so a frame can only ever be released once.

use crossbeam::queue::ArrayQueue;
use dashmap::DashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use crate::audio::format::{frame_size, FrameDuration};
use crate::constants::POOL_IDLE_CAPACITY;
use crate::error::TranscodeError;

/// Pool of PCM buffers that all have the same length
pub struct FramePool {
    frame_size: usize,
    free: ArrayQueue<Vec<i16>>,
    allocated: AtomicUsize,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

static REGISTRY: OnceLock<DashMap<(u32, FrameDuration), Arc<FramePool>>> = OnceLock::new();

impl FramePool {
    /// Create a standalone pool
    ///
    /// # Arguments
    /// * `frame_size` - Length of every buffer in samples
    /// * `max_idle` - Number of released buffers kept for reuse
    pub fn new(frame_size: usize, max_idle: usize) -> Arc<Self> {
        Arc::new(Self {
            frame_size,
            free: ArrayQueue::new(max_idle.max(1)),
            allocated: AtomicUsize::new(0),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        })
    }

    /// Shared pool for a clock rate and frame duration
    pub fn of(sample_rate: u32, duration: FrameDuration) -> Result<Arc<Self>, TranscodeError> {
        let size = frame_size(sample_rate, duration)?;
        let registry = REGISTRY.get_or_init(DashMap::new);
        let entry = registry
            .entry((sample_rate, duration))
            .or_insert_with(|| FramePool::new(size, POOL_IDLE_CAPACITY));
        Ok(entry.value().clone())
    }

    /// Get a buffer of exactly `frame_size` samples (or allocate if the pool is empty)
    pub fn acquire(self: &Arc<Self>) -> PooledFrame {
        let samples = self.free.pop().unwrap_or_else(|| {
            self.allocated.fetch_add(1, Ordering::Relaxed);
            vec![0; self.frame_size]
        });
        self.acquired.fetch_add(1, Ordering::Relaxed);
        PooledFrame {
            samples,
            pool: Some(Arc::clone(self)),
        }
    }

    /// Return a frame to the pool. Same as dropping it.
    pub fn release(&self, frame: PooledFrame) {
        drop(frame);
    }

    /// Hand a raw buffer to the pool. Buffers too small to hold a frame are
    /// ignored; which pool the buffer originally came from is not checked.
    pub fn recycle(&self, mut buf: Vec<i16>) {
        self.released.fetch_add(1, Ordering::Relaxed);
        if buf.capacity() < self.frame_size {
            return;
        }
        buf.truncate(self.frame_size);
        buf.resize(self.frame_size, 0);
        let _ = self.free.push(buf); // Ignore if pool is full
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            frame_size: self.frame_size,
            allocated: self.allocated.load(Ordering::Relaxed),
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            idle: self.free.len(),
        }
    }
}

impl fmt::Debug for FramePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramePool")
            .field("frame_size", &self.frame_size)
            .field("idle", &self.free.len())
            .finish()
    }
}

/// Pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub frame_size: usize,
    pub allocated: usize,
    pub acquired: usize,
    pub released: usize,
    pub idle: usize,
}

impl PoolStats {
    /// Buffers acquired and not yet released
    pub fn outstanding(&self) -> usize {
        self.acquired.saturating_sub(self.released)
    }
}

/// PCM buffer borrowed from a [`FramePool`]
pub struct PooledFrame {
    samples: Vec<i16>,
    pool: Option<Arc<FramePool>>,
}

impl PooledFrame {
    /// Return the buffer to its pool
    pub fn release(self) {
        drop(self);
    }

    /// Detach the buffer from its pool; it will not be recycled
    pub fn into_vec(mut self) -> Vec<i16> {
        self.pool = None;
        std::mem::take(&mut self.samples)
    }
}

impl Deref for PooledFrame {
    type Target = [i16];

    fn deref(&self) -> &[i16] {
        &self.samples
    }
}

impl DerefMut for PooledFrame {
    fn deref_mut(&mut self) -> &mut [i16] {
        &mut self.samples
    }
}

impl Drop for PooledFrame {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.recycle(std::mem::take(&mut self.samples));
        }
    }
}

impl fmt::Debug for PooledFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledFrame")
            .field("len", &self.samples.len())
            .finish()
    }
}
