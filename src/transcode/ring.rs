//! Bounded synchronized frame ring
//!
//! Fixed-capacity FIFO shared by one writer thread and one reader thread.
//! Writes fail (or park) once `capacity - 1` frames are buffered: the last
//! slot is kept free so a decode that recovers a lost frame through FEC can
//! publish two frames in a single write.
//!
//! A ring carries an extension state `S` guarded by the same lock as the
//! slots. The pipelines keep their codec, scratch buffers and counters there
//! so that a write or read and its bookkeeping happen atomically.
//!
//! Wake-ups are single target. Each side has a `parked` flag that only the
//! waking party clears, which also absorbs spurious condvar wake-ups.

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::config::clamp_max_frames;
use crate::error::TranscodeError;

/// Lifecycle of a ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingState {
    Open,
    /// No more writes; buffered frames can still be read
    Finalizing,
    Closed,
}

struct Inner<T, S> {
    slots: Vec<Option<T>>,
    reader_index: u64,
    writer_index: u64,
    size: usize,
    max_buffered: usize,
    finalized: bool,
    closed: bool,
    reader_parked: bool,
    writer_parked: bool,
    ext: S,
}

impl<T, S> Inner<T, S> {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn is_full(&self) -> bool {
        self.size >= self.capacity() - 1
    }

    fn check_writable(&self) -> Result<(), TranscodeError> {
        if self.closed {
            return Err(TranscodeError::Closed);
        }
        if self.finalized {
            return Err(TranscodeError::EndOfStream);
        }
        Ok(())
    }
}

/// Write handle passed to the closure of [`FrameRing::try_write_with`]
pub struct Publisher<'a, T> {
    slots: &'a mut [Option<T>],
    writer_index: &'a mut u64,
    size: &'a mut usize,
    published: usize,
}

impl<T> Publisher<'_, T> {
    /// Append one frame to the ring
    pub fn push(&mut self, item: T) -> Result<(), TranscodeError> {
        if *self.size >= self.slots.len() {
            return Err(TranscodeError::BufferFull);
        }
        let slot = (*self.writer_index % self.slots.len() as u64) as usize;
        self.slots[slot] = Some(item);
        *self.writer_index += 1;
        *self.size += 1;
        self.published += 1;
        Ok(())
    }

    /// Slots still free, including the reserved one
    pub fn free_slots(&self) -> usize {
        self.slots.len() - *self.size
    }
}

/// Bounded blocking FIFO of frames
pub struct FrameRing<T, S = ()> {
    inner: Mutex<Inner<T, S>>,
    readable: Condvar,
    writable: Condvar,
}

impl<T, S> FrameRing<T, S> {
    /// Create a ring holding up to `capacity` frames (clamped to [2, 10000])
    pub fn new(capacity: usize, ext: S) -> Self {
        let capacity = clamp_max_frames(capacity);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        Self {
            inner: Mutex::new(Inner {
                slots,
                reader_index: 0,
                writer_index: 0,
                size: 0,
                max_buffered: 0,
                finalized: false,
                closed: false,
                reader_parked: false,
                writer_parked: false,
                ext,
            }),
            readable: Condvar::new(),
            writable: Condvar::new(),
        }
    }

    /// Run `f` under the ring lock if there is room for a write.
    ///
    /// `f` should do all fallible work before pushing: frames pushed before an
    /// error stay published.
    pub fn try_write_with<R>(
        &self,
        f: impl FnOnce(&mut S, &mut Publisher<'_, T>) -> Result<R, TranscodeError>,
    ) -> Result<R, TranscodeError> {
        let mut guard = self.inner.lock();
        guard.check_writable()?;
        if guard.is_full() {
            return Err(TranscodeError::BufferFull);
        }
        self.write_locked(&mut guard, f)
    }

    /// Like [`try_write_with`](Self::try_write_with), but parks until the
    /// reader frees a slot when the ring is full, then tries exactly once more.
    pub fn write_blocking_with<R>(
        &self,
        f: impl FnOnce(&mut S, &mut Publisher<'_, T>) -> Result<R, TranscodeError>,
    ) -> Result<R, TranscodeError> {
        let mut guard = self.inner.lock();
        guard.check_writable()?;

        if guard.is_full() {
            if guard.writer_parked {
                return Err(TranscodeError::WaiterBusy);
            }
            guard.writer_parked = true;
            while guard.writer_parked {
                self.writable.wait(&mut guard);
            }

            guard.check_writable()?;
            if guard.is_full() {
                return Err(TranscodeError::BufferFull);
            }
        }

        self.write_locked(&mut guard, f)
    }

    fn write_locked<R>(
        &self,
        inner: &mut Inner<T, S>,
        f: impl FnOnce(&mut S, &mut Publisher<'_, T>) -> Result<R, TranscodeError>,
    ) -> Result<R, TranscodeError> {
        let mut publisher = Publisher {
            slots: &mut inner.slots,
            writer_index: &mut inner.writer_index,
            size: &mut inner.size,
            published: 0,
        };
        let result = f(&mut inner.ext, &mut publisher);
        let published = publisher.published;

        if published > 0 {
            inner.max_buffered = inner.max_buffered.max(inner.size);
            if inner.reader_parked {
                inner.reader_parked = false;
                self.readable.notify_one();
            }
        }
        result
    }

    /// Pop the oldest frame, parking while the ring is empty.
    ///
    /// `f` sees the extension state and the frame before the lock is released.
    pub fn read_blocking_with<R>(
        &self,
        f: impl FnOnce(&mut S, &T) -> R,
    ) -> Result<(T, R), TranscodeError> {
        let mut guard = self.inner.lock();
        loop {
            if guard.closed {
                return Err(TranscodeError::Closed);
            }
            if guard.size > 0 {
                break;
            }
            if guard.finalized {
                return Err(TranscodeError::EndOfStream);
            }
            if guard.reader_parked {
                return Err(TranscodeError::WaiterBusy);
            }

            // Wait for next write.
            guard.reader_parked = true;
            while guard.reader_parked {
                self.readable.wait(&mut guard);
            }
        }

        let inner = &mut *guard;
        let slot = (inner.reader_index % inner.slots.len() as u64) as usize;
        let Some(item) = inner.slots[slot].take() else {
            unreachable!("ring slot {slot} empty with {} frames buffered", inner.size);
        };
        inner.reader_index += 1;
        inner.size -= 1;
        let r = f(&mut inner.ext, &item);

        // Notify writer if needed.
        if inner.writer_parked {
            inner.writer_parked = false;
            self.writable.notify_one();
        }
        Ok((item, r))
    }

    /// Signal that no more frames will be written. Buffered frames can still
    /// be read, after which reads report end of stream.
    pub fn finalize(&self) -> Result<(), TranscodeError> {
        let mut guard = self.inner.lock();
        if guard.closed {
            return Err(TranscodeError::Closed);
        }
        if !guard.finalized {
            debug!(buffered = guard.size, "finalizing frame ring");
        }
        guard.finalized = true;
        self.wake_all(&mut guard);
        Ok(())
    }

    /// Close the ring, dropping every buffered frame and running `release`
    /// on the extension state.
    pub fn close_with(&self, release: impl FnOnce(&mut S)) -> Result<(), TranscodeError> {
        let drained = {
            let mut guard = self.inner.lock();
            if guard.closed {
                return Err(TranscodeError::AlreadyClosed);
            }
            guard.closed = true;
            self.wake_all(&mut guard);

            debug!(buffered = guard.size, "closing frame ring");
            guard.size = 0;
            guard.reader_index = guard.writer_index;
            release(&mut guard.ext);
            guard
                .slots
                .iter_mut()
                .filter_map(Option::take)
                .collect::<Vec<T>>()
        };
        // Buffered frames are released outside the lock.
        drop(drained);
        Ok(())
    }

    /// Wake a parked writer without freeing a slot. It retries once and
    /// reports `BufferFull` if the ring is still full.
    pub fn unblock_writer(&self) -> bool {
        let mut guard = self.inner.lock();
        if guard.writer_parked {
            guard.writer_parked = false;
            self.writable.notify_one();
            true
        } else {
            false
        }
    }

    fn wake_all(&self, inner: &mut Inner<T, S>) {
        if inner.writer_parked {
            inner.writer_parked = false;
            self.writable.notify_one();
        }
        if inner.reader_parked {
            inner.reader_parked = false;
            self.readable.notify_one();
        }
    }

    /// Read the extension state under the lock
    pub fn inspect<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.inner.lock().ext)
    }

    pub fn state(&self) -> RingState {
        let guard = self.inner.lock();
        if guard.closed {
            RingState::Closed
        } else if guard.finalized {
            RingState::Finalizing
        } else {
            RingState::Open
        }
    }

    /// Frames currently buffered
    pub fn len(&self) -> usize {
        self.inner.lock().size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }

    /// High-water mark of buffered frames
    pub fn max_buffered(&self) -> usize {
        self.inner.lock().max_buffered
    }

    pub fn has_parked_writer(&self) -> bool {
        self.inner.lock().writer_parked
    }

    pub fn has_parked_reader(&self) -> bool {
        self.inner.lock().reader_parked
    }
}

impl<T> FrameRing<T, ()> {
    /// Write a frame without blocking
    pub fn write(&self, item: T) -> Result<(), TranscodeError> {
        self.try_write_with(|_, publisher| publisher.push(item))
    }

    /// Write a frame, parking while the ring is full
    pub fn write_blocking(&self, item: T) -> Result<(), TranscodeError> {
        self.write_blocking_with(|_, publisher| publisher.push(item))
    }

    /// Read the oldest frame, parking while the ring is empty
    pub fn read(&self) -> Result<T, TranscodeError> {
        self.read_blocking_with(|_, _| ()).map(|(item, _)| item)
    }

    pub fn close(&self) -> Result<(), TranscodeError> {
        self.close_with(|_| ())
    }
}
