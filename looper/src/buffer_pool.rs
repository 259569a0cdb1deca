//! Fixed pool of scratch buffers for the audio callback.
//!
//! Buffers are moved out of the pool when leased and moved back when the
//! lease is dropped, so neither acquiring nor releasing touches the heap.
//! The slot array is partitioned: the first `available` slots hold buffers
//! that can be handed out, the rest are placeholders for outstanding leases.

use std::cell::RefCell;
use std::mem;
use std::ops::{Deref, DerefMut};

use log::*;

struct Slots<S> {
    buffers: Vec<Vec<S>>,
    available: usize,
}

pub struct BufferPool<S> {
    slots: RefCell<Slots<S>>,
    count: usize,
    buffer_size: usize,
}

impl<S: Copy> BufferPool<S> {
    /// Create a pool of `count` buffers. Buffers have zero length until
    /// `setup_buffers_if_needed()` is called with the host block size.
    pub fn new(count: usize) -> Self {
        let buffers = (0..count).map(|_| Vec::new()).collect();
        BufferPool {
            slots: RefCell::new(Slots { buffers, available: count }),
            count,
            buffer_size: 0,
        }
    }

    pub fn capacity(self: &Self) -> usize {
        self.count
    }

    pub fn buffer_size(self: &Self) -> usize {
        self.buffer_size
    }

    pub fn available_count(self: &Self) -> usize {
        self.slots.borrow().available
    }

    /// Reallocate every buffer to `buffer_size` samples of `fill`, unless the
    /// pool already has that size.
    ///
    /// Taking `&mut self` means no lease can be outstanding while this runs.
    pub fn setup_buffers_if_needed(self: &mut Self, buffer_size: usize, fill: S) {
        if buffer_size == self.buffer_size {
            return;
        }
        self.resize(buffer_size, fill);
    }

    /// Discard and reallocate every buffer.
    pub fn resize(self: &mut Self, buffer_size: usize, fill: S) {
        let slots = self.slots.get_mut();
        assert_eq!(slots.available, self.count, "buffer pool resized with leases outstanding");

        debug!("Buffer pool: {} buffers of {} samples", self.count, buffer_size);
        for buffer in slots.buffers.iter_mut() {
            *buffer = vec![fill; buffer_size];
        }
        self.buffer_size = buffer_size;
    }

    /// Lease a buffer. The pool is sized so that this never runs dry; running
    /// out is a programming error.
    pub fn acquire(self: &Self) -> PooledBuffer<'_, S> {
        let mut slots = self.slots.borrow_mut();
        assert!(slots.available > 0, "buffer pool exhausted ({} buffers leased)", self.count);

        slots.available -= 1;
        let index = slots.available;
        let data = mem::take(&mut slots.buffers[index]);
        PooledBuffer { pool: self, data }
    }

    fn release(self: &Self, data: &mut Vec<S>) {
        let mut slots = self.slots.borrow_mut();
        assert!(slots.available < self.count, "buffer returned to a full pool");

        // The slot at the boundary is a placeholder left by some lease; swap
        // the returned storage into it and grow the available partition.
        let index = slots.available;
        mem::swap(&mut slots.buffers[index], data);
        slots.available += 1;
    }
}

/// A leased scratch buffer. Returned to its pool when dropped.
pub struct PooledBuffer<'a, S: Copy> {
    pool: &'a BufferPool<S>,
    data: Vec<S>,
}

impl<'a, S: Copy> PooledBuffer<'a, S> {
    /// Return the buffer to the pool now rather than at end of scope.
    pub fn release(self: Self) {
        drop(self)
    }
}

impl<'a, S: Copy> Deref for PooledBuffer<'a, S> {
    type Target = [S];

    fn deref(&self) -> &[S] {
        &self.data
    }
}

impl<'a, S: Copy> DerefMut for PooledBuffer<'a, S> {
    fn deref_mut(&mut self) -> &mut [S] {
        &mut self.data
    }
}

impl<'a, S: Copy> Drop for PooledBuffer<'a, S> {
    fn drop(&mut self) {
        self.pool.release(&mut self.data);
    }
}
