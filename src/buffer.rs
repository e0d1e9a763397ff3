//! Fixed-capacity circular hand-off buffer for exactly one producer and one
//! consumer.
//!
//! Coordination state is two counting semaphores: `free` holds one permit per
//! empty slot, `filled` one permit per occupied slot. The producer owns
//! `next_in`, the consumer owns `next_out`, and the semaphores keep the two
//! sides on disjoint slots, so no buffer-wide lock guards index or count
//! updates. The handles returned by [`BoundedBuffer::split`] are not `Clone`
//! and their operations take `&mut self`, which is what keeps the buffer
//! single-producer/single-consumer.

use crate::error::{PipelineError, Result};
use crate::semaphore::Semaphore;
use crossbeam::utils::CachePadded;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

struct Shared<T> {
    // Each slot is touched by at most one side at a time; the per-slot lock
    // is never contended.
    slots: Box<[Mutex<Option<T>>]>,
    count: CachePadded<AtomicUsize>,
    free: Semaphore,
    filled: Semaphore,
    block_count: AtomicU64,
}

impl<T> Shared<T> {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    fn utilization(&self) -> u32 {
        ((self.len() * 100) / self.capacity()).min(100) as u32
    }
}

/// Entry point for creating a bounded buffer as a producer/consumer pair.
pub struct BoundedBuffer;

impl BoundedBuffer {
    /// Create a buffer with `capacity` slots and split it into its two ends.
    ///
    /// Fails with [`PipelineError::InvalidCapacity`] for a zero capacity and
    /// with [`PipelineError::Allocation`] if the slots cannot be reserved.
    pub fn split<T: Send>(capacity: usize) -> Result<(Producer<T>, Consumer<T>)> {
        if capacity == 0 {
            return Err(PipelineError::InvalidCapacity(capacity));
        }

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| PipelineError::Allocation { capacity })?;
        slots.extend((0..capacity).map(|_| Mutex::new(None)));

        let shared = Arc::new(Shared {
            slots: slots.into_boxed_slice(),
            count: CachePadded::new(AtomicUsize::new(0)),
            free: Semaphore::new(capacity),
            filled: Semaphore::new(0),
            block_count: AtomicU64::new(0),
        });

        let producer = Producer {
            shared: Arc::clone(&shared),
            next_in: 0,
        };
        let consumer = Consumer {
            shared,
            next_out: 0,
        };
        Ok((producer, consumer))
    }
}

/// The depositing end of a bounded buffer.
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
    next_in: usize,
}

impl<T: Send> Producer<T> {
    /// Put a value into the buffer, suspending while every slot is full.
    pub fn deposit(&mut self, value: T) {
        if self.shared.free.acquire() {
            self.shared.block_count.fetch_add(1, Ordering::Relaxed);
            trace!("deposit resumed after waiting on a full buffer");
        }
        self.store(value);
    }

    /// Put a value into the buffer if a slot is free, otherwise hand it back.
    pub fn try_deposit(&mut self, value: T) -> std::result::Result<(), T> {
        if !self.shared.free.try_acquire() {
            return Err(value);
        }
        self.store(value);
        Ok(())
    }

    fn store(&mut self, value: T) {
        let shared = &*self.shared;
        let previous = shared.slots[self.next_in].lock().replace(value);
        assert!(previous.is_none(), "deposit into an occupied slot");
        self.next_in = (self.next_in + 1) % shared.capacity();

        let count = shared.count.fetch_add(1, Ordering::AcqRel) + 1;
        assert!(
            count <= shared.capacity(),
            "buffer count {} exceeds capacity {}",
            count,
            shared.capacity()
        );
        shared.filled.release();
    }

    /// Number of values currently waiting in the buffer
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the capacity of the buffer
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Get the utilization of the buffer as a percentage (0-100)
    pub fn utilization(&self) -> u32 {
        self.shared.utilization()
    }

    /// Number of deposits that had to wait for a free slot
    pub fn block_count(&self) -> u64 {
        self.shared.block_count.load(Ordering::Relaxed)
    }
}

/// The removing end of a bounded buffer.
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
    next_out: usize,
}

impl<T: Send> Consumer<T> {
    /// Take the oldest value out of the buffer, suspending while it is empty.
    pub fn remove(&mut self) -> T {
        self.shared.filled.acquire();
        self.take()
    }

    /// Take the oldest value if one is waiting.
    pub fn try_remove(&mut self) -> Option<T> {
        if !self.shared.filled.try_acquire() {
            return None;
        }
        Some(self.take())
    }

    fn take(&mut self) -> T {
        let shared = &*self.shared;
        let value = match shared.slots[self.next_out].lock().take() {
            Some(value) => value,
            None => unreachable!("filled permit granted for an empty slot"),
        };
        self.next_out = (self.next_out + 1) % shared.capacity();

        let previous = shared.count.fetch_sub(1, Ordering::AcqRel);
        assert!(previous > 0, "buffer count underflow");
        shared.free.release();
        value
    }

    /// Number of values currently waiting in the buffer
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the capacity of the buffer
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Get the utilization of the buffer as a percentage (0-100)
    pub fn utilization(&self) -> u32 {
        self.shared.utilization()
    }
}
