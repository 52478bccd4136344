//! Secondary buffer pool.
//!
//! A [`SlotPool`] is an arena of `N` chunk buffers plus two index queues:
//! `free` holds the indices the fill loop may read into, `ready` holds a
//! [`Chunk`] for every filled buffer in file order. An index lives in exactly
//! one place at a time (`free`, `ready`, or with the side currently holding
//! it), so a buffer is never handed back to the fill loop before the consumer
//! has copied out of it, and at most `N` chunks are in flight.
//!
//! Each buffer sits behind an async [`Mutex`]. The index protocol already
//! makes access exclusive, so the lock is always uncontended; it is what lets
//! the pool be shared between cores without `unsafe`.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::{Mutex, MutexGuard};

type SlotCell<const CHUNK: usize> = Mutex<CriticalSectionRawMutex, [u8; CHUNK]>;

/// A filled slot as queued for the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Chunk {
    index: usize,
    len: usize,
    pos: u64,
    eof: bool,
}

impl Chunk {
    pub(crate) const fn new(index: usize, len: usize, pos: u64, eof: bool) -> Self {
        Self { index, len, pos, eof }
    }

    /// Arena index of the buffer holding the bytes.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of valid bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when the chunk holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Absolute file position just after the last byte of this chunk.
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// `true` if the file reached end of file with this chunk.
    pub fn eof(&self) -> bool {
        self.eof
    }
}

/// `N` buffers of `CHUNK` bytes shared by a fill loop and its consumer.
///
/// Firmware places the pool in a `static`; host code may box and leak it.
pub struct SlotPool<const CHUNK: usize, const N: usize> {
    slots: [SlotCell<CHUNK>; N],
    free: Channel<CriticalSectionRawMutex, usize, N>,
    ready: Channel<CriticalSectionRawMutex, Chunk, N>,
}

impl<const CHUNK: usize, const N: usize> SlotPool<CHUNK, N> {
    #[allow(clippy::declare_interior_mutable_const)] // array repeat operand only
    const SLOT: SlotCell<CHUNK> = Mutex::new([0u8; CHUNK]);

    /// An empty pool. [`split`](super::split) hands out every index.
    #[allow(clippy::large_stack_arrays)] // moved into a static or a Box
    pub const fn new() -> Self {
        Self {
            slots: [Self::SLOT; N],
            free: Channel::new(),
            ready: Channel::new(),
        }
    }

    /// Number of buffers in the arena.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Forget queued chunks and mark every buffer free.
    ///
    /// Only valid while neither side holds an index.
    pub(crate) fn reset(&self) {
        while self.ready.try_receive().is_ok() {}
        while self.free.try_receive().is_ok() {}
        for index in 0..N {
            // Capacity is N and the queue was just emptied.
            let _ = self.free.try_send(index);
        }
    }

    /// Wait for a free buffer and take its index.
    pub(crate) async fn acquire(&self) -> usize {
        self.free.receive().await
    }

    /// Lock the buffer at `index`.
    #[allow(clippy::indexing_slicing)] // Safety: indices only come from reset(), which issues 0..N
    pub(crate) async fn slot(&self, index: usize) -> MutexGuard<'_, CriticalSectionRawMutex, [u8; CHUNK]> {
        self.slots[index].lock().await
    }

    /// Queue a filled buffer for the consumer.
    pub(crate) fn publish(&self, chunk: Chunk) {
        if self.ready.try_send(chunk).is_err() {
            // Unreachable while indices are conserved.
            error!("slot {} published into a full queue", chunk.index);
        }
    }

    /// Oldest queued chunk, if any.
    pub(crate) fn try_take(&self) -> Option<Chunk> {
        self.ready.try_receive().ok()
    }

    /// Wait for the oldest queued chunk.
    pub(crate) async fn take(&self) -> Chunk {
        self.ready.receive().await
    }

    /// Hand a consumed buffer back to the fill loop.
    pub(crate) fn recycle(&self, index: usize) {
        if self.free.try_send(index).is_err() {
            error!("slot {} recycled into a full free list", index);
        }
    }

    /// Recycle every queued chunk, returning how many were dropped.
    pub(crate) fn discard(&self) -> usize {
        let mut discarded = 0usize;
        while let Some(chunk) = self.try_take() {
            self.recycle(chunk.index);
            discarded = discarded.saturating_add(1);
        }
        discarded
    }

    /// Number of chunks waiting for the consumer.
    pub fn queued(&self) -> usize {
        self.ready.len()
    }

    /// `true` when every buffer holds a chunk the consumer has not taken.
    pub fn is_full(&self) -> bool {
        self.ready.is_full()
    }
}

impl<const CHUNK: usize, const N: usize> Default for SlotPool<CHUNK, N> {
    fn default() -> Self {
        Self::new()
    }
}
