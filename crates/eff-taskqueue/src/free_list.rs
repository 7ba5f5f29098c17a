//! Fixed arena with a lock-free free list
//!
//! Slots are allocated once, up front, and referenced by index. Free slot
//! indices form a Treiber stack whose head packs a generation tag next to the
//! index, so concurrent poppers cannot be fooled by a slot that was popped and
//! pushed back between their load and their CAS (ABA).

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

/// Largest arena the tagged head can address
pub const MAX_FREE_LIST_CAPACITY: usize = 1 << 20;

const NIL: u32 = u32::MAX;

#[inline]
fn pack(tag: u32, index: u32) -> u64 {
    ((tag as u64) << 32) | index as u64
}

#[inline]
fn unpack(word: u64) -> (u32, u32) {
    ((word >> 32) as u32, word as u32)
}

pub struct FreeList<T> {
    slots: Box<[T]>,
    /// Successor of each free slot
    links: Box<[AtomicU32]>,
    head: CachePadded<AtomicU64>,
    available: CachePadded<AtomicUsize>,
}

impl<T> FreeList<T> {
    /// Allocate `capacity` slots, all initially free.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds [`MAX_FREE_LIST_CAPACITY`].
    pub fn new(capacity: usize, mut init: impl FnMut(u32) -> T) -> Self {
        assert!(
            capacity <= MAX_FREE_LIST_CAPACITY,
            "free list capacity {capacity} exceeds {MAX_FREE_LIST_CAPACITY}"
        );

        let slots: Box<[T]> = (0..capacity as u32).map(&mut init).collect();

        // Chain 0 -> 1 -> ... -> capacity-1 so pops hand out low indices first
        let links: Box<[AtomicU32]> = (0..capacity as u32)
            .map(|i| {
                let next = i + 1;
                AtomicU32::new(if (next as usize) < capacity { next } else { NIL })
            })
            .collect();

        let first = if capacity > 0 { 0 } else { NIL };

        Self {
            slots,
            links,
            head: CachePadded::new(AtomicU64::new(pack(0, first))),
            available: CachePadded::new(AtomicUsize::new(capacity)),
        }
    }

    /// Take a free slot, or `None` if every slot is in use.
    pub fn pop_atomic(&self) -> Option<u32> {
        let mut head = self.head.load(Ordering::Acquire);

        loop {
            let (tag, index) = unpack(head);
            if index == NIL {
                return None;
            }

            // A stale read is harmless: the tag makes the CAS below fail
            let next = self.links[index as usize].load(Ordering::Relaxed);

            match self.head.compare_exchange_weak(
                head,
                pack(tag.wrapping_add(1), next),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.available.fetch_sub(1, Ordering::Relaxed);
                    return Some(index);
                }
                Err(current) => head = current,
            }
        }
    }

    /// Return a slot taken with [`pop_atomic`](Self::pop_atomic).
    ///
    /// Pushing an index that is already free corrupts the list.
    pub fn push_atomic(&self, index: u32) {
        debug_assert!((index as usize) < self.slots.len(), "slot {index} out of range");

        // Counted before the index is published: a pop can only take it after
        // this, so the counter never drops below zero
        self.available.fetch_add(1, Ordering::Relaxed);

        let mut head = self.head.load(Ordering::Relaxed);

        loop {
            let (tag, first) = unpack(head);
            debug_assert_ne!(first, index, "slot {index} pushed twice");
            self.links[index as usize].store(first, Ordering::Relaxed);

            match self.head.compare_exchange_weak(
                head,
                pack(tag.wrapping_add(1), index),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(current) => head = current,
            }
        }
    }

    #[inline]
    pub fn slot(&self, index: u32) -> &T {
        &self.slots[index as usize]
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Approximate number of free slots, never more than the capacity
    #[inline]
    pub fn available(&self) -> usize {
        self.available.load(Ordering::Relaxed)
    }
}
