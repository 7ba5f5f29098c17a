//! Lock-free intake stack
//!
//! Multi-producer, single-consumer intrusive stack. Producers push with a CAS
//! loop; the consumer detaches the whole chain with one atomic swap and
//! reverses it, so it sees records oldest-first.
//!
//! Only the drain clears the head, and a node's link is only written by the
//! thread that currently owns the node, so a push racing a drain never
//! corrupts the chain: it lands either in the detached batch or in the next one.

use std::marker::PhantomData;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

use crossbeam_utils::CachePadded;

/// A node that carries its own intake link
///
/// # Safety
///
/// `link` must always return the same field of `self`, and nothing but an
/// [`IntakeStack`] may write to it while the node is pushed.
pub unsafe trait Linked: Sized {
    fn link(&self) -> &AtomicPtr<Self>;
}

pub struct IntakeStack<T: Linked> {
    head: CachePadded<AtomicPtr<T>>,
}

impl<T: Linked> IntakeStack<T> {
    pub const fn new() -> Self {
        Self {
            head: CachePadded::new(AtomicPtr::new(ptr::null_mut())),
        }
    }

    /// Push a node. Safe to call from any number of threads concurrently.
    ///
    /// # Safety
    ///
    /// - `node` must stay valid until it has been drained and processed
    /// - `node` must not currently be in this or any other stack
    pub unsafe fn push_atomic(&self, node: NonNull<T>) {
        // SAFETY: the caller guarantees node is valid
        let link = unsafe { node.as_ref() }.link();
        let mut head = self.head.load(Ordering::Relaxed);

        loop {
            link.store(head, Ordering::Relaxed);

            match self.head.compare_exchange_weak(
                head,
                node.as_ptr(),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(current) => head = current,
            }
        }
    }

    /// Detach everything pushed so far and return it oldest-first.
    ///
    /// Nodes pushed after the swap go to the next drain.
    pub fn pop_all_reversed(&self) -> Batch<T> {
        let mut node = self.head.swap(ptr::null_mut(), Ordering::Acquire);
        let mut reversed: *mut T = ptr::null_mut();

        while !node.is_null() {
            // SAFETY: every node in the detached chain is owned by us now
            let link = unsafe { (*node).link() };
            let next = link.load(Ordering::Relaxed);
            link.store(reversed, Ordering::Relaxed);
            reversed = node;
            node = next;
        }

        Batch {
            cursor: reversed,
            _marker: PhantomData,
        }
    }

    /// Racy emptiness check, for diagnostics
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed).is_null()
    }
}

impl<T: Linked> Default for IntakeStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A drained, oldest-first chain of nodes
///
/// The iterator reads a node's successor before handing the node out, so the
/// consumer may release a node as soon as it receives it.
pub struct Batch<T: Linked> {
    cursor: *mut T,
    _marker: PhantomData<*mut T>,
}

impl<T: Linked> Batch<T> {
    /// Node the next call to `next` will return
    #[inline]
    pub fn upcoming(&self) -> Option<NonNull<T>> {
        NonNull::new(self.cursor)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cursor.is_null()
    }
}

impl<T: Linked> Iterator for Batch<T> {
    type Item = NonNull<T>;

    fn next(&mut self) -> Option<NonNull<T>> {
        let node = NonNull::new(self.cursor)?;
        // SAFETY: nodes in a batch stay valid at least until they are yielded
        self.cursor = unsafe { node.as_ref() }.link().load(Ordering::Relaxed);
        Some(node)
    }
}
