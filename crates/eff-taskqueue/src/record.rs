//! Task records
//!
//! A record is the unit that travels through an intake stack. Synchronous
//! records live in the submitting call frame; asynchronous ones live in the
//! free-list arena or, when the arena is exhausted, in an overflow allocation.
//!
//! Completion is a three-step handshake so the worker never touches a record
//! its owner may already have dropped:
//!
//! ```text
//! PENDING ──mark_completed──▶ COMPLETED ──(waiter unparked)──▶ RELEASED
//! ```
//!
//! The submitter stops waiting once it sees COMPLETED, but only returns (and
//! drops the record) after RELEASED.

use std::cell::UnsafeCell;
use std::ptr::{self, NonNull};
use std::sync::atomic::{self, AtomicPtr, AtomicU8, Ordering};
use std::thread::{self, Thread};

use crossbeam_utils::Backoff;

use crate::intake::Linked;
use crate::semaphore::CompletionSignal;
use crate::task::{Command, TaskKind};

const PENDING: u8 = 0;
const COMPLETED: u8 = 1;
const RELEASED: u8 = 2;

/// Where a record's memory comes from, which decides how it is retired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    /// Stack of a `queue_sync` caller
    Caller,
    /// Free-list arena slot
    Pool(u32),
    /// Heap allocation made when the arena was exhausted
    Overflow,
}

pub(crate) struct TaskRecord {
    command: UnsafeCell<Option<Command>>,
    is_sync: bool,
    origin: Origin,
    state: AtomicU8,
    return_value: UnsafeCell<Option<u64>>,
    /// Thread blocked in `queue_sync` on this record
    waiter: Option<Thread>,
    link: AtomicPtr<TaskRecord>,
}

// SAFETY: the UnsafeCell fields are only accessed by the thread that owns the
// record at that moment (submitter before push, worker between drain and
// completion, submitter again after RELEASED). Ownership changes hands through
// the intake stack's release/acquire pair or the state word.
unsafe impl Sync for TaskRecord {}

unsafe impl Linked for TaskRecord {
    fn link(&self) -> &AtomicPtr<Self> {
        &self.link
    }
}

impl TaskRecord {
    fn with(command: Option<Command>, is_sync: bool, origin: Origin, waiter: Option<Thread>) -> Self {
        Self {
            command: UnsafeCell::new(command),
            is_sync,
            origin,
            state: AtomicU8::new(PENDING),
            return_value: UnsafeCell::new(None),
            waiter,
            link: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Record for a blocking submission from the calling thread
    pub(crate) fn new_sync(command: Command) -> Self {
        Self::with(Some(command), true, Origin::Caller, Some(thread::current()))
    }

    /// Empty arena slot
    pub(crate) fn pooled(index: u32) -> Self {
        Self::with(None, false, Origin::Pool(index), None)
    }

    /// Asynchronous record allocated outside the arena
    pub(crate) fn overflow(command: Command) -> Self {
        Self::with(Some(command), false, Origin::Overflow, None)
    }

    #[inline]
    pub(crate) fn is_sync(&self) -> bool {
        self.is_sync
    }

    #[inline]
    pub(crate) fn origin(&self) -> Origin {
        self.origin
    }

    #[inline]
    pub(crate) fn is_complete(&self) -> bool {
        self.state.load(Ordering::Acquire) != PENDING
    }

    /// Load an arena slot with a new command.
    ///
    /// # Safety
    ///
    /// The caller must own the slot (popped from the free list, not yet pushed).
    pub(crate) unsafe fn refill(&self, command: Command) {
        debug_assert!(matches!(self.origin, Origin::Pool(_)));
        unsafe {
            *self.command.get() = Some(command);
            *self.return_value.get() = None;
        }
        self.link.store(ptr::null_mut(), Ordering::Relaxed);
    }

    /// # Safety
    ///
    /// The caller must own the record (worker between drain and completion).
    pub(crate) unsafe fn command(&self) -> Option<&Command> {
        unsafe { (*self.command.get()).as_ref() }
    }

    /// # Safety
    ///
    /// Same as [`command`](Self::command), and no reference obtained from it
    /// may still be alive.
    pub(crate) unsafe fn take_command(&self) -> Option<Command> {
        unsafe { (*self.command.get()).take() }
    }

    /// Kind of the loaded command, for diagnostics
    ///
    /// # Safety
    ///
    /// Same as [`command`](Self::command).
    pub(crate) unsafe fn kind(&self) -> Option<TaskKind> {
        unsafe { self.command() }.map(Command::kind)
    }

    /// # Safety
    ///
    /// Only the worker processing the record may write the result.
    pub(crate) unsafe fn set_return_value(&self, value: Option<u64>) {
        unsafe { *self.return_value.get() = value };
    }

    /// Result written by the handler; absent until the record completes.
    pub(crate) fn return_value(&self) -> Option<u64> {
        if !self.is_complete() {
            return None;
        }
        // SAFETY: the acquire in is_complete pairs with the worker's release,
        // and the worker never writes the result after completion
        unsafe { *self.return_value.get() }
    }

    fn mark_completed(&self) {
        let previous = self.state.swap(COMPLETED, Ordering::Release);
        debug_assert_eq!(previous, PENDING, "task record completed twice");
    }

    /// Finish a synchronous record and wake its submitter.
    ///
    /// # Safety
    ///
    /// `record` must be a synchronous record the calling worker is processing.
    /// It must not be used after this returns: its owner may drop it.
    pub(crate) unsafe fn complete(record: NonNull<TaskRecord>, signal: &CompletionSignal) {
        let record = unsafe { record.as_ref() };
        debug_assert!(record.is_sync);

        // Publish everything the handler wrote before the flag flips
        atomic::fence(Ordering::Release);
        record.mark_completed();

        if let Some(waiter) = &record.waiter {
            signal.notify(waiter);
        }

        // Last access: from here on the submitter may return and drop it
        record.state.store(RELEASED, Ordering::Release);
    }

    /// Spin until the worker has let go of a completed record.
    ///
    /// The window is the length of one unpark call, so spinning is cheaper
    /// than parking.
    pub(crate) fn wait_released(&self) {
        let backoff = Backoff::new();
        while self.state.load(Ordering::Acquire) != RELEASED {
            backoff.snooze();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use eff_core::{AudioObjectId, PropertySelector};

    fn notification() -> Command {
        Command::Run(Task::SendPropertyNotification {
            property: PropertySelector::DEVICE_IS_RUNNING,
            object_id: AudioObjectId::DEVICE,
        })
    }

    #[test]
    fn test_new_sync_record_is_pending() {
        let record = TaskRecord::new_sync(notification());
        assert!(record.is_sync());
        assert_eq!(record.origin(), Origin::Caller);
        assert!(!record.is_complete());
        assert_eq!(record.return_value(), None);
        assert_eq!(unsafe { record.kind() }, Some(TaskKind::SendPropertyNotification));
    }

    #[test]
    fn test_completion_publishes_return_value() {
        let record = TaskRecord::new_sync(Command::StopWorkerThread);
        let signal = CompletionSignal::new();

        unsafe {
            record.set_return_value(Some(42));
            TaskRecord::complete(NonNull::from(&record), &signal);
        }

        assert!(record.is_complete());
        record.wait_released();
        assert_eq!(record.return_value(), Some(42));
        assert_eq!(signal.notified(), 1);
    }

    #[test]
    fn test_pooled_slot_refill_clears_previous_result() {
        let slot = TaskRecord::pooled(3);
        assert!(!slot.is_sync());
        assert_eq!(slot.origin(), Origin::Pool(3));
        assert!(unsafe { slot.command() }.is_none());

        unsafe {
            slot.set_return_value(Some(1));
            slot.refill(notification());
        }
        assert!(unsafe { slot.command() }.is_some());
        assert_eq!(unsafe { *slot.return_value.get() }, None);

        assert!(unsafe { slot.take_command() }.is_some());
        assert!(unsafe { slot.command() }.is_none());
    }
}
