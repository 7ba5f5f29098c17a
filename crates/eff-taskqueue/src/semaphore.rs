//! Wait/wake primitives for the worker lanes
//!
//! Both primitives are atomics plus thread park/unpark, which the standard
//! library implements without a mutex (futex, ulock, WaitOnAddress), so the
//! real-time worker can use them freely.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, Thread};
use std::time::Duration;

use crossbeam_utils::CachePadded;

/// Counting semaphore with a single waiting thread
///
/// Any thread may `signal`. Only the registered thread may `wait`. Register
/// it before anything can signal, or a wake-up may go unnoticed until the
/// next signal.
pub struct WorkSemaphore {
    permits: CachePadded<AtomicUsize>,
    waiter: OnceLock<Thread>,
}

impl WorkSemaphore {
    pub const fn new() -> Self {
        Self {
            permits: CachePadded::new(AtomicUsize::new(0)),
            waiter: OnceLock::new(),
        }
    }

    /// Set the thread that waits on this semaphore.
    ///
    /// Returns `false` if a waiter was already registered.
    pub fn register_waiter(&self, waiter: Thread) -> bool {
        self.waiter.set(waiter).is_ok()
    }

    /// Add a permit and wake the waiter.
    pub fn signal(&self) {
        self.permits.fetch_add(1, Ordering::Release);

        if let Some(waiter) = self.waiter.get() {
            waiter.unpark();
        }
    }

    /// Take a permit without blocking.
    pub fn try_acquire(&self) -> bool {
        let mut current = self.permits.load(Ordering::Acquire);

        while current > 0 {
            match self.permits.compare_exchange_weak(
                current,
                current - 1,
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }

        false
    }

    /// Block until a permit is available, then take it.
    pub fn wait(&self) {
        // The waiter may not be registered yet; nothing signals until it is
        debug_assert!(
            self.waiter
                .get()
                .is_none_or(|w| w.id() == thread::current().id()),
            "WorkSemaphore::wait called from a thread that is not the registered waiter"
        );

        // park() may return spuriously or on a stale unpark; the permit count
        // is the only source of truth
        while !self.try_acquire() {
            thread::park();
        }
    }

    /// Permits currently available
    #[inline]
    pub fn permits(&self) -> usize {
        self.permits.load(Ordering::Relaxed)
    }
}

impl Default for WorkSemaphore {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-lane "task completed" signal
///
/// Wakes exactly the thread that submitted the finished record rather than
/// every waiter on the lane. Waiters still re-check their own record after
/// each wake, since a park can end spuriously or on an old unpark.
pub struct CompletionSignal {
    notified: CachePadded<AtomicU64>,
}

impl CompletionSignal {
    pub const fn new() -> Self {
        Self {
            notified: CachePadded::new(AtomicU64::new(0)),
        }
    }

    pub fn notify(&self, waiter: &Thread) {
        self.notified.fetch_add(1, Ordering::Relaxed);
        waiter.unpark();
    }

    /// Sleep until notified or until `timeout` elapses, whichever comes first.
    ///
    /// This parks the calling thread; it does not wait on `self`. The park
    /// token is the thread's own, shared with any other parking that thread
    /// does, so an unpark meant for something else can end the wait early and
    /// one of ours can end someone else's. Callers must re-check their record.
    #[inline]
    pub fn wait_timeout(&self, timeout: Duration) {
        thread::park_timeout(timeout);
    }

    /// Number of notifications sent so far
    #[inline]
    pub fn notified(&self) -> u64 {
        self.notified.load(Ordering::Relaxed)
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::time::Instant;

    #[test]
    fn test_permits_are_counted() {
        let sem = WorkSemaphore::new();
        sem.signal();
        sem.signal();
        sem.signal();
        assert_eq!(sem.permits(), 3);

        assert!(sem.try_acquire());
        assert!(sem.try_acquire());
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
    }

    #[test]
    fn test_signal_before_register_is_not_lost() {
        let sem = Arc::new(WorkSemaphore::new());
        sem.signal();

        let waiter = {
            let sem = Arc::clone(&sem);
            thread::spawn(move || {
                assert!(sem.register_waiter(thread::current()));
                sem.wait();
            })
        };

        waiter.join().unwrap();
        assert_eq!(sem.permits(), 0);
    }

    #[test]
    fn test_cross_thread_wake() {
        let sem = Arc::new(WorkSemaphore::new());
        let registered = Arc::new(AtomicBool::new(false));
        let woke = Arc::new(AtomicBool::new(false));

        let waiter = {
            let sem = Arc::clone(&sem);
            let registered = Arc::clone(&registered);
            let woke = Arc::clone(&woke);
            thread::spawn(move || {
                sem.register_waiter(thread::current());
                registered.store(true, Ordering::Release);
                sem.wait();
                woke.store(true, Ordering::Release);
            })
        };

        while !registered.load(Ordering::Acquire) {
            thread::yield_now();
        }
        thread::sleep(Duration::from_millis(10));
        assert!(!woke.load(Ordering::Acquire));

        sem.signal();
        waiter.join().unwrap();
        assert!(woke.load(Ordering::Acquire));
    }

    #[test]
    fn test_second_registration_is_rejected() {
        let sem = WorkSemaphore::new();
        assert!(sem.register_waiter(thread::current()));
        assert!(!sem.register_waiter(thread::current()));
    }

    #[test]
    fn test_completion_signal_wakes_target() {
        let signal = Arc::new(CompletionSignal::new());
        let done = Arc::new(AtomicBool::new(false));

        let waiter = {
            let signal = Arc::clone(&signal);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let start = Instant::now();
                while !done.load(Ordering::Acquire) {
                    signal.wait_timeout(Duration::from_secs(5));
                }
                start.elapsed()
            })
        };

        thread::sleep(Duration::from_millis(5));
        done.store(true, Ordering::Release);
        signal.notify(waiter.thread());

        let elapsed = waiter.join().unwrap();
        assert!(elapsed < Duration::from_secs(5));
        assert_eq!(signal.notified(), 1);
    }

    #[test]
    fn test_completion_wait_shares_the_thread_park_token() {
        let signal = Arc::new(CompletionSignal::new());
        let done = Arc::new(AtomicBool::new(false));

        let waiter = {
            let signal = Arc::clone(&signal);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let start = Instant::now();
                while !done.load(Ordering::Acquire) {
                    signal.wait_timeout(Duration::from_secs(5));
                }
                start.elapsed()
            })
        };

        thread::sleep(Duration::from_millis(5));
        done.store(true, Ordering::Release);
        // A plain unpark, not a notification, still ends the wait
        waiter.thread().unpark();

        let elapsed = waiter.join().unwrap();
        assert!(elapsed < Duration::from_secs(5));
        assert_eq!(signal.notified(), 0);
    }
}
