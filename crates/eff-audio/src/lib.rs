//! eff-audio: Scheduling support for the driver's worker threads
//!
//! The task queue's real-time worker must run in the OS's latency-critical
//! scheduling class so that the host only preempts it for equally critical
//! work. This crate wraps the platform calls needed to get there.

mod thread_priority;

pub use thread_priority::*;
