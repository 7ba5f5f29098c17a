//! eff-taskqueue: Control tasks for a live audio pipeline
//!
//! Runs short administrative tasks on one of two worker threads: a real-time
//! worker that must never block or allocate, and a non-real-time worker free to
//! do both. Callers on any thread submit tasks synchronously (block until done,
//! read the result) or asynchronously (fire-and-forget, non-real-time only).
//!
//! # Architecture
//!
//! ```text
//! any thread                       RT lane                        RT worker
//! ┌────────────┐  push_atomic  ┌─────────────┐  pop_all_reversed ┌──────────────┐
//! │ queue_sync │──────────────▶│ IntakeStack │──────────────────▶│ worker loop  │
//! │            │   signal      │ work_queued │                   │ RT handlers  │
//! │            │◀──────────────│ completed   │◀──────────────────│              │
//! └────────────┘   unpark      └─────────────┘  mark_completed   └──────────────┘
//!
//! ┌─────────────┐  pop_atomic  ┌──────────┐
//! │ queue_async │─────────────▶│ FreeList │ (non-RT lane only)
//! └─────────────┘              └──────────┘
//! ```
//!
//! # Real-Time Safety
//!
//! - No mutex anywhere reachable from the real-time worker; its waits and wakes
//!   are atomics plus thread park/unpark
//! - Synchronous records live on the caller's stack, so the real-time path
//!   neither allocates nor frees
//! - Asynchronous records come from a pre-allocated arena and are recycled

mod config;
mod error;
mod free_list;
mod handlers;
mod intake;
mod queue;
mod record;
mod semaphore;
mod stats;
mod task;
mod worker;

pub use config::*;
pub use error::*;
pub use free_list::{FreeList, MAX_FREE_LIST_CAPACITY};
pub use intake::{Batch, IntakeStack, Linked};
pub use queue::TaskQueue;
pub use semaphore::{CompletionSignal, WorkSemaphore};
pub use stats::*;
pub use task::*;
