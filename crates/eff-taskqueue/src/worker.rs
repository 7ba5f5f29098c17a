//! Worker threads
//!
//! One worker per lane:
//!
//! ```text
//! WaitingForWork ──signal──▶ Draining ──▶ Processing ──┐
//!       ▲                                              │
//!       └──────────────────────────────────────────────┘
//!                          (stop task ends the loop)
//! ```

use std::ptr::NonNull;
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};

use eff_audio::PriorityResult;
use eff_core::HostNotifier;
use log::{debug, warn};

use crate::config::TaskQueueConfig;
use crate::error::{TaskQueueError, TaskQueueResult};
use crate::free_list::FreeList;
use crate::handlers::{self, Flow};
use crate::intake::{Batch, IntakeStack};
use crate::record::{Origin, TaskRecord};
use crate::semaphore::{CompletionSignal, WorkSemaphore};
use crate::stats::QueueStats;
use crate::task::Lane;

/// Everything one lane's worker and its submitters share
pub(crate) struct LaneState {
    pub(crate) lane: Lane,
    pub(crate) intake: IntakeStack<TaskRecord>,
    pub(crate) work_queued: WorkSemaphore,
    pub(crate) task_completed: CompletionSignal,
    /// Set by the worker itself before it processes anything
    pub(crate) worker: OnceLock<ThreadId>,
    /// Outcome of the real-time promotion, if one was attempted
    pub(crate) priority: OnceLock<PriorityResult>,
}

impl LaneState {
    fn new(lane: Lane) -> Self {
        Self {
            lane,
            intake: IntakeStack::new(),
            work_queued: WorkSemaphore::new(),
            task_completed: CompletionSignal::new(),
            worker: OnceLock::new(),
            priority: OnceLock::new(),
        }
    }

    /// Whether the calling thread is this lane's worker
    pub(crate) fn is_worker_thread(&self) -> bool {
        self.worker.get() == Some(&thread::current().id())
    }
}

pub(crate) struct Shared {
    pub(crate) realtime: LaneState,
    pub(crate) non_realtime: LaneState,
    /// Non-real-time lane only
    pub(crate) free_list: FreeList<TaskRecord>,
    pub(crate) host: Arc<dyn HostNotifier>,
    pub(crate) stats: QueueStats,
    pub(crate) config: TaskQueueConfig,
}

impl Shared {
    pub(crate) fn new(config: TaskQueueConfig, host: Arc<dyn HostNotifier>) -> Self {
        Self {
            realtime: LaneState::new(Lane::RealTime),
            non_realtime: LaneState::new(Lane::NonRealTime),
            free_list: FreeList::new(config.free_list_capacity, TaskRecord::pooled),
            host,
            stats: QueueStats::default(),
            config,
        }
    }

    #[inline]
    pub(crate) fn lane(&self, lane: Lane) -> &LaneState {
        match lane {
            Lane::RealTime => &self.realtime,
            Lane::NonRealTime => &self.non_realtime,
        }
    }

    /// Hand an asynchronous record back once its task has run.
    ///
    /// # Safety
    ///
    /// `record` must be an asynchronous record owned by the caller. It is
    /// invalid after this returns.
    unsafe fn retire_async(&self, record: NonNull<TaskRecord>) {
        // SAFETY: owned per the caller's contract
        let origin = unsafe { record.as_ref() }.origin();

        match origin {
            Origin::Pool(index) => {
                // Drop the payload before the slot becomes visible to submitters
                drop(unsafe { record.as_ref().take_command() });
                self.free_list.push_atomic(index);
                self.stats.record_recycled();
            }
            Origin::Overflow => {
                // SAFETY: overflow records are leaked boxes, freed exactly once here
                drop(unsafe { Box::from_raw(record.as_ptr()) });
                self.stats.record_overflow_freed();
            }
            Origin::Caller => {
                debug_assert!(false, "synchronous record retired as asynchronous");
            }
        }
    }

    /// Free whatever is still queued once both workers have exited.
    pub(crate) fn reclaim(&self) {
        for state in [&self.realtime, &self.non_realtime] {
            for record in state.intake.pop_all_reversed() {
                // SAFETY: the workers are gone, so drained records are ours
                let rec = unsafe { record.as_ref() };

                if rec.is_sync() {
                    warn!(
                        "TaskQueue: synchronous {} task still queued on the {} lane at teardown",
                        unsafe { rec.kind() }.map_or("empty", |k| k.name()),
                        state.lane
                    );
                    continue;
                }

                debug!(
                    "TaskQueue: discarding unprocessed {} task",
                    unsafe { rec.kind() }.map_or("empty", |k| k.name())
                );
                unsafe { self.retire_async(record) };
            }
        }

        let free = std::iter::from_fn(|| self.free_list.pop_atomic()).count();
        if free != self.free_list.capacity() {
            warn!(
                "TaskQueue: {} of {} task records were still in use at teardown",
                self.free_list.capacity() - free,
                self.free_list.capacity()
            );
        }
    }
}

pub(crate) fn spawn(shared: &Arc<Shared>, lane: Lane) -> TaskQueueResult<JoinHandle<()>> {
    let name = match lane {
        Lane::RealTime => shared.config.realtime_thread_name.clone(),
        Lane::NonRealTime => shared.config.non_realtime_thread_name.clone(),
    };
    let handle = thread::Builder::new()
        .name(name)
        .spawn({
            let shared = Arc::clone(shared);
            move || run(&shared, lane)
        })
        .map_err(|source| TaskQueueError::WorkerSpawn { lane, source })?;

    // Before the queue is handed out, so every signal can see the waiter
    shared.lane(lane).work_queued.register_waiter(handle.thread().clone());

    Ok(handle)
}

fn run(shared: &Shared, lane: Lane) {
    let state = shared.lane(lane);

    let _ = state.worker.set(thread::current().id());

    if lane.is_realtime() && shared.config.promote_realtime_worker {
        let result = eff_audio::promote_current_thread(&shared.config.realtime_policy);
        if !result.is_success() {
            warn!("TaskQueue: realtime worker runs without the time-constraint class ({result:?})");
        }
        let _ = state.priority.set(result);
    }

    debug!("TaskQueue: {lane} worker started");

    loop {
        state.work_queued.wait();

        let mut batch = state.intake.pop_all_reversed();

        while let Some(record) = batch.next() {
            // SAFETY: drained records belong to this worker until completed or retired
            let rec = unsafe { record.as_ref() };

            debug_assert!(!rec.is_complete(), "task record processed twice");
            debug_assert_ne!(batch.upcoming(), Some(record), "task record linked to itself");

            let flow = unsafe { handlers::process(shared, state, rec) };

            if rec.is_sync() {
                shared.stats.lane(lane).record_sync_completed();
                // SAFETY: `rec` is not used past this point
                unsafe { TaskRecord::complete(record, &state.task_completed) };
            } else {
                unsafe { shared.retire_async(record) };
            }

            if flow == Flow::Stop {
                requeue(state, batch);
                debug!("TaskQueue: {lane} worker stopped");
                return;
            }
        }
    }
}

/// Put the rest of a batch back so teardown can free it.
fn requeue(state: &LaneState, batch: Batch<TaskRecord>) {
    for record in batch {
        // SAFETY: these records came out of this stack and were not processed
        unsafe { state.intake.push_atomic(record) };
    }
}
