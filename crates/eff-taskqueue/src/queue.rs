//! The task queue: submission API, construction and teardown

use std::ptr::NonNull;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use eff_audio::PriorityResult;
use eff_core::{
    AudioObjectId, ClientId, ClientIo, HostNotifier, PropertySelector, ShadowMapSwapper,
    ShadowMaps,
};
use log::{debug, error, warn};

use crate::config::TaskQueueConfig;
use crate::error::TaskQueueResult;
use crate::record::TaskRecord;
use crate::stats::QueueStatsSnapshot;
use crate::task::{Command, Lane, Task};
use crate::worker::{self, Shared};

/// Dual-lane control task queue
///
/// Owns a real-time and a non-real-time worker thread. Dropping the queue
/// stops and joins both.
///
/// ```no_run
/// use std::sync::Arc;
/// use eff_core::{AudioObjectId, PropertyAddress, HostNotifier, PropertySelector};
/// use eff_taskqueue::{TaskQueue, TaskQueueConfig};
///
/// struct Host;
/// impl HostNotifier for Host {
///     fn properties_changed(&self, _: AudioObjectId, _: &[PropertyAddress]) {}
/// }
///
/// let queue = TaskQueue::new(TaskQueueConfig::default(), Arc::new(Host))?;
/// queue.queue_async_send_property_notification(
///     PropertySelector::DEVICE_IS_RUNNING,
///     AudioObjectId::DEVICE,
/// );
/// # Ok::<(), eff_taskqueue::TaskQueueError>(())
/// ```
pub struct TaskQueue {
    shared: Arc<Shared>,
    realtime_worker: Option<JoinHandle<()>>,
    non_realtime_worker: Option<JoinHandle<()>>,
}

impl TaskQueue {
    /// Validate `config`, pre-allocate the free list and start both workers.
    pub fn new(config: TaskQueueConfig, host: Arc<dyn HostNotifier>) -> TaskQueueResult<Self> {
        config.validate()?;

        debug!(
            "TaskQueue::new: {} pre-allocated task records, sync wait timeout {:?}",
            config.free_list_capacity,
            config.sync_wait_timeout()
        );

        // A failed spawn drops `queue`, which stops any worker already running
        let mut queue = Self {
            shared: Arc::new(Shared::new(config, host)),
            realtime_worker: None,
            non_realtime_worker: None,
        };
        queue.realtime_worker = Some(worker::spawn(&queue.shared, Lane::RealTime)?);
        queue.non_realtime_worker = Some(worker::spawn(&queue.shared, Lane::NonRealTime)?);

        Ok(queue)
    }

    /// Run `task` on `lane` and block until it has been processed.
    ///
    /// Returns the value the handler produced, if any.
    ///
    /// Must not be called from `lane`'s own worker.
    pub fn queue_sync(&self, task: Task, lane: Lane) -> Option<u64> {
        debug_assert!(
            task.kind().runs_on(lane),
            "{} task queued on the {lane} lane",
            task.kind()
        );
        self.submit_sync(Command::Run(task), lane)
    }

    fn submit_sync(&self, command: Command, lane: Lane) -> Option<u64> {
        let state = self.shared.lane(lane);
        debug_assert!(
            !state.is_worker_thread(),
            "queue_sync called from the {lane} worker itself"
        );

        let kind = command.kind();
        let record = TaskRecord::new_sync(command);

        debug!("TaskQueue::queue_sync: queueing {kind} on the {lane} lane");

        // SAFETY: `record` stays in this frame, unmoved, until RELEASED
        unsafe { state.intake.push_atomic(NonNull::from(&record)) };
        state.work_queued.signal();

        let timeout = self.shared.config.sync_wait_timeout();
        let started = Instant::now();
        let mut late = false;

        while !record.is_complete() {
            state.task_completed.wait_timeout(timeout);

            if !late && !record.is_complete() && started.elapsed() >= timeout {
                late = true;
                self.shared.stats.lane(lane).record_late_sync_wait();

                if lane.is_realtime() {
                    warn!("TaskQueue::queue_sync: {kind} task taking longer than expected");
                } else {
                    debug!("TaskQueue::queue_sync: still waiting for {kind} on the {lane} lane");
                }
            }
        }

        // The worker may still be inside the wake call
        record.wait_released();

        if late {
            debug!("TaskQueue::queue_sync: late {kind} task finished after {:?}", started.elapsed());
        }

        let value = record.return_value();
        debug!("TaskQueue::queue_sync: {kind} returned {value:?}");
        value
    }

    /// Run `task` on the non-real-time lane without waiting.
    ///
    /// Uses a pre-allocated record when one is free, otherwise allocates.
    pub fn queue_async(&self, task: Task) {
        debug_assert!(
            task.kind().runs_on(Lane::NonRealTime),
            "{} task queued asynchronously",
            task.kind()
        );

        let shared = &*self.shared;
        let command = Command::Run(task);

        let record = match shared.free_list.pop_atomic() {
            Some(index) => {
                let slot = shared.free_list.slot(index);
                // SAFETY: the slot is ours until the worker recycles it
                unsafe { slot.refill(command) };
                NonNull::from(slot)
            }
            None => {
                warn!(
                    "TaskQueue::queue_async: No pre-allocated tasks left in the free list. \
                     Allocating new task."
                );
                shared.stats.record_overflow_allocation();
                let boxed = Box::new(TaskRecord::overflow(command));
                // SAFETY: Box::into_raw never returns null
                unsafe { NonNull::new_unchecked(Box::into_raw(boxed)) }
            }
        };

        // SAFETY: pool slots and overflow records stay valid until retired by
        // the worker or by teardown
        unsafe { shared.non_realtime.intake.push_atomic(record) };
        shared.non_realtime.work_queued.signal();
    }

    /// Swap the registry's prepared shadow maps in on the real-time worker
    /// and wait for it to happen.
    pub fn queue_sync_swap_client_shadow_maps(&self, maps: Arc<dyn ShadowMaps>) {
        self.queue_sync(Task::SwapClientShadowMaps(maps), Lane::RealTime);
    }

    /// Tell the host, from the non-real-time worker, that `property` of
    /// `object_id` changed.
    pub fn queue_async_send_property_notification(
        &self,
        property: PropertySelector,
        object_id: AudioObjectId,
    ) {
        self.queue_async(Task::SendPropertyNotification {
            property,
            object_id,
        });
    }

    /// Start or stop IO for a client on the non-real-time worker.
    ///
    /// When `sync`, returns whether the device's IO state changed (first start
    /// or last stop). Always `false` when async.
    pub fn queue_update_client_io_state(
        &self,
        sync: bool,
        clients: Arc<dyn ClientIo>,
        client_id: ClientId,
        doing_io: bool,
    ) -> bool {
        let task = if doing_io {
            Task::StartClientIo { clients, client_id }
        } else {
            Task::StopClientIo { clients, client_id }
        };

        if sync {
            self.queue_sync(task, Lane::NonRealTime)
                .is_some_and(|changed| changed != 0)
        } else {
            self.queue_async(task);
            false
        }
    }

    pub fn stats(&self) -> QueueStatsSnapshot {
        self.shared.stats.snapshot(self.shared.free_list.available())
    }

    /// Outcome of the real-time worker's promotion.
    ///
    /// `None` until the worker has started, and when promotion is disabled.
    pub fn realtime_priority(&self) -> Option<PriorityResult> {
        self.shared.realtime.priority.get().copied()
    }

    pub fn config(&self) -> &TaskQueueConfig {
        &self.shared.config
    }

    /// Pre-allocated records currently free
    pub fn free_slots(&self) -> usize {
        self.shared.free_list.available()
    }

    fn stop_worker(&self, lane: Lane, handle: JoinHandle<()>) {
        // A worker that already died would never answer the stop task
        if !handle.is_finished() {
            self.submit_sync(Command::StopWorkerThread, lane);
        }

        if handle.join().is_err() {
            error!("TaskQueue: {lane} worker panicked");
        }
    }
}

impl ShadowMapSwapper for TaskQueue {
    fn swap_shadow_maps(&self, maps: Arc<dyn ShadowMaps>) {
        self.queue_sync_swap_client_shadow_maps(maps);
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        debug!("TaskQueue::drop: stopping workers");

        if let Some(handle) = self.realtime_worker.take() {
            self.stop_worker(Lane::RealTime, handle);
        }
        if let Some(handle) = self.non_realtime_worker.take() {
            self.stop_worker(Lane::NonRealTime, handle);
        }

        self.shared.reclaim();
    }
}
