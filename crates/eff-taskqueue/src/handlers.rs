//! Lane-specific task handlers
//!
//! The real-time handler only knows tasks that neither block nor allocate. The
//! non-real-time handler runs everything that talks to the client registry or
//! the host. Collaborator failures stop here: invalid-client errors are
//! expected (a client can disappear while its task is queued) and panics are
//! caught, so a worker never dies because of a task.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use eff_core::{ClientError, ClientResult, PropertyAddress};
use log::{debug, error, warn};

use crate::record::TaskRecord;
use crate::stats::LaneStats;
use crate::task::{Command, Lane, Task, TaskKind};
use crate::worker::{LaneState, Shared};

/// What the worker loop does after a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

/// Run one record on the calling worker and store its result.
///
/// # Safety
///
/// The calling worker must own `record` (drained it and not yet completed or
/// recycled it).
pub(crate) unsafe fn process(shared: &Shared, state: &LaneState, record: &TaskRecord) -> Flow {
    debug_assert_eq!(
        state.worker.get().copied(),
        Some(thread::current().id()),
        "{} task processed off its worker thread",
        state.lane
    );

    #[cfg(debug_assertions)]
    if state.lane.is_realtime() && state.priority.get().is_some_and(|p| p.is_success()) {
        debug_assert_eq!(
            eff_audio::current_thread_class(),
            eff_audio::SchedulingClass::TimeConstraint,
            "realtime worker lost its time-constraint class"
        );
    }

    let stats = shared.stats.lane(state.lane);
    stats.record_processed();

    // SAFETY: owned per the caller's contract
    let Some(command) = (unsafe { record.command() }) else {
        debug_assert!(false, "drained an empty task record");
        return Flow::Continue;
    };

    let (flow, value) = match state.lane {
        Lane::RealTime => process_realtime(stats, command),
        Lane::NonRealTime => process_non_realtime(shared, stats, command),
    };

    // SAFETY: as above, and only this worker writes the result
    unsafe { record.set_return_value(value) };
    flow
}

fn process_realtime(stats: &LaneStats, command: &Command) -> (Flow, Option<u64>) {
    match command {
        Command::StopWorkerThread => {
            #[cfg(debug_assertions)]
            debug!("TaskQueue: stopping the realtime worker");
            (Flow::Stop, None)
        }
        Command::Run(Task::SwapClientShadowMaps(maps)) => {
            guarded(stats, TaskKind::SwapClientShadowMaps, || {
                maps.swap_in_shadow_maps_rt()
            });
            (Flow::Continue, None)
        }
        Command::Run(task) => {
            wrong_lane(task.kind(), Lane::RealTime);
            (Flow::Continue, None)
        }
    }
}

fn process_non_realtime(
    shared: &Shared,
    stats: &LaneStats,
    command: &Command,
) -> (Flow, Option<u64>) {
    match command {
        Command::StopWorkerThread => {
            debug!("TaskQueue: stopping the non-realtime worker");
            (Flow::Stop, None)
        }
        Command::Run(Task::StartClientIo { clients, client_id }) => {
            debug!("TaskQueue: processing StartClientIO for client {client_id}");
            let outcome = guarded(stats, TaskKind::StartClientIo, || {
                clients.start_io_non_rt(*client_id)
            });
            (Flow::Continue, client_io_result(stats, TaskKind::StartClientIo, outcome))
        }
        Command::Run(Task::StopClientIo { clients, client_id }) => {
            debug!("TaskQueue: processing StopClientIO for client {client_id}");
            let outcome = guarded(stats, TaskKind::StopClientIo, || {
                clients.stop_io_non_rt(*client_id)
            });
            (Flow::Continue, client_io_result(stats, TaskKind::StopClientIo, outcome))
        }
        Command::Run(Task::SendPropertyNotification {
            property,
            object_id,
        }) => {
            debug!("TaskQueue: sending notification for {property} on object {object_id}");
            let addresses = [PropertyAddress::global(*property)];
            guarded(stats, TaskKind::SendPropertyNotification, || {
                shared.host.properties_changed(*object_id, &addresses)
            });
            (Flow::Continue, None)
        }
        Command::Run(task) => {
            wrong_lane(task.kind(), Lane::NonRealTime);
            (Flow::Continue, None)
        }
    }
}

/// Map a start/stop outcome to the record's return value.
fn client_io_result(
    stats: &LaneStats,
    kind: TaskKind,
    outcome: Option<ClientResult<bool>>,
) -> Option<u64> {
    match outcome? {
        Ok(changed) => Some(u64::from(changed)),
        Err(ClientError::InvalidClient(client_id)) => {
            stats.record_ignored_client_error();
            debug!(
                "TaskQueue: ignoring InvalidClient in {kind} for client {client_id}. \
                 Client was probably removed before this task was processed."
            );
            None
        }
        Err(err) => {
            warn!("TaskQueue: {kind} failed: {err}");
            None
        }
    }
}

fn wrong_lane(kind: TaskKind, lane: Lane) {
    debug_assert!(kind.runs_on(lane), "{kind} task sent to the {lane} worker");
    #[cfg(not(debug_assertions))]
    if lane == Lane::NonRealTime {
        error!("TaskQueue: dropping {kind} task sent to the {lane} worker");
    }
}

/// Run a collaborator call, turning a panic into "no effect".
fn guarded<R>(stats: &LaneStats, kind: TaskKind, f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            stats.record_handler_failure();
            error!("TaskQueue: {kind} task panicked: {}", panic_message(&*payload));
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eff_core::ClientId;

    #[test]
    fn test_client_io_result_mapping() {
        let stats = LaneStats::default();

        assert_eq!(client_io_result(&stats, TaskKind::StartClientIo, Some(Ok(true))), Some(1));
        assert_eq!(client_io_result(&stats, TaskKind::StopClientIo, Some(Ok(false))), Some(0));
        assert_eq!(client_io_result(&stats, TaskKind::StartClientIo, None), None);

        let invalid = Err(ClientError::InvalidClient(ClientId(7)));
        assert_eq!(client_io_result(&stats, TaskKind::StartClientIo, Some(invalid)), None);
        assert_eq!(stats.snapshot().ignored_client_errors, 1);

        let duplicate = Err(ClientError::DuplicateClient(ClientId(7)));
        assert_eq!(client_io_result(&stats, TaskKind::StartClientIo, Some(duplicate)), None);
        assert_eq!(stats.snapshot().ignored_client_errors, 1);
    }

    #[test]
    fn test_guarded_catches_panics() {
        let stats = LaneStats::default();

        assert_eq!(guarded(&stats, TaskKind::StopClientIo, || 5), Some(5));
        assert_eq!(
            guarded(&stats, TaskKind::StopClientIo, || -> u32 { panic!("registry poisoned") }),
            None
        );
        assert_eq!(stats.snapshot().handler_failures, 1);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(&*payload), "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(&*payload), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(&*payload), "<non-string panic payload>");
    }
}
