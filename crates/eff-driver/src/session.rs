//! Scripted client session
//!
//! Registers clients, cycles their IO on and off (alternating sync and async
//! rounds), notifies the host whenever the device starts or stops, and ends
//! with a task queued for a client that has already left.

use std::sync::Arc;

use anyhow::{Context, Result};
use eff_clients::{Client, ClientRegistry, RecordingHost};
use eff_core::{AudioObjectId, ClientId, ClientIo, PropertySelector};
use eff_taskqueue::{QueueStatsSnapshot, TaskQueue, TaskQueueConfig};
use serde::Serialize;

pub struct SessionPlan {
    pub clients: u32,
    pub rounds: u32,
}

#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub realtime_priority: Option<String>,
    pub device_started: u32,
    pub device_stopped: u32,
    pub notifications: usize,
    pub shadow_map_swaps: u64,
    pub queue: QueueStatsSnapshot,
}

pub fn run(config: TaskQueueConfig, plan: &SessionPlan) -> Result<SessionReport> {
    let host = Arc::new(RecordingHost::new());
    let queue = TaskQueue::new(config, host.clone()).context("starting task queue")?;
    let registry = ClientRegistry::new();
    let clients: Arc<dyn ClientIo> = registry.clone();

    let ids: Vec<ClientId> = (1..=plan.clients).map(ClientId).collect();
    for &id in &ids {
        registry.add_client(Client::new(id, 1000 + id.0 as i32), &queue)?;
    }

    let mut device_started = 0;
    let mut device_stopped = 0;

    for round in 0..plan.rounds {
        let sync = round % 2 == 0;
        log::debug!("Round {round} ({})", if sync { "sync" } else { "async" });

        for &id in &ids {
            if queue.queue_update_client_io_state(sync, clients.clone(), id, true) {
                device_started += 1;
                notify_device_running(&queue);
            }
        }
        for &id in &ids {
            if queue.queue_update_client_io_state(sync, clients.clone(), id, false) {
                device_stopped += 1;
                notify_device_running(&queue);
            }
        }
    }

    if let Some(&leaving) = ids.last() {
        // Sync, so the last async round has run before the client goes away
        queue.queue_update_client_io_state(true, clients.clone(), leaving, false);
        registry.remove_client(leaving, &queue)?;
        // Fails in the worker with InvalidClient, which is swallowed
        queue.queue_update_client_io_state(false, clients.clone(), leaving, true);
    }

    // Nothing is queued behind this, so every earlier task has run when it returns
    queue.queue_update_client_io_state(true, clients, ClientId(0), false);

    let report = SessionReport {
        realtime_priority: queue.realtime_priority().map(|p| format!("{p:?}")),
        device_started,
        device_stopped,
        notifications: host.len(),
        shadow_map_swaps: registry.swap_count(),
        queue: queue.stats(),
    };

    log::info!(
        "Session finished: {} tasks on the realtime lane, {} on the non-realtime lane",
        report.queue.realtime.processed,
        report.queue.non_realtime.processed
    );

    Ok(report)
}

fn notify_device_running(queue: &TaskQueue) {
    queue.queue_async_send_property_notification(
        PropertySelector::DEVICE_IS_RUNNING,
        AudioObjectId::DEVICE,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_session() {
        let config = TaskQueueConfig {
            promote_realtime_worker: false,
            ..TaskQueueConfig::default()
        };
        let report = run(
            config,
            &SessionPlan {
                clients: 3,
                rounds: 2,
            },
        )
        .unwrap();

        // Only the sync round reports device transitions
        assert_eq!(report.device_started, 1);
        assert_eq!(report.device_stopped, 1);
        assert_eq!(report.notifications, 2);
        // Three adds and one removal
        assert_eq!(report.shadow_map_swaps, 4);
        assert_eq!(report.realtime_priority, None);

        // The removed client's start and the final barrier, nothing from the rounds
        assert_eq!(report.queue.non_realtime.ignored_client_errors, 2);
        // One sync round of six, the pre-removal stop and the final barrier
        assert_eq!(report.queue.non_realtime.sync_completed, 8);
        assert_eq!(report.queue.overflow_allocations, 0);
    }

    #[test]
    fn test_empty_session() {
        let config = TaskQueueConfig {
            promote_realtime_worker: false,
            ..TaskQueueConfig::default()
        };
        let report = run(config, &SessionPlan { clients: 0, rounds: 3 }).unwrap();

        assert_eq!(report.device_started, 0);
        assert_eq!(report.shadow_map_swaps, 0);
        assert_eq!(report.queue.non_realtime.sync_completed, 1);
    }
}
