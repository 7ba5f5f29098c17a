//! Queue statistics
//!
//! Plain relaxed counters. Workers bump them on their own cache lines; readers
//! take a [`QueueStatsSnapshot`], which is only approximately consistent
//! across fields.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;
use serde::Serialize;

use crate::task::Lane;

#[derive(Debug, Default)]
pub struct LaneStats {
    /// Records dispatched to a handler, stop tasks included
    processed: AtomicU64,
    sync_completed: AtomicU64,
    /// Sync waits that timed out at least once before completing
    late_sync_waits: AtomicU64,
    /// Handler calls that panicked
    handler_failures: AtomicU64,
    /// Invalid-client errors swallowed by a handler
    ignored_client_errors: AtomicU64,
}

impl LaneStats {
    #[inline]
    pub(crate) fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_sync_completed(&self) {
        self.sync_completed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_late_sync_wait(&self) {
        self.late_sync_waits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_handler_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_ignored_client_error(&self) {
        self.ignored_client_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LaneStatsSnapshot {
        LaneStatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            sync_completed: self.sync_completed.load(Ordering::Relaxed),
            late_sync_waits: self.late_sync_waits.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            ignored_client_errors: self.ignored_client_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default)]
pub struct QueueStats {
    realtime: CachePadded<LaneStats>,
    non_realtime: CachePadded<LaneStats>,
    overflow_allocations: AtomicU64,
    overflow_freed: AtomicU64,
    /// Free-list slots returned after processing
    recycled: AtomicU64,
}

impl QueueStats {
    pub fn lane(&self, lane: Lane) -> &LaneStats {
        match lane {
            Lane::RealTime => &self.realtime,
            Lane::NonRealTime => &self.non_realtime,
        }
    }

    #[inline]
    pub(crate) fn record_overflow_allocation(&self) {
        self.overflow_allocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_overflow_freed(&self) {
        self.overflow_freed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_recycled(&self) {
        self.recycled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, free_slots: usize) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            realtime: self.realtime.snapshot(),
            non_realtime: self.non_realtime.snapshot(),
            overflow_allocations: self.overflow_allocations.load(Ordering::Relaxed),
            overflow_freed: self.overflow_freed.load(Ordering::Relaxed),
            recycled: self.recycled.load(Ordering::Relaxed),
            free_slots,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LaneStatsSnapshot {
    pub processed: u64,
    pub sync_completed: u64,
    pub late_sync_waits: u64,
    pub handler_failures: u64,
    pub ignored_client_errors: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatsSnapshot {
    pub realtime: LaneStatsSnapshot,
    pub non_realtime: LaneStatsSnapshot,
    pub overflow_allocations: u64,
    pub overflow_freed: u64,
    pub recycled: u64,
    /// Free-list slots available when the snapshot was taken
    pub free_slots: usize,
}

impl QueueStatsSnapshot {
    pub fn lane(&self, lane: Lane) -> &LaneStatsSnapshot {
        match lane {
            Lane::RealTime => &self.realtime,
            Lane::NonRealTime => &self.non_realtime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lanes_count_independently() {
        let stats = QueueStats::default();
        stats.lane(Lane::RealTime).record_processed();
        stats.lane(Lane::NonRealTime).record_processed();
        stats.lane(Lane::NonRealTime).record_processed();
        stats.lane(Lane::NonRealTime).record_ignored_client_error();
        stats.record_recycled();

        let snapshot = stats.snapshot(7);
        assert_eq!(snapshot.lane(Lane::RealTime).processed, 1);
        assert_eq!(snapshot.lane(Lane::NonRealTime).processed, 2);
        assert_eq!(snapshot.non_realtime.ignored_client_errors, 1);
        assert_eq!(snapshot.recycled, 1);
        assert_eq!(snapshot.free_slots, 7);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(QueueStats::default().snapshot(512)).unwrap();
        assert_eq!(json["free_slots"], 512);
        assert_eq!(json["realtime"]["late_sync_waits"], 0);
    }
}
