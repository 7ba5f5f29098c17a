//! Task payloads and lanes
//!
//! Each task kind is a variant carrying its own typed arguments, so handlers
//! never reinterpret raw argument words. Every variant is fixed-size (the
//! collaborators are reference-counted handles), which keeps a record usable
//! on the real-time lane without allocation.

use std::fmt;
use std::sync::Arc;

use eff_core::{AudioObjectId, ClientId, ClientIo, PropertySelector, ShadowMaps};

/// One of the two task-processing pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Time-constraint worker. Tasks must not block or allocate.
    RealTime,
    /// Time-share worker. Tasks may block and allocate.
    NonRealTime,
}

impl Lane {
    pub const ALL: [Lane; 2] = [Lane::RealTime, Lane::NonRealTime];

    #[inline]
    pub fn is_realtime(self) -> bool {
        self == Lane::RealTime
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lane::RealTime => f.write_str("realtime"),
            Lane::NonRealTime => f.write_str("non-realtime"),
        }
    }
}

/// Work that can be submitted to the queue
#[derive(Clone)]
pub enum Task {
    /// Swap the prepared shadow client maps into place (real-time lane)
    SwapClientShadowMaps(Arc<dyn ShadowMaps>),
    /// Start a client's IO participation (non-real-time lane)
    StartClientIo {
        clients: Arc<dyn ClientIo>,
        client_id: ClientId,
    },
    /// Stop a client's IO participation (non-real-time lane)
    StopClientIo {
        clients: Arc<dyn ClientIo>,
        client_id: ClientId,
    },
    /// Tell the host a property of an object changed (non-real-time lane)
    SendPropertyNotification {
        property: PropertySelector,
        object_id: AudioObjectId,
    },
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::SwapClientShadowMaps(_) => TaskKind::SwapClientShadowMaps,
            Task::StartClientIo { .. } => TaskKind::StartClientIo,
            Task::StopClientIo { .. } => TaskKind::StopClientIo,
            Task::SendPropertyNotification { .. } => TaskKind::SendPropertyNotification,
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::SwapClientShadowMaps(_) => f.write_str("SwapClientShadowMaps"),
            Task::StartClientIo { client_id, .. } => f
                .debug_struct("StartClientIo")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Task::StopClientIo { client_id, .. } => f
                .debug_struct("StopClientIo")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Task::SendPropertyNotification {
                property,
                object_id,
            } => f
                .debug_struct("SendPropertyNotification")
                .field("property", property)
                .field("object_id", object_id)
                .finish(),
        }
    }
}

/// What a record asks its worker to do
///
/// Stopping a worker is reserved to the queue's own teardown, so it is not a
/// [`Task`] callers can submit.
#[derive(Debug, Clone)]
pub(crate) enum Command {
    StopWorkerThread,
    Run(Task),
}

impl Command {
    pub(crate) fn kind(&self) -> TaskKind {
        match self {
            Command::StopWorkerThread => TaskKind::StopWorkerThread,
            Command::Run(task) => task.kind(),
        }
    }
}

/// Task kind tag, used for routing checks and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    StopWorkerThread,
    SwapClientShadowMaps,
    StartClientIo,
    StopClientIo,
    SendPropertyNotification,
}

impl TaskKind {
    /// Whether the lane's handler knows this kind
    pub fn runs_on(self, lane: Lane) -> bool {
        match self {
            TaskKind::StopWorkerThread => true,
            TaskKind::SwapClientShadowMaps => lane == Lane::RealTime,
            TaskKind::StartClientIo
            | TaskKind::StopClientIo
            | TaskKind::SendPropertyNotification => lane == Lane::NonRealTime,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TaskKind::StopWorkerThread => "StopWorkerThread",
            TaskKind::SwapClientShadowMaps => "SwapClientShadowMaps",
            TaskKind::StartClientIo => "StartClientIO",
            TaskKind::StopClientIo => "StopClientIO",
            TaskKind::SendPropertyNotification => "SendPropertyNotification",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
