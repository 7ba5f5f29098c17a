//! Task queue error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::task::Lane;

#[derive(Error, Debug)]
pub enum TaskQueueError {
    #[error("Invalid task queue configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to spawn {lane} worker thread: {source}")]
    WorkerSpawn {
        lane: Lane,
        #[source]
        source: io::Error,
    },
}

pub type TaskQueueResult<T> = Result<T, TaskQueueError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Free list capacity must be at least 1")]
    ZeroFreeListCapacity,

    #[error("Free list capacity {requested} exceeds the maximum of {max}")]
    FreeListTooLarge { requested: usize, max: usize },

    #[error("Real-time computation budgets must be non-zero")]
    ZeroComputation,

    #[error("Nominal computation ({nominal_ns} ns) exceeds the constraint ({constraint_ns} ns)")]
    ComputationExceedsConstraint { nominal_ns: u32, constraint_ns: u32 },

    #[error("Sync wait timeout multiplier must be at least 1")]
    ZeroTimeoutMultiplier,

    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
