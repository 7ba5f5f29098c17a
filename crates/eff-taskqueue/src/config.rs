//! Task queue configuration
//!
//! Loaded from JSON. Every field has a default, so a config file only needs
//! the values it changes.

use std::fs;
use std::path::Path;
use std::time::Duration;

use eff_audio::TimeConstraintPolicy;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::free_list::MAX_FREE_LIST_CAPACITY;

/// Records pre-allocated for asynchronous submissions
pub const DEFAULT_FREE_LIST_CAPACITY: usize = 512;

/// A sync caller re-checks its record every `multiplier × constraint`
pub const DEFAULT_SYNC_WAIT_TIMEOUT_MULTIPLIER: u32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskQueueConfig {
    /// Scheduling contract requested for the real-time worker
    pub realtime_policy: TimeConstraintPolicy,
    /// Ask the OS to promote the real-time worker. Tests and unprivileged
    /// runs may turn this off.
    pub promote_realtime_worker: bool,
    /// Records pre-allocated for `queue_async`
    pub free_list_capacity: usize,
    pub sync_wait_timeout_multiplier: u32,
    pub realtime_thread_name: String,
    pub non_realtime_thread_name: String,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            realtime_policy: TimeConstraintPolicy::default(),
            promote_realtime_worker: true,
            free_list_capacity: DEFAULT_FREE_LIST_CAPACITY,
            sync_wait_timeout_multiplier: DEFAULT_SYNC_WAIT_TIMEOUT_MULTIPLIER,
            realtime_thread_name: "eff-rt-worker".to_string(),
            non_realtime_thread_name: "eff-non-rt-worker".to_string(),
        }
    }
}

impl TaskQueueConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.free_list_capacity == 0 {
            return Err(ConfigError::ZeroFreeListCapacity);
        }
        if self.free_list_capacity > MAX_FREE_LIST_CAPACITY {
            return Err(ConfigError::FreeListTooLarge {
                requested: self.free_list_capacity,
                max: MAX_FREE_LIST_CAPACITY,
            });
        }

        let policy = &self.realtime_policy;
        if policy.computation_ns == 0 || policy.constraint_ns == 0 {
            return Err(ConfigError::ZeroComputation);
        }
        if policy.computation_ns > policy.constraint_ns {
            return Err(ConfigError::ComputationExceedsConstraint {
                nominal_ns: policy.computation_ns,
                constraint_ns: policy.constraint_ns,
            });
        }

        if self.sync_wait_timeout_multiplier == 0 {
            return Err(ConfigError::ZeroTimeoutMultiplier);
        }

        Ok(())
    }

    /// How long a sync caller sleeps before re-checking its record
    pub fn sync_wait_timeout(&self) -> Duration {
        Duration::from_nanos(
            u64::from(self.realtime_policy.constraint_ns)
                * u64::from(self.sync_wait_timeout_multiplier),
        )
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(io_error)
    }
}
