//! Persisted scheduler state
//!
//! The state file is the single source of truth across controller restarts.
//! It is overwritten wholesale (atomically) on every mutation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::job::JobHandle;
use crate::error::{ControllerError, ControllerResult};
use shared::{atomic_write_json, read_json};

/// Fixed file name inside the scheduler working directory
pub const STATE_FILE: &str = "scheduler_state.json";

pub const DEFAULT_JOB_PREFIX: &str = "flwbst_";
pub const DEFAULT_MONITORING_INTERVAL_SECONDS: f64 = 60.0;

fn default_job_prefix() -> String {
    DEFAULT_JOB_PREFIX.to_string()
}

fn default_monitoring_interval() -> f64 {
    DEFAULT_MONITORING_INTERVAL_SECONDS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerState {
    /// Identity of the backend that wrote the file
    #[serde(rename = "type")]
    pub kind: String,
    pub working_directory: PathBuf,
    pub job_limit: usize,
    #[serde(default = "default_job_prefix")]
    pub job_prefix: String,
    #[serde(default = "default_monitoring_interval")]
    pub monitoring_interval_seconds: f64,
    #[serde(default)]
    pub job_pool: Vec<JobHandle>,
    #[serde(default)]
    pub acquisition_job: Option<JobHandle>,
}

impl SchedulerState {
    pub fn path_in(working_directory: &Path) -> PathBuf {
        working_directory.join(STATE_FILE)
    }

    /// Load the state file from `working_directory`, if one exists
    pub fn load(working_directory: &Path) -> ControllerResult<Option<Self>> {
        let path = Self::path_in(working_directory);
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some).map_err(ControllerError::artifact)
    }

    pub fn save(&self) -> ControllerResult<()> {
        atomic_write_json(&Self::path_in(&self.working_directory), self).map_err(ControllerError::artifact)
    }
}
