//! Core shared types and identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Global process ID for this process
static PROCESS_ID: OnceLock<ProcessId> = OnceLock::new();

/// Process identifier for any component in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessId {
    /// Campaign controller running the session loop (singleton per data dir)
    Controller,
    /// Detached acquisition worker submitted through the scheduler
    Acquisition,
}

impl ProcessId {
    /// Initialize the global process ID for the controller
    pub fn init_controller() -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::Controller)
    }

    /// Initialize the global process ID for an acquisition worker
    pub fn init_acquisition() -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::Acquisition)
    }

    /// Get the global process ID, defaulting to the controller when unset
    pub fn current() -> &'static ProcessId {
        PROCESS_ID.get().unwrap_or(&ProcessId::Controller)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessId::Controller => write!(f, "controller"),
            ProcessId::Acquisition => write!(f, "acquisition"),
        }
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        ProcessId::Controller
    }
}
