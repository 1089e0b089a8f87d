//! Simulation campaign controller
//!
//! Drives an iterative black-box optimization campaign: proposes parameter
//! sets, materializes them as cases, submits the cases as jobs to a
//! pluggable scheduler, harvests finished jobs and feeds the outcomes back
//! into the optimizer. The acquisition step can run inline or be offloaded
//! to a detached job through file artifacts.

pub mod config;
pub mod core;
pub mod error;
pub mod optimizer;
pub mod services;
pub mod session;
pub mod traits;

// Re-export commonly used types
pub use config::SessionConfig;
pub use core::{CaseRecord, CaseStatus, JobHandle, JobTracker, MonitorOutcome, SchedulerState, TrackerSettings};
pub use error::{ControllerError, ControllerResult};
pub use session::{Session, SessionPhase, StepOutcome};
pub use traits::{Acquisition, CaseStore, OptimizerBackend, SchedulerBackend};
