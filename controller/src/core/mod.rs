//! Core job-lifecycle logic
//!
//! Job handles, persisted scheduler state, job tracking with the monitoring
//! loop, and case records. Backends are reached only through traits.

pub mod case;
pub mod job;
pub mod monitor;
pub mod state;
pub mod tracker;

pub use case::{CaseRecord, CaseStatus};
pub use job::{JobArgs, JobHandle};
pub use monitor::MonitorOutcome;
pub use state::SchedulerState;
pub use tracker::{JobTracker, TrackerSettings};
