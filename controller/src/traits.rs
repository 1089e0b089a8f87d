//! Trait definitions with mockall annotations for testing
//!
//! The controller talks to the outside world through three seams: the job
//! scheduler, the optimizer and the on-disk case store. Each is a trait so
//! the session control loop can be driven by mocks in tests.

use serde_json::{Map, Value};
use shared::{CaseOutcome, DataSnapshot, Parametrization, PendingCase};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::case::CaseRecord;
use crate::core::job::JobArgs;
use crate::error::ControllerResult;

/// Answer of one acquisition step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Acquisition {
    pub parametrizations: Vec<Parametrization>,
    /// The search is exhausted; no further trials will be proposed
    pub finished: bool,
}

/// Execution environment abstraction for submitted jobs
///
/// Implementations must never report a job as finished on an ambiguous
/// query; when in doubt `poll_one` answers `false`.
#[mockall::automock]
#[async_trait::async_trait]
pub trait SchedulerBackend: Send + Sync {
    /// Backend identity, persisted as the state file `type`
    fn kind(&self) -> &'static str;

    /// Static capability probe (required tooling present)
    fn is_available(&self) -> bool;

    /// Launch one job
    ///
    /// # Returns
    /// The scheduler-assigned job id, or `None` when no job was created
    async fn submit(
        &self,
        job_name: &str,
        working_directory: &Path,
        script: &Path,
        args: &JobArgs,
    ) -> Option<String>;

    /// Request termination of a tracked job
    async fn cancel(&self, job_id: &str) -> bool;

    /// True iff the job is known to have terminated
    async fn poll_one(&self, job_id: &str) -> bool;
}

/// Ask/tell contract of the black-box optimizer
#[mockall::automock]
#[async_trait::async_trait]
pub trait OptimizerBackend: Send + Sync {
    /// Identity tag written into offload artifacts
    fn optimizer_type(&self) -> String;

    /// Report evaluated cases
    async fn tell(&mut self, outcomes: BTreeMap<String, CaseOutcome>) -> ControllerResult<()>;

    /// Register parametrizations that are being evaluated
    async fn attach_pending(&mut self, pending: BTreeMap<String, PendingCase>) -> ControllerResult<()>;

    /// Register parametrizations that failed and must not be suggested again
    async fn attach_failed(&mut self, failed: BTreeMap<String, PendingCase>) -> ControllerResult<()>;

    /// Propose up to `max_trials` new parametrizations
    async fn ask(&mut self, max_trials: usize) -> ControllerResult<Acquisition>;

    /// Write the model snapshot into `save_in` and return its path
    async fn snapshot(&self, save_in: &Path) -> ControllerResult<PathBuf>;

    /// Replay a data snapshot into the optimizer
    async fn ingest(&mut self, data: DataSnapshot) -> ControllerResult<()> {
        self.tell(data.finished_cases).await?;
        self.attach_pending(data.pending_cases).await?;
        self.attach_failed(data.failed_cases).await
    }
}

/// Case directory management
#[mockall::automock]
#[async_trait::async_trait]
pub trait CaseStore: Send + Sync {
    /// All known cases, pending and archived
    async fn cases(&self) -> ControllerResult<Vec<CaseRecord>>;

    /// Clone the template into a new pending case carrying `parametrization`
    async fn materialize(
        &self,
        name: &str,
        generation_index: &str,
        parametrization: &Parametrization,
    ) -> ControllerResult<CaseRecord>;

    /// Persist the record into the case metadata report
    async fn save(&self, case: &CaseRecord) -> ControllerResult<()>;

    /// Merge `entries` into the `header` table of the case metadata report
    async fn annotate(&self, case: &CaseRecord, header: &str, entries: Map<String, Value>) -> ControllerResult<()>;

    /// Move a finished job's working directory into the archive
    ///
    /// # Returns
    /// The archived case, or `None` if the directory holds no case
    async fn archive(&self, working_directory: &Path) -> ControllerResult<Option<CaseRecord>>;

    /// Objective outputs of an evaluated case, `None` if unusable
    async fn objective_outputs(&self, case: &CaseRecord) -> ControllerResult<Option<BTreeMap<String, f64>>>;

    /// Script that runs the case
    fn submission_script(&self, case: &CaseRecord) -> Option<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that mock traits can be instantiated
    #[tokio::test]
    async fn test_mock_trait_instantiation() {
        let mut scheduler = MockSchedulerBackend::new();
        scheduler.expect_kind().return_const("Mock");
        assert_eq!(scheduler.kind(), "Mock");

        let _optimizer = MockOptimizerBackend::new();
        let _cases = MockCaseStore::new();
    }
}
