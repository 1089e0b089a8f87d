//! Session controller: the campaign state machine
//!
//! One iteration waits for the tracker to report a transition, harvests
//! finished jobs into archived cases, and then runs one ask/tell step,
//! either inline or as a detached acquisition job.

use serde_json::{json, Map, Value};
use shared::{atomic_write_json, read_json, CaseOutcome, DataSnapshot, Parametrization, PendingCase, ProcessId, ResultSnapshot};
use shared::{process_debug, process_info, process_warn};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::case::{case_name, generation_index, next_stage, unique_id, CaseRecord, CaseStatus};
use crate::core::job::{format_duration, JobArgs, JobHandle};
use crate::core::tracker::JobTracker;
use crate::error::{ControllerError, ControllerResult};
use crate::traits::{CaseStore, OptimizerBackend};

/// Observations handed to the detached acquisition job
pub const DATA_SNAPSHOT_FILE: &str = "data_snapshot.json";
/// Answer written by the detached acquisition job
pub const ACQUISITION_RESULT_FILE: &str = "acquisition_result.json";

const EVALUATION_TABLE: &str = "evaluation-information";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Submitting,
    Monitoring,
    Harvesting,
    LocalAsk,
    AwaitingOffloadedAcquisition,
    Exhausted,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Submitting => "submitting",
            SessionPhase::Monitoring => "monitoring",
            SessionPhase::Harvesting => "harvesting",
            SessionPhase::LocalAsk => "local ask",
            SessionPhase::AwaitingOffloadedAcquisition => "awaiting offloaded acquisition",
            SessionPhase::Exhausted => "exhausted",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Exhausted,
}

pub struct Session<O, S>
where
    O: OptimizerBackend,
    S: CaseStore,
{
    data_dir: PathBuf,
    optimizer: O,
    cases: S,
    /// `None` in generate-only mode
    tracker: Option<JobTracker>,
    /// Script of the detached acquisition job; `Some` selects offload mode
    acquisition_script: Option<PathBuf>,
    phase: SessionPhase,
    /// Successful cases already told to the optimizer by this process
    told: HashSet<String>,
    /// The optimizer will propose no further trials
    exhausted: bool,
}

impl<O, S> Session<O, S>
where
    O: OptimizerBackend,
    S: CaseStore,
{
    pub fn new(data_dir: impl AsRef<Path>, optimizer: O, cases: S, tracker: Option<JobTracker>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            optimizer,
            cases,
            tracker,
            acquisition_script: None,
            phase: SessionPhase::Idle,
            told: HashSet::new(),
            exhausted: false,
        }
    }

    /// Run acquisition as a detached job using `script`
    pub fn with_offload(mut self, script: impl AsRef<Path>) -> Self {
        self.acquisition_script = Some(script.as_ref().to_path_buf());
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn tracker(&self) -> Option<&JobTracker> {
        self.tracker.as_ref()
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    fn tracker_mut(&mut self) -> ControllerResult<&mut JobTracker> {
        self.tracker
            .as_mut()
            .ok_or_else(|| ControllerError::config("no scheduler configured for this session"))
    }

    /// Drive the campaign until the optimizer is exhausted
    pub async fn run(&mut self) -> ControllerResult<()> {
        let mode = if self.acquisition_script.is_some() { "offloaded" } else { "local" };
        process_info!(
            ProcessId::current(),
            "🚀 Running campaign in {} with {} optimizer ({} acquisition)",
            self.data_dir.display(),
            self.optimizer.optimizer_type(),
            mode
        );

        let mut iteration: u64 = 0;
        loop {
            iteration += 1;
            process_debug!(ProcessId::current(), "Iteration {} starting in phase {}", iteration, self.phase);
            if self.step().await? == StepOutcome::Exhausted {
                process_info!(ProcessId::current(), "🏁 Search exhausted after {} iteration(s)", iteration);
                return Ok(());
            }
        }
    }

    /// Run one iteration of the control loop
    pub async fn step(&mut self) -> ControllerResult<StepOutcome> {
        self.phase = SessionPhase::Monitoring;
        let outcome = self.tracker_mut()?.do_monitoring().await?;

        if outcome.acquisition {
            self.phase = SessionPhase::AwaitingOffloadedAcquisition;
            self.resolve_acquisition().await?;
            return self.settle(false).await;
        }

        self.phase = SessionPhase::Harvesting;
        for job in &outcome.finished {
            self.harvest(job).await?;
        }

        if self.exhausted {
            // Outstanding results are still reported, nothing new is asked for
            let cases = self.collect_cases().await?;
            self.tell_cases(&cases).await?;
            return self.settle(false).await;
        }

        let progressed = if self.acquisition_script.is_some() {
            self.offload_round(outcome.free_slots).await?
        } else {
            self.local_round(outcome.free_slots).await?
        };
        self.settle(progressed).await
    }

    /// Decide whether the campaign is over, pausing when nothing is in flight
    async fn settle(&mut self, progressed: bool) -> ControllerResult<StepOutcome> {
        let tracker = self.tracker_mut()?;
        let idle = tracker.is_idle();
        let interval = tracker.monitoring_interval();

        if self.exhausted && idle {
            self.phase = SessionPhase::Exhausted;
            return Ok(StepOutcome::Exhausted);
        }
        if idle && !progressed && !self.exhausted {
            process_warn!(
                ProcessId::current(),
                "⚠️ Nothing submitted and nothing in flight, retrying in {}",
                format_duration(interval)
            );
            tokio::time::sleep(interval).await;
        }
        self.phase = SessionPhase::Idle;
        Ok(StepOutcome::Continue)
    }

    /// Archive a finished job's case and record its evaluation
    async fn harvest(&mut self, job: &JobHandle) -> ControllerResult<()> {
        let Some(mut case) = self.cases.archive(&job.working_directory).await? else {
            process_warn!(
                ProcessId::current(),
                "⚠️ Finished job {} left no case in {}",
                job,
                job.working_directory.display()
            );
            return Ok(());
        };

        case.mark_finished();
        self.evaluate(&mut case).await?;

        let mut entries = Map::new();
        entries.insert("jobId".to_string(), json!(job.id));
        entries.insert("jobName".to_string(), json!(job.name));
        entries.insert("finishedAt".to_string(), json!(chrono::Utc::now()));
        entries.insert("runtime".to_string(), json!(format_duration(job.runtime())));
        self.cases.annotate(&case, EVALUATION_TABLE, entries).await?;

        process_info!(
            ProcessId::current(),
            "📦 Harvested case '{}' from job {} (success={})",
            case.name,
            job.id,
            case.success.unwrap_or(false)
        );
        Ok(())
    }

    /// Read objective outputs; a case without usable outputs fails permanently
    async fn evaluate(&self, case: &mut CaseRecord) -> ControllerResult<()> {
        let objectives = self.cases.objective_outputs(case).await?;
        if objectives.is_none() {
            process_warn!(
                ProcessId::current(),
                "⚠️ Case '{}' produced no usable objective result, marking it failed",
                case.name
            );
        }
        case.record_evaluation(objectives);
        self.cases.save(case).await
    }

    /// All known cases, evaluating any finished case that was never evaluated
    async fn collect_cases(&mut self) -> ControllerResult<Vec<CaseRecord>> {
        let mut cases = self.cases.cases().await?;
        for case in cases.iter_mut() {
            if case.status == CaseStatus::Finished && case.success.is_none() {
                self.evaluate(case).await?;
            }
        }
        Ok(cases)
    }

    /// Tell newly finished cases and register failed and pending ones
    async fn tell_cases(&mut self, cases: &[CaseRecord]) -> ControllerResult<()> {
        let snapshot = partition_cases(cases, self.optimizer.optimizer_type());

        let new_outcomes: BTreeMap<String, CaseOutcome> = snapshot
            .finished_cases
            .into_iter()
            .filter(|(name, _)| !self.told.contains(name))
            .collect();
        if !new_outcomes.is_empty() {
            process_info!(ProcessId::current(), "📋 Telling optimizer {} finished case(s)", new_outcomes.len());
            let names: Vec<String> = new_outcomes.keys().cloned().collect();
            self.optimizer.tell(new_outcomes).await?;
            self.told.extend(names);
        }

        self.optimizer.attach_failed(snapshot.failed_cases).await?;
        self.optimizer.attach_pending(snapshot.pending_cases).await
    }

    /// Inline ask/tell step; returns true if any case was submitted
    async fn local_round(&mut self, free_slots: usize) -> ControllerResult<bool> {
        self.phase = SessionPhase::LocalAsk;
        let cases = self.collect_cases().await?;
        self.tell_cases(&cases).await?;

        if free_slots == 0 {
            return Ok(false);
        }

        let acquisition = self.optimizer.ask(free_slots).await?;
        if acquisition.finished {
            process_info!(ProcessId::current(), "🏁 Optimizer reports the search is exhausted");
            self.exhausted = true;
        }
        let submitted = self.submit_suggestions(&cases, acquisition.parametrizations).await?;
        Ok(submitted > 0)
    }

    /// Write the offload artifacts and submit the acquisition job
    async fn offload_round(&mut self, free_slots: usize) -> ControllerResult<bool> {
        self.phase = SessionPhase::AwaitingOffloadedAcquisition;
        if free_slots == 0 {
            return Ok(false);
        }
        let Some(script) = self.acquisition_script.clone() else {
            return Err(ControllerError::config("offloaded acquisition needs an acquisition script"));
        };

        let cases = self.collect_cases().await?;
        self.tell_cases(&cases).await?;

        let data = partition_cases(&cases, self.optimizer.optimizer_type());
        let data_path = self.data_dir.join(DATA_SNAPSHOT_FILE);
        atomic_write_json(&data_path, &data).map_err(ControllerError::artifact)?;
        let model_path = self.optimizer.snapshot(&self.data_dir).await?;

        let output_path = self.data_dir.join(ACQUISITION_RESULT_FILE);
        if output_path.exists() {
            std::fs::remove_file(&output_path)?;
        }

        let args = JobArgs::from([
            ("optimizer".to_string(), self.optimizer.optimizer_type()),
            ("model_snapshot".to_string(), model_path.display().to_string()),
            ("data_snapshot".to_string(), data_path.display().to_string()),
            ("num_trials".to_string(), free_slots.to_string()),
            ("output_path".to_string(), output_path.display().to_string()),
        ]);

        let data_dir = self.data_dir.clone();
        let job = self.tracker_mut()?.submit_acquisition(&data_dir, &script, &args).await?;
        match job {
            Some(job) => {
                process_info!(
                    ProcessId::current(),
                    "📤 Offloaded acquisition of {} trial(s) to job {}",
                    free_slots,
                    job.id
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Apply the answer of a finished acquisition job
    async fn resolve_acquisition(&mut self) -> ControllerResult<()> {
        let path = self.data_dir.join(ACQUISITION_RESULT_FILE);
        let result: ResultSnapshot = read_json(&path).map_err(ControllerError::artifact)?;

        let expected = self.optimizer.optimizer_type();
        if result.optimizer_type != expected {
            return Err(ControllerError::OptimizerMismatch {
                expected,
                found: result.optimizer_type,
            });
        }

        if result.status_finished {
            process_info!(ProcessId::current(), "🏁 Acquisition job reports the search is exhausted");
            self.exhausted = true;
            return Ok(());
        }

        let cases = self.collect_cases().await?;
        let submitted = self.submit_suggestions(&cases, result.suggestions()).await?;
        process_info!(
            ProcessId::current(),
            "📥 Acquisition result applied: {} of {} suggestion(s) submitted",
            submitted,
            result.parametrizations.len()
        );
        Ok(())
    }

    /// Materialize suggestions as new cases and submit each immediately
    async fn submit_suggestions(
        &mut self,
        known: &[CaseRecord],
        parametrizations: Vec<Parametrization>,
    ) -> ControllerResult<usize> {
        self.phase = SessionPhase::Submitting;
        let stage = next_stage(known);
        let mut submitted = 0;

        for (position, parametrization) in parametrizations.into_iter().enumerate() {
            let name = case_name(stage, position + 1, &unique_id());
            let index = generation_index(stage, position + 1);
            let case = self.cases.materialize(&name, &index, &parametrization).await?;
            if self.submit_case(case).await? {
                submitted += 1;
            }
        }
        Ok(submitted)
    }

    async fn submit_case(&mut self, mut case: CaseRecord) -> ControllerResult<bool> {
        let Some(script) = self.cases.submission_script(&case) else {
            process_warn!(ProcessId::current(), "⚠️ Case '{}' has no submission script", case.name);
            return Ok(false);
        };

        let tracker = self.tracker_mut()?;
        let kind = tracker.backend_kind();
        let Some(job) = tracker.submit_job(&case.name, &case.path, &script, &JobArgs::new()).await? else {
            return Ok(false);
        };

        case.mark_submitted();
        self.cases.save(&case).await?;

        let mut entries = Map::new();
        entries.insert("jobId".to_string(), Value::String(job.id.clone()));
        entries.insert("jobName".to_string(), Value::String(job.name.clone()));
        entries.insert("scheduler".to_string(), Value::String(kind.to_string()));
        self.cases.annotate(&case, EVALUATION_TABLE, entries).await?;
        Ok(true)
    }

    /// Materialize `count` new cases without submitting them
    pub async fn generate(&mut self, count: usize) -> ControllerResult<Vec<CaseRecord>> {
        self.phase = SessionPhase::LocalAsk;
        let known = self.collect_cases().await?;
        self.tell_cases(&known).await?;

        let acquisition = self.optimizer.ask(count).await?;
        if acquisition.finished {
            process_info!(ProcessId::current(), "🏁 Optimizer reports the search is exhausted");
            self.exhausted = true;
        }

        let stage = next_stage(&known);
        let mut created = Vec::with_capacity(acquisition.parametrizations.len());
        for (position, parametrization) in acquisition.parametrizations.into_iter().enumerate() {
            let name = case_name(stage, position + 1, &unique_id());
            let index = generation_index(stage, position + 1);
            created.push(self.cases.materialize(&name, &index, &parametrization).await?);
        }

        self.phase = if self.exhausted { SessionPhase::Exhausted } else { SessionPhase::Idle };
        Ok(created)
    }
}

/// Split cases into the data snapshot tables
///
/// Successful cases are finished, finished cases without a usable result
/// are failed, everything else is pending.
pub fn partition_cases(cases: &[CaseRecord], optimizer_type: String) -> DataSnapshot {
    let mut snapshot = DataSnapshot::new(optimizer_type);
    for case in cases {
        let parametrization = case.parameters.clone();
        if case.is_successful() {
            snapshot.finished_cases.insert(
                case.name.clone(),
                CaseOutcome {
                    parametrization,
                    objectives: case.objectives.clone().unwrap_or_default(),
                },
            );
        } else if case.status == CaseStatus::Finished {
            snapshot
                .failed_cases
                .insert(case.name.clone(), PendingCase { parametrization });
        } else {
            snapshot
                .pending_cases
                .insert(case.name.clone(), PendingCase { parametrization });
        }
    }
    snapshot
}
