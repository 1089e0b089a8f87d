//! Job tracking on top of a scheduler backend
//!
//! The tracker owns the job pool (keyed by job id), the single optional
//! acquisition job and the persisted scheduler state. Every mutation is
//! flushed to disk before the call returns.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::job::{JobArgs, JobHandle};
use crate::core::state::{SchedulerState, DEFAULT_JOB_PREFIX, DEFAULT_MONITORING_INTERVAL_SECONDS};
use crate::error::{ControllerError, ControllerResult};
use crate::traits::SchedulerBackend;
use shared::{process_debug, process_info, process_warn, ProcessId};

/// Settings supplied by the session for a tracker
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSettings {
    pub working_directory: PathBuf,
    pub job_limit: usize,
    pub job_prefix: String,
    pub monitoring_interval_seconds: f64,
}

impl TrackerSettings {
    pub fn new(working_directory: impl AsRef<Path>, job_limit: usize) -> Self {
        Self {
            working_directory: working_directory.as_ref().to_path_buf(),
            job_limit,
            job_prefix: DEFAULT_JOB_PREFIX.to_string(),
            monitoring_interval_seconds: DEFAULT_MONITORING_INTERVAL_SECONDS,
        }
    }

    pub fn with_interval(mut self, seconds: f64) -> Self {
        self.monitoring_interval_seconds = seconds;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.job_prefix = prefix.into();
        self
    }
}

fn interval_from_seconds(seconds: f64) -> ControllerResult<Duration> {
    Duration::try_from_secs_f64(seconds)
        .map_err(|_| ControllerError::config(format!("monitoringIntervalSeconds must be a non-negative number, got {seconds}")))
}

pub struct JobTracker {
    backend: Box<dyn SchedulerBackend>,
    working_directory: PathBuf,
    job_limit: usize,
    job_prefix: String,
    monitoring_interval: Duration,
    job_pool: BTreeMap<String, JobHandle>,
    acquisition_job: Option<JobHandle>,
}

impl JobTracker {
    /// Construct a tracker, restoring persisted state from the working directory
    ///
    /// Fails if the backend is unavailable or if the persisted state was
    /// written by a different backend type; in the latter case nothing is
    /// adopted and the state file is left untouched.
    pub fn open(backend: Box<dyn SchedulerBackend>, settings: TrackerSettings) -> ControllerResult<Self> {
        if !backend.is_available() {
            return Err(ControllerError::BackendUnavailable {
                backend: backend.kind().to_string(),
            });
        }

        let mut tracker = Self {
            monitoring_interval: interval_from_seconds(settings.monitoring_interval_seconds)?,
            backend,
            working_directory: settings.working_directory,
            job_limit: settings.job_limit,
            job_prefix: settings.job_prefix,
            job_pool: BTreeMap::new(),
            acquisition_job: None,
        };

        match SchedulerState::load(&tracker.working_directory)? {
            Some(state) => tracker.restore(state)?,
            None => {
                process_info!(
                    ProcessId::current(),
                    "📋 Creating {} scheduler state in {}",
                    tracker.backend.kind(),
                    tracker.working_directory.display()
                );
                tracker.persist()?;
            }
        }

        Ok(tracker)
    }

    fn restore(&mut self, state: SchedulerState) -> ControllerResult<()> {
        let kind = self.backend.kind();
        if state.kind != kind {
            return Err(ControllerError::StateMismatch {
                expected: kind.to_string(),
                found: state.kind,
            });
        }

        self.job_prefix = state.job_prefix;
        self.monitoring_interval = interval_from_seconds(state.monitoring_interval_seconds)?;
        self.job_pool = state
            .job_pool
            .into_iter()
            .map(|job| (job.id.clone(), job))
            .collect();
        self.acquisition_job = state.acquisition_job;

        process_info!(
            ProcessId::current(),
            "🔄 Restored {} scheduler state: {} pooled job(s), acquisition job {}",
            kind,
            self.job_pool.len(),
            self.acquisition_job
                .as_ref()
                .map_or_else(|| "none".to_string(), |job| format!("'{}'", job.id))
        );

        self.persist()
    }

    fn state(&self) -> SchedulerState {
        SchedulerState {
            kind: self.backend.kind().to_string(),
            working_directory: self.working_directory.clone(),
            job_limit: self.job_limit,
            job_prefix: self.job_prefix.clone(),
            monitoring_interval_seconds: self.monitoring_interval.as_secs_f64(),
            job_pool: self.job_pool.values().cloned().collect(),
            acquisition_job: self.acquisition_job.clone(),
        }
    }

    /// Overwrite the state file with the current state
    pub fn persist(&self) -> ControllerResult<()> {
        self.state().save()
    }

    pub fn backend_kind(&self) -> &'static str {
        self.backend.kind()
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn job_limit(&self) -> usize {
        self.job_limit
    }

    pub fn job_prefix(&self) -> &str {
        &self.job_prefix
    }

    pub fn monitoring_interval(&self) -> Duration {
        self.monitoring_interval
    }

    /// Pooled jobs ordered by id
    pub fn pool(&self) -> Vec<&JobHandle> {
        self.job_pool.values().collect()
    }

    pub fn acquisition_job(&self) -> Option<&JobHandle> {
        self.acquisition_job.as_ref()
    }

    /// No pooled jobs and no outstanding acquisition job
    pub fn is_idle(&self) -> bool {
        self.job_pool.is_empty() && self.acquisition_job.is_none()
    }

    /// Pooled jobs a live poll still reports as running
    pub async fn running_jobs(&self) -> Vec<JobHandle> {
        let mut running = Vec::new();
        for job in self.job_pool.values() {
            if !self.backend.poll_one(&job.id).await {
                running.push(job.clone());
            }
        }
        running
    }

    /// Slots not taken by a running job
    ///
    /// Computed through a live poll, so jobs that finished but were not yet
    /// harvested do not count, and a cancelled job keeps its slot until the
    /// scheduler confirms it is gone.
    pub async fn free_slots(&self) -> usize {
        self.job_limit.saturating_sub(self.running_jobs().await.len())
    }

    /// Submit one regular job named `<prefix><case_name>`
    ///
    /// # Returns
    /// The tracked handle, or `None` if the scheduler created no job
    pub async fn submit_job(
        &mut self,
        case_name: &str,
        working_directory: &Path,
        script: &Path,
        args: &JobArgs,
    ) -> ControllerResult<Option<JobHandle>> {
        if self.job_pool.len() >= self.job_limit {
            process_warn!(
                ProcessId::current(),
                "⚠️ Job limit {} reached, not submitting case '{}'",
                self.job_limit,
                case_name
            );
            return Ok(None);
        }

        let job_name = format!("{}{}", self.job_prefix, case_name);
        let Some(id) = self.backend.submit(&job_name, working_directory, script, args).await else {
            process_warn!(
                ProcessId::current(),
                "⚠️ Submission of case '{}' ({}) failed; case stays unsubmitted",
                case_name,
                working_directory.display()
            );
            return Ok(None);
        };

        let job = JobHandle::new(id, job_name, working_directory);
        process_info!(ProcessId::current(), "📤 Submitted case '{}' as job {}", case_name, job);
        self.job_pool.insert(job.id.clone(), job.clone());
        self.persist()?;
        Ok(Some(job))
    }

    /// Submit the single detached acquisition job
    pub async fn submit_acquisition(
        &mut self,
        working_directory: &Path,
        script: &Path,
        args: &JobArgs,
    ) -> ControllerResult<Option<JobHandle>> {
        if let Some(job) = &self.acquisition_job {
            return Err(ControllerError::AcquisitionInFlight { job_id: job.id.clone() });
        }

        let job_name = format!("{}acquisition", self.job_prefix);
        let Some(id) = self.backend.submit(&job_name, working_directory, script, args).await else {
            process_warn!(ProcessId::current(), "⚠️ Submission of acquisition job '{}' failed", job_name);
            return Ok(None);
        };

        let job = JobHandle::new(id, job_name, working_directory);
        process_info!(ProcessId::current(), "📤 Submitted acquisition job {}", job);
        self.acquisition_job = Some(job.clone());
        self.persist()?;
        Ok(Some(job))
    }

    /// Request termination of a tracked job
    ///
    /// The job stays tracked; it is harvested like any other job once a poll
    /// observes that it terminated. The acquisition job cannot be cancelled:
    /// it would never write its result and the session could not resume.
    pub async fn cancel(&mut self, job_id: &str) -> ControllerResult<bool> {
        if self.acquisition_job.as_ref().is_some_and(|job| job.id == job_id) {
            return Err(ControllerError::process(format!(
                "acquisition job {job_id} cannot be cancelled, wait for its result"
            )));
        }
        let job = self.job_pool.get(job_id).ok_or_else(|| ControllerError::UnknownJob {
            job_id: job_id.to_string(),
        })?;

        let accepted = self.backend.cancel(job_id).await;
        if accepted {
            process_info!(ProcessId::current(), "🛑 Cancellation requested for job {}", job);
        } else {
            process_warn!(ProcessId::current(), "⚠️ Scheduler refused to cancel job {}", job);
        }
        Ok(accepted)
    }

    /// Poll the acquisition job, clearing it once finished
    pub(crate) async fn poll_acquisition(&mut self) -> ControllerResult<Option<JobHandle>> {
        let Some(job) = &self.acquisition_job else {
            return Ok(None);
        };
        if !self.backend.poll_one(&job.id).await {
            return Ok(None);
        }

        let job = self.acquisition_job.take();
        self.persist()?;
        if let Some(job) = &job {
            process_info!(ProcessId::current(), "✅ Acquisition job {} finished", job);
        }
        Ok(job)
    }

    /// Poll every pooled job once and remove the finished ones
    pub(crate) async fn harvest_finished(&mut self) -> ControllerResult<Vec<JobHandle>> {
        let mut finished_ids = Vec::new();
        for job in self.job_pool.values() {
            if self.backend.poll_one(&job.id).await {
                finished_ids.push(job.id.clone());
            }
        }
        if finished_ids.is_empty() {
            return Ok(Vec::new());
        }

        let finished: Vec<JobHandle> = finished_ids
            .iter()
            .filter_map(|id| self.job_pool.remove(id))
            .collect();
        self.persist()?;

        for job in &finished {
            process_debug!(ProcessId::current(), "Job {} finished", job);
        }
        Ok(finished)
    }

    /// Acquisition job first, then pooled jobs by creation time
    pub fn status_summary(&self) -> String {
        let mut lines = vec![format!(
            "{} scheduler in {} ({}/{} slots tracked)",
            self.backend.kind(),
            self.working_directory.display(),
            self.job_pool.len(),
            self.job_limit
        )];

        if let Some(job) = &self.acquisition_job {
            lines.push(format!("  acquisition: {job}"));
        }

        let mut jobs: Vec<&JobHandle> = self.job_pool.values().collect();
        jobs.sort_by_key(|job| job.created_at);
        lines.extend(jobs.into_iter().map(|job| format!("  job: {job}")));

        if self.is_idle() {
            lines.push("  no tracked jobs".to_string());
        }
        lines.join("\n")
    }
}
