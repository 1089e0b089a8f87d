//! Test helpers and builder patterns for session tests
//!
//! `FakeScheduler` wraps a `MockSchedulerBackend` whose jobs finish only
//! when a test says so. `Campaign` lays out a data directory with a
//! template and builds sessions over it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use controller::core::JobArgs;
use controller::optimizer::RandomSearch;
use controller::services::DirectoryCaseStore;
use controller::traits::MockSchedulerBackend;
use controller::{JobTracker, OptimizerBackend, Session, TrackerSettings};

use super::fixtures::TestFixtures;

/// Shared bookkeeping behind a mocked scheduler
#[derive(Default)]
pub struct FakeScheduler {
    next_id: AtomicUsize,
    finished: Mutex<HashSet<String>>,
    submissions: Mutex<Vec<(String, JobArgs)>>,
}

impl FakeScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Let the next poll of `job_id` report termination
    pub fn finish(&self, job_id: &str) {
        self.finished.lock().unwrap().insert(job_id.to_string());
    }

    /// Submitted job names with their arguments, in submission order
    pub fn submissions(&self) -> Vec<(String, JobArgs)> {
        self.submissions.lock().unwrap().clone()
    }

    /// A mock backend whose ids count up from 1
    pub fn backend(self: &Arc<Self>) -> MockSchedulerBackend {
        let mut backend = MockSchedulerBackend::new();
        backend.expect_kind().return_const("Fake");
        backend.expect_is_available().return_const(true);

        let state = Arc::clone(self);
        backend.expect_submit().returning(move |name, _, _, args| {
            state.submissions.lock().unwrap().push((name.to_string(), args.clone()));
            Some((state.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string())
        });

        let state = Arc::clone(self);
        backend
            .expect_poll_one()
            .returning(move |id| state.finished.lock().unwrap().contains(id));

        backend.expect_cancel().returning(|_| true);
        backend
    }
}

/// Temporary campaign data directory with a template
pub struct Campaign {
    root: TempDir,
    pub scheduler: Arc<FakeScheduler>,
}

impl Campaign {
    pub fn new() -> Self {
        let campaign = Self {
            root: TempDir::new().unwrap(),
            scheduler: FakeScheduler::new(),
        };
        TestFixtures::write_template(&campaign.template());
        campaign
    }

    pub fn data_dir(&self) -> &Path {
        self.root.path()
    }

    pub fn template(&self) -> PathBuf {
        self.data_dir().join("template")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.data_dir().join("cases_archive")
    }

    pub fn store(&self) -> DirectoryCaseStore {
        DirectoryCaseStore::new(
            self.template(),
            self.data_dir().join("cases_pending"),
            self.archive_dir(),
            TestFixtures::links(),
        )
    }

    /// Tracker over the fake scheduler with a zero monitoring interval
    pub fn tracker(&self) -> JobTracker {
        self.tracker_with_limit(TestFixtures::JOB_LIMIT)
    }

    pub fn tracker_with_limit(&self, job_limit: usize) -> JobTracker {
        let settings = TrackerSettings::new(self.data_dir(), job_limit).with_interval(0.0);
        JobTracker::open(Box::new(self.scheduler.backend()), settings).unwrap()
    }

    pub fn optimizer(&self, trial_budget: Option<usize>) -> RandomSearch {
        RandomSearch::new(TestFixtures::dimensions(), TestFixtures::SEED, trial_budget).unwrap()
    }

    pub fn session<O: OptimizerBackend>(&self, optimizer: O) -> Session<O, DirectoryCaseStore> {
        Session::new(self.data_dir(), optimizer, self.store(), Some(self.tracker()))
    }

    /// Session that offloads acquisition to a detached job
    pub fn offload_session(&self) -> Session<RandomSearch, DirectoryCaseStore> {
        let script = self.data_dir().join("acquire.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        self.session(self.optimizer(None)).with_offload(script)
    }
}

impl Default for Campaign {
    fn default() -> Self {
        Self::new()
    }
}
