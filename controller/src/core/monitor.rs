//! Blocking monitoring loop
//!
//! A long-poll over the tracked jobs: it returns only on a state transition
//! (first finished job, or the acquisition job resolving), never on an
//! unchanged cycle.

use crate::core::job::JobHandle;
use crate::core::tracker::JobTracker;
use crate::error::ControllerResult;
use shared::{process_debug, process_info, ProcessId};

/// Result of one monitoring call
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorOutcome {
    pub free_slots: usize,
    pub finished: Vec<JobHandle>,
    /// `finished` holds the acquisition job rather than regular jobs
    pub acquisition: bool,
}

impl JobTracker {
    /// Poll until a job finishes or the acquisition job resolves
    ///
    /// While an acquisition job is outstanding only that job is polled.
    pub async fn do_monitoring(&mut self) -> ControllerResult<MonitorOutcome> {
        if self.is_idle() {
            return Ok(MonitorOutcome {
                free_slots: self.job_limit(),
                finished: Vec::new(),
                acquisition: false,
            });
        }

        let mut cycles: u64 = 0;
        loop {
            if self.acquisition_job().is_some() {
                if let Some(job) = self.poll_acquisition().await? {
                    return Ok(MonitorOutcome {
                        free_slots: 0,
                        finished: vec![job],
                        acquisition: true,
                    });
                }
            } else {
                let finished = self.harvest_finished().await?;
                if !finished.is_empty() {
                    let free_slots = self.job_limit().saturating_sub(self.pool().len());
                    process_info!(
                        ProcessId::current(),
                        "📥 {} job(s) finished, {} slot(s) free",
                        finished.len(),
                        free_slots
                    );
                    return Ok(MonitorOutcome {
                        free_slots,
                        finished,
                        acquisition: false,
                    });
                }
            }

            cycles += 1;
            if cycles == 1 {
                process_info!(ProcessId::current(), "⏳ Waiting on jobs\n{}", self.status_summary());
            } else {
                process_debug!(ProcessId::current(), "Monitoring cycle {} unchanged", cycles);
            }
            tokio::time::sleep(self.monitoring_interval()).await;
        }
    }
}
