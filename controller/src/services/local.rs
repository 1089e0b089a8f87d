//! Local scheduler backend
//!
//! Runs each job as a detached `bash <script> key="value" ...` process in its
//! own process group. The job id is the process id, so a restarted
//! controller can keep polling jobs it did not spawn itself.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::core::job::{job_arg_tokens, JobArgs};
use crate::services::toolchain::{absolute_path, Toolchain};
use crate::traits::SchedulerBackend;
use shared::{process_debug, process_warn, ProcessId};

pub struct LocalScheduler {
    bash: Option<PathBuf>,
    /// Processes spawned by this controller, keyed by job id
    children: Mutex<HashMap<String, Child>>,
}

impl LocalScheduler {
    pub const KIND: &'static str = "Local";

    pub fn new(toolchain: &Toolchain) -> Self {
        Self {
            bash: toolchain.resolve("bash"),
            children: Mutex::new(HashMap::new()),
        }
    }

    fn open_log(working_directory: &Path, job_name: &str) -> std::io::Result<(Stdio, Stdio)> {
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(working_directory.join(format!("{job_name}.log")))?;
        let err = log.try_clone()?;
        Ok((Stdio::from(log), Stdio::from(err)))
    }

    #[cfg(test)]
    pub(crate) async fn spawned_count(&self) -> usize {
        self.children.lock().await.len()
    }
}

#[async_trait]
impl SchedulerBackend for LocalScheduler {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn is_available(&self) -> bool {
        self.bash.is_some()
    }

    async fn submit(&self, job_name: &str, working_directory: &Path, script: &Path, args: &JobArgs) -> Option<String> {
        let bash = self.bash.as_ref()?;

        // bash runs inside the working directory, so relative paths would resolve against it
        let (working_directory, script) = match (absolute_path(working_directory), absolute_path(script)) {
            (Ok(dir), Ok(script)) => (dir, script),
            (Err(e), _) | (_, Err(e)) => {
                process_warn!(ProcessId::current(), "⚠️ Cannot resolve paths of job '{}': {}", job_name, e);
                return None;
            }
        };
        let working_directory = working_directory.as_path();

        let (stdout, stderr) = match Self::open_log(working_directory, job_name) {
            Ok(streams) => streams,
            Err(e) => {
                process_warn!(
                    ProcessId::current(),
                    "⚠️ Cannot open log for job '{}' in {}: {}",
                    job_name,
                    working_directory.display(),
                    e
                );
                return None;
            }
        };

        let mut cmd = Command::new(bash);
        cmd.arg(&script)
            .args(job_arg_tokens(args))
            .current_dir(working_directory)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                process_warn!(ProcessId::current(), "⚠️ Failed to spawn job '{}': {}", job_name, e);
                return None;
            }
        };

        let id = child.id()?.to_string();
        process_debug!(ProcessId::current(), "Spawned job '{}' with pid {}", job_name, id);
        self.children.lock().await.insert(id.clone(), child);
        Some(id)
    }

    async fn cancel(&self, job_id: &str) -> bool {
        let Ok(pid) = job_id.parse::<i32>() else {
            process_warn!(ProcessId::current(), "⚠️ Cannot cancel job '{}': not a process id", job_id);
            return false;
        };
        terminate_group(pid)
    }

    async fn poll_one(&self, job_id: &str) -> bool {
        let mut children = self.children.lock().await;
        if let Some(child) = children.get_mut(job_id) {
            return match child.try_wait() {
                Ok(Some(status)) => {
                    process_debug!(ProcessId::current(), "Job {} exited with {}", job_id, status);
                    // Reaped; later polls see ESRCH for this pid
                    children.remove(job_id);
                    true
                }
                Ok(None) => false,
                Err(e) => {
                    process_warn!(ProcessId::current(), "⚠️ Cannot query job {}: {}", job_id, e);
                    false
                }
            };
        }
        drop(children);

        // Re-adopted job from an earlier controller run
        match job_id.parse::<i32>() {
            Ok(pid) => !process_exists(pid),
            Err(_) => {
                process_warn!(ProcessId::current(), "⚠️ Cannot poll job '{}': not a process id", job_id);
                false
            }
        }
    }
}

#[cfg(unix)]
fn process_exists(pid: i32) -> bool {
    use nix::sys::signal;
    use nix::unistd::Pid;

    match signal::kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        // Exists but not ours (EPERM) or unknown: never claim it finished
        Err(_) => true,
    }
}

#[cfg(not(unix))]
fn process_exists(_pid: i32) -> bool {
    true
}

#[cfg(unix)]
fn terminate_group(pid: i32) -> bool {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    match signal::killpg(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) => true,
        Err(e) => {
            process_warn!(ProcessId::current(), "⚠️ Failed to signal job {}: {}", pid, e);
            false
        }
    }
}

#[cfg(not(unix))]
fn terminate_group(_pid: i32) -> bool {
    false
}
