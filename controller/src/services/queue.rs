//! Cluster queue scheduler backends (SGE and Slurm)
//!
//! Both dialects drive the queue through its command-line tools: one command
//! to submit, one to query a job and one to delete it. The queue owns the
//! job lifetime; polling only asks whether the queue still knows the job.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;

use crate::core::job::{render_job_args, JobArgs};
use crate::services::toolchain::{absolute_path, Toolchain};
use crate::traits::SchedulerBackend;
use shared::{process_debug, process_warn, ProcessId};

/// Slurm states after which a job will not run again
const SLURM_TERMINAL_STATES: [&str; 9] = [
    "BOOT_FAIL",
    "CANCELLED",
    "COMPLETED",
    "DEADLINE",
    "FAILED",
    "NODE_FAIL",
    "OUT_OF_MEMORY",
    "PREEMPTED",
    "TIMEOUT",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueDialect {
    Sge,
    Slurm,
}

impl QueueDialect {
    pub fn kind(self) -> &'static str {
        match self {
            QueueDialect::Sge => "Sge",
            QueueDialect::Slurm => "Slurm",
        }
    }

    /// Submit, status and delete commands
    fn commands(self) -> [&'static str; 3] {
        match self {
            QueueDialect::Sge => ["qsub", "qstat", "qdel"],
            QueueDialect::Slurm => ["sbatch", "squeue", "scancel"],
        }
    }

    fn submit_args(self, job_name: &str, script: &Path, args: &JobArgs) -> Vec<OsString> {
        let rendered = render_job_args(args, ",");
        let mut argv: Vec<OsString> = Vec::new();
        match self {
            QueueDialect::Sge => {
                argv.extend(["-N".into(), job_name.into()]);
                if !rendered.is_empty() {
                    argv.extend(["-v".into(), rendered.into()]);
                }
            }
            QueueDialect::Slurm => {
                argv.extend(["--parsable".into(), "-J".into(), job_name.into()]);
                if !rendered.is_empty() {
                    argv.push(format!("--export=ALL,{rendered}").into());
                }
            }
        }
        argv.push(script.as_os_str().to_os_string());
        argv
    }

    fn status_args(self, job_id: &str) -> Vec<String> {
        match self {
            QueueDialect::Sge => vec!["-j".to_string(), job_id.to_string()],
            QueueDialect::Slurm => ["-h", "-j", job_id, "-o", "%T"].iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Extract the job id from the submit command's stdout
    pub fn parse_job_id(self, stdout: &str) -> Option<String> {
        let id = match self {
            // "Your job 4242 ("name") has been submitted"
            QueueDialect::Sge => stdout.split_whitespace().nth(2)?.split('.').next()?,
            // "4242" or "4242;cluster"
            QueueDialect::Slurm => stdout.trim().split(';').next()?,
        };
        let id = id.trim();
        (!id.is_empty() && id.chars().all(|c| c.is_ascii_digit())).then(|| id.to_string())
    }

    /// Interpret a status query; anything ambiguous means "not finished"
    pub fn is_finished(self, output: &Output) -> bool {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        match self {
            QueueDialect::Sge => {
                output.status.code() == Some(1)
                    && (stdout.contains("Following jobs do not exist") || stderr.contains("Following jobs do not exist"))
            }
            QueueDialect::Slurm => {
                if !output.status.success() {
                    return stderr.contains("Invalid job id specified");
                }
                match stdout.split_whitespace().next() {
                    None => true,
                    Some(state) => SLURM_TERMINAL_STATES.contains(&state),
                }
            }
        }
    }
}

pub struct QueueScheduler {
    dialect: QueueDialect,
    submit_command: Option<PathBuf>,
    status_command: Option<PathBuf>,
    delete_command: Option<PathBuf>,
}

impl QueueScheduler {
    pub fn new(dialect: QueueDialect, toolchain: &Toolchain) -> Self {
        let [submit, status, delete] = dialect.commands();
        Self {
            dialect,
            submit_command: toolchain.resolve(submit),
            status_command: toolchain.resolve(status),
            delete_command: toolchain.resolve(delete),
        }
    }

    pub fn sge(toolchain: &Toolchain) -> Self {
        Self::new(QueueDialect::Sge, toolchain)
    }

    pub fn slurm(toolchain: &Toolchain) -> Self {
        Self::new(QueueDialect::Slurm, toolchain)
    }

    pub fn dialect(&self) -> QueueDialect {
        self.dialect
    }

    /// Run a queue command to completion, `None` if it could not be started
    async fn run<I, S>(&self, program: &Path, args: I, working_directory: Option<&Path>) -> Option<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::null());
        if let Some(dir) = working_directory {
            cmd.current_dir(dir);
        }

        match cmd.output().await {
            Ok(output) => Some(output),
            Err(e) => {
                process_warn!(ProcessId::current(), "⚠️ Failed to run {}: {}", program.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl SchedulerBackend for QueueScheduler {
    fn kind(&self) -> &'static str {
        self.dialect.kind()
    }

    fn is_available(&self) -> bool {
        self.submit_command.is_some() && self.status_command.is_some() && self.delete_command.is_some()
    }

    async fn submit(&self, job_name: &str, working_directory: &Path, script: &Path, args: &JobArgs) -> Option<String> {
        let program = self.submit_command.as_deref()?;
        let (working_directory, script) = match (absolute_path(working_directory), absolute_path(script)) {
            (Ok(dir), Ok(script)) => (dir, script),
            (Err(e), _) | (_, Err(e)) => {
                process_warn!(ProcessId::current(), "⚠️ Cannot resolve paths of job '{}': {}", job_name, e);
                return None;
            }
        };
        let argv = self.dialect.submit_args(job_name, &script, args);
        let output = self.run(program, argv, Some(&working_directory)).await?;

        if !output.status.success() {
            process_warn!(
                ProcessId::current(),
                "⚠️ {} rejected job '{}': {}",
                program.display(),
                job_name,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let id = self.dialect.parse_job_id(&stdout);
        if id.is_none() {
            process_warn!(
                ProcessId::current(),
                "⚠️ Could not read a job id for '{}' from: {}",
                job_name,
                stdout.trim()
            );
        }
        id
    }

    async fn cancel(&self, job_id: &str) -> bool {
        let Some(program) = self.delete_command.as_deref() else {
            return false;
        };
        match self.run(program, [job_id], None).await {
            Some(output) if output.status.success() => true,
            Some(output) => {
                process_warn!(
                    ProcessId::current(),
                    "⚠️ {} {} failed: {}",
                    program.display(),
                    job_id,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            None => false,
        }
    }

    async fn poll_one(&self, job_id: &str) -> bool {
        let Some(program) = self.status_command.as_deref() else {
            return false;
        };
        let Some(output) = self.run(program, self.dialect.status_args(job_id), None).await else {
            return false;
        };

        let finished = self.dialect.is_finished(&output);
        process_debug!(ProcessId::current(), "{} job {} finished={}", self.dialect.kind(), job_id, finished);
        finished
    }
}
