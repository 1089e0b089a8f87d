//! Tests for the queue scheduler against fake SGE and Slurm commands
//!
//! Each fake command keeps its state as marker files in the tool directory,
//! so a test can flip a job's queue state between polls.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::common::write_script;
use crate::core::job::JobArgs;
use crate::services::queue::QueueScheduler;
use crate::services::toolchain::Toolchain;
use crate::traits::SchedulerBackend;

struct FakeQueue {
    tools: TempDir,
    work: TempDir,
}

impl FakeQueue {
    fn new() -> Self {
        Self {
            tools: TempDir::new().unwrap(),
            work: TempDir::new().unwrap(),
        }
    }

    fn tool_dir(&self) -> &Path {
        self.tools.path()
    }

    fn toolchain(&self) -> Toolchain {
        Toolchain::with_search_path([self.tool_dir()])
    }

    fn script(&self) -> PathBuf {
        write_script(self.work.path(), "Allrun", "true")
    }

    fn mark(&self, name: &str) {
        std::fs::write(self.tool_dir().join(name), "").unwrap();
    }

    fn recorded(&self, name: &str) -> String {
        std::fs::read_to_string(self.tool_dir().join(name)).unwrap().trim().to_string()
    }

    fn install_sge(&self) {
        let dir = self.tool_dir().display().to_string();
        write_script(
            self.tool_dir(),
            "qsub",
            &format!(
                "echo \"$@\" > {dir}/qsub_args\npwd > {dir}/qsub_cwd\n\
                 if [ -f {dir}/reject ]; then echo 'Unable to run job' >&2; exit 1; fi\n\
                 echo \"Your job 4242 (\\\"$2\\\") has been submitted\""
            ),
        );
        write_script(
            self.tool_dir(),
            "qstat",
            &format!(
                "if [ -f {dir}/broken ]; then echo 'error: commlib error' >&2; exit 2; fi\n\
                 if [ -f {dir}/gone_$2 ]; then echo \"Following jobs do not exist:\" >&2; echo \"$2\" >&2; exit 1; fi\n\
                 echo \"job_number: $2\""
            ),
        );
        write_script(self.tool_dir(), "qdel", &format!("touch {dir}/gone_$1\necho \"deleted job $1\""));
    }

    fn install_slurm(&self) {
        let dir = self.tool_dir().display().to_string();
        write_script(
            self.tool_dir(),
            "sbatch",
            &format!("echo \"$@\" > {dir}/sbatch_args\necho '777;cluster-a'"),
        );
        write_script(
            self.tool_dir(),
            "squeue",
            &format!(
                "if [ -f {dir}/invalid ]; then echo 'slurm_load_jobs error: Invalid job id specified' >&2; exit 1; fi\n\
                 if [ -f {dir}/timeout ]; then echo 'slurm_load_jobs error: Socket timed out' >&2; exit 1; fi\n\
                 if [ -f {dir}/state ]; then cat {dir}/state; fi"
            ),
        );
        write_script(self.tool_dir(), "scancel", &format!("echo CANCELLED > {dir}/state"));
    }
}

#[tokio::test]
async fn test_sge_submit_poll_cancel() {
    let queue = FakeQueue::new();
    queue.install_sge();
    let scheduler = QueueScheduler::sge(&queue.toolchain());
    assert!(scheduler.is_available());
    assert_eq!(scheduler.kind(), "Sge");

    let script = queue.script();
    let args = JobArgs::from([("case".to_string(), "c1".to_string()), ("n".to_string(), "2".to_string())]);
    let id = scheduler
        .submit("flwbst_c1", queue.work.path(), &script, &args)
        .await
        .unwrap();

    assert_eq!(id, "4242");
    assert_eq!(
        queue.recorded("qsub_args"),
        format!(r#"-N flwbst_c1 -v case="c1",n="2" {}"#, script.display())
    );
    assert_eq!(
        PathBuf::from(queue.recorded("qsub_cwd")).canonicalize().unwrap(),
        queue.work.path().canonicalize().unwrap()
    );

    assert!(!scheduler.poll_one(&id).await);
    assert!(scheduler.cancel(&id).await);
    assert!(scheduler.poll_one(&id).await);
}

#[tokio::test]
async fn test_relative_script_is_submitted_absolute() {
    let queue = FakeQueue::new();
    queue.install_sge();
    let scheduler = QueueScheduler::sge(&queue.toolchain());
    let work = tempfile::Builder::new().prefix("relative_work").tempdir_in(".").unwrap();
    let relative_work = Path::new(".").join(work.path().file_name().unwrap());
    let script = write_script(&relative_work, "Allrun", "true");

    let id = scheduler
        .submit("flwbst_c1", &relative_work, &script, &JobArgs::new())
        .await
        .unwrap();

    assert_eq!(id, "4242");
    let submitted = queue.recorded("qsub_args");
    let submitted_script = PathBuf::from(submitted.rsplit(' ').next().unwrap());
    assert!(submitted_script.is_absolute());
    assert_eq!(submitted_script.canonicalize().unwrap(), script.canonicalize().unwrap());
    assert_eq!(
        PathBuf::from(queue.recorded("qsub_cwd")).canonicalize().unwrap(),
        work.path().canonicalize().unwrap()
    );
}

#[tokio::test]
async fn test_sge_ambiguous_status_is_not_finished() {
    let queue = FakeQueue::new();
    queue.install_sge();
    queue.mark("broken");
    let scheduler = QueueScheduler::sge(&queue.toolchain());

    assert!(!scheduler.poll_one("4242").await);
}

#[tokio::test]
async fn test_sge_rejected_submission() {
    let queue = FakeQueue::new();
    queue.install_sge();
    queue.mark("reject");
    let scheduler = QueueScheduler::sge(&queue.toolchain());

    let id = scheduler
        .submit("flwbst_c1", queue.work.path(), &queue.script(), &JobArgs::new())
        .await;
    assert!(id.is_none());
    assert_eq!(queue.recorded("qsub_args"), format!("-N flwbst_c1 {}", queue.script().display()));
}

#[tokio::test]
async fn test_slurm_states() {
    let queue = FakeQueue::new();
    queue.install_slurm();
    let scheduler = QueueScheduler::slurm(&queue.toolchain());
    assert!(scheduler.is_available());

    let args = JobArgs::from([("case".to_string(), "c1".to_string())]);
    let id = scheduler
        .submit("flwbst_c1", queue.work.path(), &queue.script(), &args)
        .await
        .unwrap();
    assert_eq!(id, "777");
    assert!(queue.recorded("sbatch_args").starts_with(r#"--parsable -J flwbst_c1 --export=ALL,case="c1" "#));

    std::fs::write(queue.tool_dir().join("state"), "PENDING\n").unwrap();
    assert!(!scheduler.poll_one(&id).await);
    std::fs::write(queue.tool_dir().join("state"), "RUNNING\n").unwrap();
    assert!(!scheduler.poll_one(&id).await);

    assert!(scheduler.cancel(&id).await);
    assert!(scheduler.poll_one(&id).await);

    // Purged from the queue altogether
    std::fs::remove_file(queue.tool_dir().join("state")).unwrap();
    assert!(scheduler.poll_one(&id).await);
}

#[tokio::test]
async fn test_slurm_errors() {
    let queue = FakeQueue::new();
    queue.install_slurm();
    let scheduler = QueueScheduler::slurm(&queue.toolchain());

    queue.mark("timeout");
    assert!(!scheduler.poll_one("777").await);

    std::fs::remove_file(queue.tool_dir().join("timeout")).unwrap();
    queue.mark("invalid");
    assert!(scheduler.poll_one("777").await);
}

#[tokio::test]
async fn test_missing_commands_make_backend_unavailable() {
    let queue = FakeQueue::new();
    write_script(queue.tool_dir(), "qsub", "echo 'Your job 1 (\"x\") has been submitted'");
    let scheduler = QueueScheduler::sge(&queue.toolchain());

    assert!(!scheduler.is_available());
    assert!(!scheduler.poll_one("1").await);
    assert!(!scheduler.cancel("1").await);
}
