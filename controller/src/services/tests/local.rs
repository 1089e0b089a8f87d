//! Tests for the local scheduler against real bash processes

use std::path::Path;
use tempfile::TempDir;

use super::common::{eventually, write_script};
use crate::core::job::JobArgs;
use crate::services::local::LocalScheduler;
use crate::services::toolchain::Toolchain;
use crate::traits::SchedulerBackend;

fn scheduler() -> LocalScheduler {
    let scheduler = LocalScheduler::new(&Toolchain::from_env());
    assert!(scheduler.is_available(), "bash must be on PATH for local scheduler tests");
    scheduler
}

#[tokio::test]
async fn test_job_runs_with_key_value_args() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "Allrun", "echo \"$@\" > args.txt\necho done");
    let scheduler = scheduler();

    let args = JobArgs::from([
        ("case".to_string(), "stage001.01_ab12cd34".to_string()),
        ("n".to_string(), "3".to_string()),
    ]);
    let id = scheduler.submit("flwbst_case", dir.path(), &script, &args).await.unwrap();
    assert!(id.parse::<u32>().is_ok());

    assert!(eventually(|| scheduler.poll_one(&id)).await);
    // Reaped once seen finished, and stays finished on repeated polls
    assert_eq!(scheduler.spawned_count().await, 0);
    assert!(scheduler.poll_one(&id).await);
    assert!(scheduler.poll_one(&id).await);

    let recorded = std::fs::read_to_string(dir.path().join("args.txt")).unwrap();
    assert_eq!(recorded.trim(), r#"case="stage001.01_ab12cd34" n="3""#);
    let log = std::fs::read_to_string(dir.path().join("flwbst_case.log")).unwrap();
    assert!(log.contains("done"));
}

#[tokio::test]
async fn test_relative_case_directory_runs_in_place() {
    let root = tempfile::Builder::new().prefix("relative_cases").tempdir_in(".").unwrap();
    let relative_root = Path::new(".").join(root.path().file_name().unwrap());
    let case_dir = relative_root.join("cases_pending").join("stage001.01_x");
    std::fs::create_dir_all(&case_dir).unwrap();
    let script = write_script(&case_dir, "Allrun", "touch ran.marker");
    assert!(script.is_relative());
    let scheduler = scheduler();

    let id = scheduler.submit("flwbst_x", &case_dir, &script, &JobArgs::new()).await.unwrap();

    assert!(eventually(|| scheduler.poll_one(&id)).await);
    assert!(case_dir.join("ran.marker").is_file());
    let log = std::fs::read_to_string(case_dir.join("flwbst_x.log")).unwrap();
    assert!(!log.contains("No such file"), "unexpected job log: {log}");
}

#[tokio::test]
async fn test_running_job_is_not_finished_until_cancelled() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "Allrun", "sleep 30");
    let scheduler = scheduler();

    let id = scheduler.submit("sleeper", dir.path(), &script, &JobArgs::new()).await.unwrap();
    assert!(!scheduler.poll_one(&id).await);

    assert!(scheduler.cancel(&id).await);
    assert!(eventually(|| scheduler.poll_one(&id)).await);
}

#[tokio::test]
async fn test_readopted_job_is_polled_by_pid() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "Allrun", "sleep 0.3");
    let original = scheduler();
    let id = original.submit("job", dir.path(), &script, &JobArgs::new()).await.unwrap();

    // A second instance never spawned this pid itself
    let restarted = scheduler();
    assert!(!restarted.poll_one(&id).await);

    // The spawning instance reaps the process, after which it no longer exists
    assert!(eventually(|| original.poll_one(&id)).await);
    assert!(eventually(|| restarted.poll_one(&id)).await);
}

#[tokio::test]
async fn test_unparseable_job_id_is_not_finished() {
    let scheduler = scheduler();
    assert!(!scheduler.poll_one("not-a-pid").await);
    assert!(!scheduler.cancel("not-a-pid").await);
}

#[tokio::test]
async fn test_unavailable_without_bash() {
    let empty = TempDir::new().unwrap();
    let scheduler = LocalScheduler::new(&Toolchain::with_search_path([empty.path()]));

    assert!(!scheduler.is_available());
    let id = scheduler
        .submit("job", empty.path(), Path::new("Allrun"), &JobArgs::new())
        .await;
    assert!(id.is_none());
}

#[tokio::test]
async fn test_missing_working_directory_fails_submission() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "Allrun", "true");
    let scheduler = scheduler();

    let id = scheduler
        .submit("job", &dir.path().join("missing"), &script, &JobArgs::new())
        .await;
    assert!(id.is_none());
}
