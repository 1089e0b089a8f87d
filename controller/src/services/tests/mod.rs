//! Service-specific tests
//!
//! Scheduler backends are exercised against real processes (local) and
//! fake queue commands written into a temporary directory.

#[cfg(unix)]
mod local;
#[cfg(unix)]
mod queue;

// Common test utilities for services
#[cfg(unix)]
pub mod common {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    /// Upper bound for a job to be observed as finished
    pub const FINISH_TIMEOUT: Duration = Duration::from_secs(10);

    /// Write an executable shell script
    pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Poll `check` until it returns true or the timeout elapses
    pub async fn eventually<F, Fut>(mut check: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let deadline = tokio::time::Instant::now() + FINISH_TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            if check().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}
