//! Job handles for submitted units of work

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const PERIODS: [(&str, u64); 6] = [
    ("year", 3600 * 24 * 365),
    ("month", 3600 * 24 * 30),
    ("day", 3600 * 24),
    ("hour", 3600),
    ("minute", 60),
    ("second", 1),
];

/// Key/value arguments handed to a submitted job script
pub type JobArgs = BTreeMap<String, String>;

/// Immutable record identifying one submitted job
///
/// `id` is assigned by the scheduler and is the only identity used for pool
/// membership; the other fields are bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHandle {
    pub id: String,
    pub name: String,
    pub working_directory: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl JobHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>, working_directory: impl AsRef<Path>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            working_directory: working_directory.as_ref().to_path_buf(),
            created_at: Utc::now(),
        }
    }

    /// Wall-clock time since the job was created (diagnostics only)
    pub fn runtime(&self) -> Duration {
        (Utc::now() - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id='{}' name='{}' running=({})",
            self.id,
            self.name,
            format_duration(self.runtime())
        )
    }
}

/// Human-readable, comma-separated duration such as `1 hour, 2 minutes`
pub fn format_duration(duration: Duration) -> String {
    let mut seconds = duration.as_secs();
    if seconds == 0 {
        return "0 seconds".to_string();
    }

    let mut parts = Vec::new();
    for (name, period) in PERIODS {
        if seconds >= period {
            let value = seconds / period;
            seconds %= period;
            let plural = if value > 1 { "s" } else { "" };
            parts.push(format!("{value} {name}{plural}"));
        }
    }
    parts.join(", ")
}

/// Render job arguments as `key="value"` tokens in key order
pub fn job_arg_tokens(args: &JobArgs) -> Vec<String> {
    args.iter().map(|(key, value)| format!("{key}=\"{value}\"")).collect()
}

/// Render job arguments joined by a backend-specific separator
pub fn render_job_args(args: &JobArgs, separator: &str) -> String {
    job_arg_tokens(args).join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_job_handle_json_round_trip() {
        let mut job = JobHandle::new("4242", "flwbst_stage001.01_ab12cd34", "/data/cases_pending/stage001.01_ab12cd34");
        job.created_at = Utc.timestamp_opt(1_714_564_800, 123_456_789).unwrap();

        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["id"], "4242");
        assert_eq!(value["workingDirectory"], "/data/cases_pending/stage001.01_ab12cd34");
        assert!(value["createdAt"].as_str().unwrap().ends_with('Z'));

        let restored: JobHandle = serde_json::from_value(value).unwrap();
        assert_eq!(restored, job);
    }

    #[test]
    fn test_runtime_is_elapsed_time() {
        let mut job = JobHandle::new("1", "job", "/tmp");
        job.created_at = Utc::now() - chrono::Duration::seconds(90);

        let runtime = job.runtime();
        assert!(runtime >= Duration::from_secs(90));
        assert!(runtime < Duration::from_secs(120));
        assert!(job.to_string().contains("running=(1 minute, 3"));
    }

    #[test]
    fn test_future_timestamp_clamps_to_zero() {
        let mut job = JobHandle::new("1", "job", "/tmp");
        job.created_at = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(job.runtime(), Duration::ZERO);
    }

    #[test]
    fn test_render_job_args() {
        let args = JobArgs::from([
            ("output_path".to_string(), "/data/result.json".to_string()),
            ("num_trials".to_string(), "4".to_string()),
        ]);

        assert_eq!(
            render_job_args(&args, ","),
            r#"num_trials="4",output_path="/data/result.json""#
        );
        assert_eq!(job_arg_tokens(&JobArgs::new()), Vec::<String>::new());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0 seconds");
        assert_eq!(format_duration(Duration::from_secs(1)), "1 second");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1 hour, 2 minutes, 5 seconds");
        assert_eq!(format_duration(Duration::from_secs(2 * 86_400 + 60)), "2 days, 1 minute");
    }
}
