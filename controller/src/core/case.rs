//! Case records and their on-disk metadata report
//!
//! A case is one instantiated, parametrized workload. The controller owns its
//! lifecycle status; evaluation (`success`, `objectives`) is filled in by the
//! external evaluation step and merely persisted here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ControllerError, ControllerResult};
use shared::{atomic_write_json, read_json, Parametrization};

/// Metadata report stored in every case directory
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    NotSubmitted,
    Submitted,
    Finished,
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseStatus::NotSubmitted => write!(f, "not_submitted"),
            CaseStatus::Submitted => write!(f, "submitted"),
            CaseStatus::Finished => write!(f, "finished"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub status: CaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub based_on: Option<PathBuf>,
    /// Values applied to the linked configuration entries
    #[serde(default)]
    pub parameters: Parametrization,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objectives: Option<BTreeMap<String, f64>>,
}

impl CaseRecord {
    pub fn new(name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self {
            id: unique_id(),
            name: name.into(),
            path: path.as_ref().to_path_buf(),
            status: CaseStatus::NotSubmitted,
            success: None,
            created_at: Utc::now(),
            submitted_at: None,
            generation_index: None,
            based_on: None,
            parameters: Parametrization::new(),
            objectives: None,
        }
    }

    /// Not yet finished: waiting for submission or running
    pub fn is_pending(&self) -> bool {
        self.status != CaseStatus::Finished
    }

    /// Finished and evaluated with a usable result
    pub fn is_successful(&self) -> bool {
        self.status == CaseStatus::Finished && self.success == Some(true) && self.objectives.is_some()
    }

    pub fn is_failed(&self) -> bool {
        self.success == Some(false)
    }

    pub fn mark_submitted(&mut self) {
        self.status = CaseStatus::Submitted;
        self.submitted_at = Some(Utc::now());
    }

    pub fn mark_finished(&mut self) {
        self.status = CaseStatus::Finished;
    }

    /// Record an evaluation; `None` marks the case permanently failed
    pub fn record_evaluation(&mut self, objectives: Option<BTreeMap<String, f64>>) {
        self.success = Some(objectives.is_some());
        self.objectives = objectives;
    }

    /// Stage number encoded in the generation index (or legacy `stageNNN.` name)
    pub fn stage(&self) -> Option<u32> {
        if let Some(index) = &self.generation_index {
            return index.split('.').next().and_then(|s| s.parse().ok());
        }
        self.name
            .strip_prefix("stage")
            .and_then(|rest| rest.split('.').next())
            .and_then(|s| s.parse().ok())
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.path.join(METADATA_FILE)
    }

    /// Merge this record into the metadata report, keeping unrelated keys
    pub fn persist(&self) -> ControllerResult<()> {
        let entries = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => return Err(ControllerError::case(&self.name, "record did not serialize to an object")),
        };
        update_metadata(&self.path, entries, None)
    }

    /// Restore a record from a case directory
    pub fn load(case_dir: &Path) -> ControllerResult<Self> {
        let path = case_dir.join(METADATA_FILE);
        read_json(&path).map_err(ControllerError::artifact)
    }
}

impl fmt::Display for CaseRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Case '{}' (id={}) [{}]", self.name, self.id, self.path.display())
    }
}

/// Merge `entries` into the metadata report of `case_dir`
///
/// With a `header`, entries go into (or extend) that table; otherwise they
/// are written at top level. Keys not named in `entries` are preserved.
pub fn update_metadata(case_dir: &Path, entries: Map<String, Value>, header: Option<&str>) -> ControllerResult<()> {
    let path = case_dir.join(METADATA_FILE);

    let mut document = if path.exists() {
        match read_json::<Value>(&path).map_err(ControllerError::artifact)? {
            Value::Object(map) => map,
            _ => {
                return Err(ControllerError::case(
                    case_dir.display().to_string(),
                    "metadata report is not a JSON object",
                ))
            }
        }
    } else {
        Map::new()
    };

    match header {
        Some(header) => {
            let table = document
                .entry(header.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !table.is_object() {
                *table = Value::Object(Map::new());
            }
            if let Value::Object(table) = table {
                table.extend(entries);
            }
        }
        None => document.extend(entries),
    }

    atomic_write_json(&path, &Value::Object(document)).map_err(ControllerError::artifact)
}

/// Short random identifier used in case names
pub fn unique_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Next stage number: one past the highest stage among `cases`, or 1
pub fn next_stage(cases: &[CaseRecord]) -> u32 {
    cases.iter().filter_map(CaseRecord::stage).max().map_or(1, |stage| stage + 1)
}

/// Generation index `<stage>.<index>` with a 1-based index
pub fn generation_index(stage: u32, index: usize) -> String {
    format!("{stage:03}.{index:02}")
}

/// Directory name for a freshly suggested case
pub fn case_name(stage: u32, index: usize, uid: &str) -> String {
    format!("stage{}_{uid}", generation_index(stage, index))
}
