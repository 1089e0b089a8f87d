//! Offloaded acquisition artifacts
//!
//! One offload round is a degenerate single-item queue: the controller
//! writes a [`DataSnapshot`] (plus an optimizer-owned model snapshot) and
//! submits a worker; the worker answers with exactly one [`ResultSnapshot`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One assignment of values to search-space dimensions, keyed by dimension name
pub type Parametrization = BTreeMap<String, serde_json::Value>;

/// A finished case as seen by the optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub parametrization: Parametrization,
    pub objectives: BTreeMap<String, f64>,
}

/// A case whose outcome is not (or never will be) available
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCase {
    pub parametrization: Parametrization,
}

/// Observations handed to a detached acquisition worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSnapshot {
    pub optimizer_type: String,
    pub created_at: DateTime<Utc>,
    pub finished_cases: BTreeMap<String, CaseOutcome>,
    pub pending_cases: BTreeMap<String, PendingCase>,
    /// Permanently failed cases, excluded from model fitting but never resuggested
    #[serde(default)]
    pub failed_cases: BTreeMap<String, PendingCase>,
}

impl DataSnapshot {
    pub fn new(optimizer_type: impl Into<String>) -> Self {
        Self {
            optimizer_type: optimizer_type.into(),
            created_at: Utc::now(),
            finished_cases: BTreeMap::new(),
            pending_cases: BTreeMap::new(),
            failed_cases: BTreeMap::new(),
        }
    }
}

/// Answer of a detached acquisition worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSnapshot {
    pub optimizer_type: String,
    pub created_at: DateTime<Utc>,
    /// The optimizer considers the search exhausted
    pub status_finished: bool,
    /// New trials keyed by trial index
    pub parametrizations: BTreeMap<u32, Parametrization>,
}

impl ResultSnapshot {
    pub fn new(optimizer_type: impl Into<String>, status_finished: bool, trials: Vec<Parametrization>) -> Self {
        Self {
            optimizer_type: optimizer_type.into(),
            created_at: Utc::now(),
            status_finished,
            parametrizations: trials
                .into_iter()
                .enumerate()
                .map(|(index, trial)| (index as u32, trial))
                .collect(),
        }
    }

    /// Suggested trials in trial-index order
    pub fn suggestions(&self) -> Vec<Parametrization> {
        self.parametrizations.values().cloned().collect()
    }
}
