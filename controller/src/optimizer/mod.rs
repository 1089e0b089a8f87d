//! Optimizer registry and the reference random-search optimizer
//!
//! Model fitting and acquisition functions are out of scope; the controller
//! only needs something that honours the ask/tell contract.

pub mod random;
pub mod search_space;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{CaseOutcome, DataSnapshot, PendingCase};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ControllerError, ControllerResult};
use crate::traits::{Acquisition, OptimizerBackend};

pub use random::RandomSearch;
pub use search_space::{Dimension, Domain, EntryLink};

/// Optimizer section of the campaign configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizerSettings {
    #[serde(rename = "type")]
    pub kind: String,
    /// Run acquisition as a detached job instead of inline
    #[serde(default)]
    pub offload_acquisition: bool,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub trial_budget: Option<usize>,
    pub search_space: Vec<Dimension>,
}

/// Build a fresh optimizer of the configured type
pub fn create(settings: &OptimizerSettings) -> ControllerResult<Box<dyn OptimizerBackend>> {
    match settings.kind.to_ascii_lowercase().as_str() {
        RandomSearch::TYPE => Ok(Box::new(RandomSearch::new(
            settings.search_space.clone(),
            settings.seed,
            settings.trial_budget,
        )?)),
        _ => Err(ControllerError::UnknownOptimizer {
            name: settings.kind.clone(),
        }),
    }
}

/// Rebuild an optimizer of type `kind` from its model snapshot
pub fn restore(kind: &str, model_snapshot: &Path) -> ControllerResult<Box<dyn OptimizerBackend>> {
    match kind.to_ascii_lowercase().as_str() {
        RandomSearch::TYPE => Ok(Box::new(RandomSearch::from_snapshot(model_snapshot)?)),
        _ => Err(ControllerError::UnknownOptimizer { name: kind.to_string() }),
    }
}

#[async_trait]
impl<T: OptimizerBackend + ?Sized> OptimizerBackend for Box<T> {
    fn optimizer_type(&self) -> String {
        (**self).optimizer_type()
    }

    async fn tell(&mut self, outcomes: BTreeMap<String, CaseOutcome>) -> ControllerResult<()> {
        (**self).tell(outcomes).await
    }

    async fn attach_pending(&mut self, pending: BTreeMap<String, PendingCase>) -> ControllerResult<()> {
        (**self).attach_pending(pending).await
    }

    async fn attach_failed(&mut self, failed: BTreeMap<String, PendingCase>) -> ControllerResult<()> {
        (**self).attach_failed(failed).await
    }

    async fn ask(&mut self, max_trials: usize) -> ControllerResult<Acquisition> {
        (**self).ask(max_trials).await
    }

    async fn snapshot(&self, save_in: &Path) -> ControllerResult<PathBuf> {
        (**self).snapshot(save_in).await
    }

    async fn ingest(&mut self, data: DataSnapshot) -> ControllerResult<()> {
        (**self).ingest(data).await
    }
}
