//! Reference optimizer: seeded random search over the search space
//!
//! The whole optimizer state is plain data, so the model snapshot handed to
//! a detached acquisition job is just that state serialized to JSON.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use shared::{atomic_write_json, read_json, CaseOutcome, Parametrization, PendingCase};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{ControllerError, ControllerResult};
use crate::optimizer::search_space::{space_size, validate_dimensions, Dimension};
use crate::traits::{Acquisition, OptimizerBackend};

/// Draw attempts per requested trial before giving up on finding a new point
const DRAW_ATTEMPTS_PER_TRIAL: usize = 64;

pub const MODEL_SNAPSHOT_FILE: &str = "model_snapshot.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RandomSearchState {
    pub seed: u64,
    /// Maximum number of trials over the whole campaign
    #[serde(default)]
    pub trial_budget: Option<usize>,
    pub dimensions: Vec<Dimension>,
    /// Completed ask calls, mixed into the seed of the next one
    #[serde(default)]
    pub asks: u64,
    #[serde(default)]
    pub completed: BTreeMap<String, CaseOutcome>,
    #[serde(default)]
    pub pending: BTreeMap<String, PendingCase>,
    #[serde(default)]
    pub failed: BTreeMap<String, PendingCase>,
}

#[derive(Debug, Clone)]
pub struct RandomSearch {
    state: RandomSearchState,
}

impl RandomSearch {
    pub const TYPE: &'static str = "random";

    pub fn new(dimensions: Vec<Dimension>, seed: u64, trial_budget: Option<usize>) -> ControllerResult<Self> {
        validate_dimensions(&dimensions)?;
        Ok(Self {
            state: RandomSearchState {
                seed,
                trial_budget,
                dimensions,
                asks: 0,
                completed: BTreeMap::new(),
                pending: BTreeMap::new(),
                failed: BTreeMap::new(),
            },
        })
    }

    /// Restore from a model snapshot written by [`OptimizerBackend::snapshot`]
    pub fn from_snapshot(path: &Path) -> ControllerResult<Self> {
        let state: RandomSearchState = read_json(path).map_err(ControllerError::artifact)?;
        validate_dimensions(&state.dimensions)?;
        Ok(Self { state })
    }

    pub fn state(&self) -> &RandomSearchState {
        &self.state
    }

    /// Trials known to the optimizer, in any state
    pub fn trial_count(&self) -> usize {
        self.state.completed.len() + self.state.pending.len() + self.state.failed.len()
    }

    /// Best observed value of `objective` (minimization)
    pub fn best(&self, objective: &str) -> Option<(&str, f64)> {
        self.state
            .completed
            .iter()
            .filter_map(|(name, outcome)| outcome.objectives.get(objective).map(|v| (name.as_str(), *v)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    fn known_points(&self) -> HashSet<String> {
        let completed = self.state.completed.values().map(|case| &case.parametrization);
        let others = self
            .state
            .pending
            .values()
            .chain(self.state.failed.values())
            .map(|case| &case.parametrization);
        completed.chain(others).map(point_key).collect()
    }

    /// Seed of the next ask, varying with past asks and known trials
    fn draw_seed(&self) -> u64 {
        let known = self.trial_count() as u64;
        self.state
            .seed
            .wrapping_add(self.state.asks)
            .wrapping_add(known.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    fn sample(&self, rng: &mut StdRng) -> Parametrization {
        self.state
            .dimensions
            .iter()
            .map(|dimension| (dimension.name.clone(), dimension.domain.sample(rng)))
            .collect()
    }
}

/// Canonical key of a parametrization (keys are ordered)
fn point_key(parametrization: &Parametrization) -> String {
    serde_json::to_string(parametrization).unwrap_or_default()
}

#[async_trait]
impl OptimizerBackend for RandomSearch {
    fn optimizer_type(&self) -> String {
        Self::TYPE.to_string()
    }

    async fn tell(&mut self, outcomes: BTreeMap<String, CaseOutcome>) -> ControllerResult<()> {
        for (name, outcome) in outcomes {
            self.state.pending.remove(&name);
            self.state.failed.remove(&name);
            self.state.completed.insert(name, outcome);
        }
        Ok(())
    }

    async fn attach_pending(&mut self, pending: BTreeMap<String, PendingCase>) -> ControllerResult<()> {
        self.state.pending = pending
            .into_iter()
            .filter(|(name, _)| !self.state.completed.contains_key(name) && !self.state.failed.contains_key(name))
            .collect();
        Ok(())
    }

    async fn attach_failed(&mut self, failed: BTreeMap<String, PendingCase>) -> ControllerResult<()> {
        for (name, case) in failed {
            self.state.pending.remove(&name);
            self.state.completed.remove(&name);
            self.state.failed.insert(name, case);
        }
        Ok(())
    }

    async fn ask(&mut self, max_trials: usize) -> ControllerResult<Acquisition> {
        let remaining = self
            .state
            .trial_budget
            .map_or(usize::MAX, |budget| budget.saturating_sub(self.trial_count()));
        if remaining == 0 {
            return Ok(Acquisition {
                parametrizations: Vec::new(),
                finished: true,
            });
        }

        let wanted = max_trials.min(remaining);
        let mut rng = StdRng::seed_from_u64(self.draw_seed());
        self.state.asks += 1;

        let mut known = self.known_points();
        let mut parametrizations = Vec::with_capacity(wanted);
        let attempts = wanted.saturating_mul(DRAW_ATTEMPTS_PER_TRIAL);
        for _ in 0..attempts {
            if parametrizations.len() == wanted {
                break;
            }
            let candidate = self.sample(&mut rng);
            if known.insert(point_key(&candidate)) {
                parametrizations.push(candidate);
            }
        }

        let space_spent = space_size(&self.state.dimensions).is_some_and(|size| known.len() as u64 >= size);
        let finished = wanted > 0 && parametrizations.is_empty() && space_spent;
        Ok(Acquisition {
            parametrizations,
            finished,
        })
    }

    async fn snapshot(&self, save_in: &Path) -> ControllerResult<PathBuf> {
        let path = save_in.join(MODEL_SNAPSHOT_FILE);
        atomic_write_json(&path, &self.state).map_err(ControllerError::artifact)?;
        Ok(path)
    }
}
