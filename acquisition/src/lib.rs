//! Detached acquisition worker
//!
//! Performs one ask step outside the controller process: restores the
//! optimizer from its model snapshot, replays the observations of the data
//! snapshot and writes the proposed trials as a result snapshot.

use std::path::PathBuf;
use std::time::Instant;

use controller::{optimizer, ControllerError, ControllerResult, OptimizerBackend};
use shared::{atomic_write_json, process_info, read_json, DataSnapshot, ProcessId, ResultSnapshot};

/// Inputs of one acquisition round
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionRequest {
    pub optimizer: String,
    pub model_snapshot: PathBuf,
    pub data_snapshot: PathBuf,
    pub num_trials: usize,
    pub output_path: PathBuf,
}

/// Run one acquisition round and write its result snapshot
pub async fn run_acquisition(request: &AcquisitionRequest) -> ControllerResult<ResultSnapshot> {
    let started = Instant::now();

    let mut optimizer = optimizer::restore(&request.optimizer, &request.model_snapshot)?;
    let data: DataSnapshot = read_json(&request.data_snapshot).map_err(ControllerError::artifact)?;

    let optimizer_type = optimizer.optimizer_type();
    if data.optimizer_type != optimizer_type {
        return Err(ControllerError::OptimizerMismatch {
            expected: optimizer_type,
            found: data.optimizer_type,
        });
    }

    process_info!(
        ProcessId::current(),
        "📋 Replaying {} finished, {} pending and {} failed case(s)",
        data.finished_cases.len(),
        data.pending_cases.len(),
        data.failed_cases.len()
    );
    optimizer.ingest(data).await?;

    let acquisition = optimizer.ask(request.num_trials).await?;
    let result = ResultSnapshot::new(optimizer_type, acquisition.finished, acquisition.parametrizations);
    atomic_write_json(&request.output_path, &result).map_err(ControllerError::artifact)?;

    process_info!(
        ProcessId::current(),
        "✅ Proposed {} of {} trial(s) in {:.2}s (finished={})",
        result.parametrizations.len(),
        request.num_trials,
        started.elapsed().as_secs_f64(),
        result.status_finished
    );
    Ok(result)
}
