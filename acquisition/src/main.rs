//! Acquisition worker binary entry point

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

use acquisition::{run_acquisition, AcquisitionRequest};
use shared::{logging, ProcessId};

#[derive(Parser)]
#[command(name = "acquisition")]
#[command(about = "Proposes new trials from an optimizer model snapshot")]
struct Args {
    /// Optimizer identifier
    #[arg(long)]
    optimizer: String,

    /// Model snapshot written by the controller
    #[arg(long)]
    model_snapshot: PathBuf,

    /// Data snapshot with the observed cases
    #[arg(long)]
    data_snapshot: PathBuf,

    /// Number of trials to propose
    #[arg(long)]
    num_trials: usize,

    /// Where to write the result snapshot
    #[arg(long)]
    output_path: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    ProcessId::init_acquisition();
    logging::init_tracing_with_level(Some(&args.log_level));
    logging::log_startup(ProcessId::current(), &format!("{} acquisition of {} trial(s)", args.optimizer, args.num_trials));

    let request = AcquisitionRequest {
        optimizer: args.optimizer,
        model_snapshot: args.model_snapshot,
        data_snapshot: args.data_snapshot,
        num_trials: args.num_trials,
        output_path: args.output_path,
    };

    run_acquisition(&request)
        .await
        .with_context(|| format!("acquisition round writing {} failed", request.output_path.display()))?;
    Ok(())
}
