//! Main entry point for the campaign controller binary

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use controller::{
    optimizer,
    services::{create_backend, DirectoryCaseStore, Toolchain},
    traits::CaseStore,
    ControllerError, ControllerResult, JobTracker, Session, SessionConfig,
};
use shared::{logging, process_debug, ProcessId};

/// Controller for simulation-based optimization campaigns
#[derive(Parser)]
#[command(name = "controller")]
#[command(about = "Proposes, submits and harvests simulation cases for a black-box optimization campaign")]
pub struct Cli {
    /// Campaign data directory holding campaign.json and the scheduler state
    #[arg(long, default_value = ".")]
    pub data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the campaign until the optimizer is exhausted
    Run,
    /// Materialize new cases without submitting them
    Generate {
        /// Number of cases to create
        #[arg(long, default_value = "1")]
        count: usize,
    },
    /// Print the tracked jobs and exit
    Status,
}

fn open_tracker(config: &SessionConfig, data_dir: &Path, toolchain: &Toolchain) -> ControllerResult<JobTracker> {
    let backend = create_backend(&config.scheduler.kind, toolchain)?;
    JobTracker::open(backend, config.tracker_settings(data_dir))
}

fn open_case_store(config: &SessionConfig, data_dir: &Path) -> ControllerResult<DirectoryCaseStore> {
    let store = DirectoryCaseStore::new(
        config.template_dir(data_dir),
        config.pending_dir(data_dir),
        config.archive_dir(data_dir),
        config.links(),
    )
    .with_script_prefix(config.template.submission_script.clone());
    store.verify_template()?;
    Ok(store)
}

async fn run(config: SessionConfig, data_dir: &Path) -> ControllerResult<()> {
    let toolchain = Toolchain::from_env();
    let tracker = open_tracker(&config, data_dir, &toolchain)?;
    let cases = open_case_store(&config, data_dir)?;
    let optimizer = optimizer::create(&config.optimizer)?;

    let mut session = Session::new(data_dir, optimizer, cases, Some(tracker));
    if let Some(script) = config.acquisition_script(data_dir) {
        session = session.with_offload(script);
    }
    session.run().await?;
    logging::log_shutdown(ProcessId::current(), "search exhausted");
    Ok(())
}

async fn generate(config: SessionConfig, data_dir: &Path, count: usize) -> ControllerResult<()> {
    let cases = open_case_store(&config, data_dir)?;
    let optimizer = optimizer::create(&config.optimizer)?;

    let mut session = Session::new(data_dir, optimizer, cases, None);
    let created = session.generate(count).await?;
    for case in &created {
        println!("{}\t{}", case.name, case.path.display());
    }
    logging::log_progress(
        ProcessId::current(),
        "Generate",
        &format!("{} of {} requested case(s) created", created.len(), count),
    );
    Ok(())
}

async fn status(config: SessionConfig, data_dir: &Path) -> ControllerResult<()> {
    let tracker = open_tracker(&config, data_dir, &Toolchain::from_env())?;
    println!("{}", tracker.status_summary());

    let cases = open_case_store(&config, data_dir)?.cases().await?;
    let successful = cases.iter().filter(|case| case.is_successful()).count();
    let failed = cases.iter().filter(|case| case.is_failed()).count();
    println!(
        "{} case(s): {} successful, {} failed, {} pending",
        cases.len(),
        successful,
        failed,
        cases.len() - successful - failed
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ControllerResult<()> {
    let cli = Cli::parse();

    // Environment file is only read here, never inside the library
    dotenv::dotenv().ok();

    ProcessId::init_controller();
    logging::init_tracing_with_level(Some(&cli.log_level));

    // Jobs run inside their case directories, so every derived path must be absolute
    let data_dir = std::fs::canonicalize(&cli.data_dir).map_err(|e| {
        ControllerError::config(format!("cannot resolve data directory {}: {e}", cli.data_dir.display()))
    })?;
    let config = SessionConfig::load(&data_dir)?;
    process_debug!(
        ProcessId::current(),
        "Loaded campaign '{}' from {}",
        config.session.name,
        data_dir.display()
    );

    let result = match cli.command {
        Command::Run => {
            logging::log_startup(ProcessId::current(), &format!("campaign '{}'", config.session.name));
            run(config, &data_dir).await
        }
        Command::Generate { count } => generate(config, &data_dir, count).await,
        Command::Status => status(config, &data_dir).await,
    };

    match &result {
        Ok(()) => logging::log_success(ProcessId::current(), "Controller finished"),
        Err(error) => logging::log_error(ProcessId::current(), "Controller stopped", error),
    }
    result
}
