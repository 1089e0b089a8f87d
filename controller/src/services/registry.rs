//! Name → constructor table for scheduler backends

use crate::error::{ControllerError, ControllerResult};
use crate::services::local::LocalScheduler;
use crate::services::queue::{QueueDialect, QueueScheduler};
use crate::services::toolchain::Toolchain;
use crate::traits::SchedulerBackend;

type Constructor = fn(&Toolchain) -> Box<dyn SchedulerBackend>;

fn local(toolchain: &Toolchain) -> Box<dyn SchedulerBackend> {
    Box::new(LocalScheduler::new(toolchain))
}

fn sge(toolchain: &Toolchain) -> Box<dyn SchedulerBackend> {
    Box::new(QueueScheduler::new(QueueDialect::Sge, toolchain))
}

fn slurm(toolchain: &Toolchain) -> Box<dyn SchedulerBackend> {
    Box::new(QueueScheduler::new(QueueDialect::Slurm, toolchain))
}

const BACKENDS: [(&str, Constructor); 3] = [("local", local), ("sge", sge), ("slurm", slurm)];

/// Names accepted by [`create_backend`]
pub fn backend_names() -> Vec<&'static str> {
    BACKENDS.iter().map(|(name, _)| *name).collect()
}

/// Build the backend registered under `name` (case-insensitive)
pub fn create_backend(name: &str, toolchain: &Toolchain) -> ControllerResult<Box<dyn SchedulerBackend>> {
    let wanted = name.to_ascii_lowercase();
    BACKENDS
        .iter()
        .find(|(registered, _)| *registered == wanted)
        .map(|(_, construct)| construct(toolchain))
        .ok_or_else(|| ControllerError::UnknownScheduler { name: name.to_string() })
}
