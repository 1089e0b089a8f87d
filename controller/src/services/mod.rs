//! Service implementations
//!
//! Real implementations of the scheduler and case store traits. These are
//! the only parts of the controller that spawn processes or touch case
//! directories.

pub mod case_store;
pub mod local;
pub mod queue;
pub mod registry;
pub mod toolchain;

#[cfg(test)]
mod tests;

pub use case_store::DirectoryCaseStore;
pub use local::LocalScheduler;
pub use queue::{QueueDialect, QueueScheduler};
pub use registry::create_backend;
pub use toolchain::Toolchain;
