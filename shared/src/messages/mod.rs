//! File-based artifacts exchanged between the controller and detached workers
//!
//! - `snapshot`: data/result snapshots of an offloaded acquisition round
//! - `artifact`: atomic JSON persistence shared by every on-disk artifact

pub mod artifact;
pub mod snapshot;

pub use artifact::{atomic_write_json, read_json};
pub use snapshot::{CaseOutcome, DataSnapshot, Parametrization, PendingCase, ResultSnapshot};
