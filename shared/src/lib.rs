//! Shared types for the simulation campaign controller
//!
//! Contains only what both the controller process and the detached
//! acquisition worker need: process identity, logging, the shared error
//! type and the file-based offload artifacts exchanged between them.

pub mod errors;
pub mod logging;
pub mod messages;
pub mod types;

pub use errors::*;
pub use types::*;

// Re-export the offload artifacts
pub use messages::{
    atomic_write_json, read_json, CaseOutcome, DataSnapshot, Parametrization, PendingCase, ResultSnapshot,
};
