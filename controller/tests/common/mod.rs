//! Common test utilities and infrastructure
//!
//! Shared fixtures and builders for the controller integration tests.

pub mod fixtures;
pub mod helpers;

// Re-export commonly used items for convenience
pub use fixtures::TestFixtures;
pub use helpers::{Campaign, FakeScheduler};
