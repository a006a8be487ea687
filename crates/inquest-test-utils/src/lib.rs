//! Testing utilities for the Inquest investigation console.
//!
//! This crate provides standardized testing utilities for the engine:
//! mocks, a scripted in-memory fake of the remote API, test data
//! builders, and logging setup helpers.

pub mod builders;
pub mod implementations;
pub mod mocks;
pub mod util;

/// Re-export commonly used types for convenience
pub use mockall;

pub use implementations::fake_api::{ApiEvent, ApiMethod, FakeInvestigationApi};
pub use mocks::investigation_api::MockInvestigationApi;
