//! Domain models for gitdojo.
//!
//! Canonical definitions for the core entities:
//! - `Scenario`: Immutable stage definition (seed + rules + help text)
//! - `SeedSpec`: Deterministic repository layout for a stage
//! - `StageOutcome`: Append-only record of a passed stage
//! - `SessionId`: Identity of one play-through

pub mod error;
pub mod outcome;
pub mod scenario;

pub use error::{CatalogError, DojoError, Result};
pub use outcome::{SessionId, StageId, StageOutcome};
pub use scenario::{Identity, Scenario, SeedBranch, SeedCommit, SeedSpec};
