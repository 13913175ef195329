//! gitdojo-state: persistence for finished training sessions
//!
//! This crate owns the only durable data the engine produces: one append-only
//! [`SessionRecord`] per session that reached the final stage. Everything
//! else (sessions in flight, repositories) is ephemeral.
//!
//! ## Key Components
//!
//! - `SessionLedger`: backend-agnostic async trait (append / list)
//! - `SurrealSessionLedger`: SurrealDB implementation (`mem://`, `surrealkv://`, …)
//! - `fakes::MemorySessionLedger`: in-memory implementation for tests

mod config;
mod error;
pub mod fakes;
mod migrations;
pub mod storage_traits;
pub mod surreal_ledger;

pub use config::LedgerConfig;
pub use error::{StateError, StorageError};
pub use storage_traits::{SessionLedger, SessionRecord, StageMetrics, StorageResult};
pub use surreal_ledger::SurrealSessionLedger;

/// Result type for gitdojo-state setup operations
pub type Result<T> = std::result::Result<T, StateError>;
