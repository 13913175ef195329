//! gitdojo core library
//!
//! Stage session engine: seeds a throwaway repository per stage, runs the
//! player's git commands against it, validates the result and moves the
//! session through its stages.

pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod doctor;
pub mod domain;
pub mod gateway;
pub mod leaderboard;
pub mod metrics;
pub mod obs;
pub mod repo;
pub mod scoring;
pub mod session;
pub mod telemetry;
pub mod validation;

pub use bootstrap::{commit_graph_fingerprint, seed_repository, RepositoryBootstrapper};
pub use catalog::ScenarioCatalog;
pub use config::EngineConfig;
pub use doctor::{parse_git_version, run_doctor, CheckResult};
pub use domain::{
    CatalogError, DojoError, Identity, Result, Scenario, SeedBranch, SeedCommit, SeedSpec,
    SessionId, StageId, StageOutcome,
};
pub use gateway::{CommandErrorKind, CommandGateway, CommandOutcome, Disposition};
pub use leaderboard::{rank_leaderboard, LeaderboardEntry};
pub use repo::{
    AttemptKey, EngineError, GitCliEngine, RepositoryEngine, RepositoryHandle, SimulatedCommand,
};
pub use scoring::{ScoreWeights, ScoringPolicy, SessionMetrics, StandardScoring};
pub use session::{
    HelpKind, HelpResponse, Session, SessionManager, SessionState, SessionSummary, StageRuntime,
    StageView, SubmitResponse,
};
pub use validation::{
    Polarity, RuleFailure, ValidationEngine, ValidationResult, ValidationRule, ValidationRuleSet,
};

pub use gitdojo_state::{LedgerConfig, SessionLedger, SessionRecord, SurrealSessionLedger};

/// Crate version, shown by the CLI banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
