//! Stage definitions and their seed layouts.
//!
//! A `Scenario` is loaded once by the catalog and then shared read-only
//! behind an `Arc`. Nothing here touches the filesystem.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::outcome::StageId;
use crate::validation::ValidationRuleSet;

/// Committer identity stamped on every seeded commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: "Git Learner".to_string(),
            email: "learner@example.com".to_string(),
        }
    }
}

/// One commit in a seed sequence: file writes followed by `git commit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedCommit {
    pub message: String,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

/// A named branch created during seeding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedBranch {
    pub name: String,
    /// Revision to branch from; the default branch when absent.
    #[serde(default)]
    pub start_point: Option<String>,
    #[serde(default)]
    pub commits: Vec<SeedCommit>,
}

fn default_branch_name() -> String {
    "main".to_string()
}

fn default_epoch() -> i64 {
    // 2024-01-01T00:00:00Z
    1_704_067_200
}

/// Deterministic description of a stage's starting repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSpec {
    /// Written before the first commit and included in it.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    #[serde(default)]
    pub commits: Vec<SeedCommit>,
    #[serde(default)]
    pub branches: Vec<SeedBranch>,
    #[serde(default = "default_branch_name")]
    pub default_branch: String,
    #[serde(default)]
    pub identity: Identity,
    /// Seconds since the Unix epoch; commit `n` is stamped `epoch + n`.
    #[serde(default = "default_epoch")]
    pub epoch: i64,
    /// Hard-reset the default branch here once every commit is in place.
    /// Commits it drops stay reachable through the reflog only.
    #[serde(default)]
    pub reset_to: Option<String>,
    /// Uncommitted edits applied after the default branch is checked out.
    #[serde(default)]
    pub working_changes: BTreeMap<String, String>,
}

impl Default for SeedSpec {
    fn default() -> Self {
        Self {
            files: BTreeMap::new(),
            commits: Vec::new(),
            branches: Vec::new(),
            default_branch: default_branch_name(),
            identity: Identity::default(),
            epoch: default_epoch(),
            reset_to: None,
            working_changes: BTreeMap::new(),
        }
    }
}

impl SeedSpec {
    /// Every path the seed writes, across base files, commits and branches.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files
            .keys()
            .chain(self.commits.iter().flat_map(|c| c.files.keys()))
            .chain(
                self.branches
                    .iter()
                    .flat_map(|b| b.commits.iter().flat_map(|c| c.files.keys())),
            )
            .chain(self.working_changes.keys())
            .map(String::as_str)
    }
}

/// A single stage: what the player must achieve and how success is judged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub stage_id: StageId,
    pub title: String,
    pub objective: String,
    #[serde(default)]
    pub hint: String,
    #[serde(default)]
    pub solution: String,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub seed: SeedSpec,
    #[serde(default)]
    pub validation: ValidationRuleSet,
}
