//! Declarative validation rules.
//!
//! Rules are plain data, loaded from the catalog TOML with a `type` tag:
//!
//! ```toml
//! must_have = [
//!   { type = "commit_count_at_most", value = 2 },
//!   { type = "head_message_contains", value = "Feature:" },
//! ]
//! ```

use serde::{Deserialize, Serialize};

/// A single predicate over repository state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationRule {
    /// Case-sensitive substring of the HEAD commit message.
    HeadMessageContains { value: String },
    FileContains { path: String, value: String },
    FileExists { path: String },
    FileNotExists { path: String },
    /// Commits reachable from HEAD.
    CommitCountAtMost { value: usize },
    HasMergeCommits,
    NoMergeCommits,
    BranchIsCurrent { name: String },
    BranchExists { name: String },
    StashCountAtLeast { value: usize },
    /// No staged, unstaged or untracked changes.
    WorktreeClean,
    /// Any commit in HEAD history.
    CommitMessageContains { value: String },
    TagExists { name: String },
    /// Regex over the simulated-command log. Only for stages built around
    /// simulated verbs.
    SimulatedCommandMatches { pattern: String },
}

impl ValidationRule {
    /// Snake-case kind tag, as written in the catalog.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationRule::HeadMessageContains { .. } => "head_message_contains",
            ValidationRule::FileContains { .. } => "file_contains",
            ValidationRule::FileExists { .. } => "file_exists",
            ValidationRule::FileNotExists { .. } => "file_not_exists",
            ValidationRule::CommitCountAtMost { .. } => "commit_count_at_most",
            ValidationRule::HasMergeCommits => "has_merge_commits",
            ValidationRule::NoMergeCommits => "no_merge_commits",
            ValidationRule::BranchIsCurrent { .. } => "branch_is_current",
            ValidationRule::BranchExists { .. } => "branch_exists",
            ValidationRule::StashCountAtLeast { .. } => "stash_count_at_least",
            ValidationRule::WorktreeClean => "worktree_clean",
            ValidationRule::CommitMessageContains { .. } => "commit_message_contains",
            ValidationRule::TagExists { .. } => "tag_exists",
            ValidationRule::SimulatedCommandMatches { .. } => "simulated_command_matches",
        }
    }

    /// Kind plus parameters, e.g. `commit_count_at_most(2)`.
    pub fn describe(&self) -> String {
        let kind = self.kind();
        match self {
            ValidationRule::HeadMessageContains { value }
            | ValidationRule::CommitMessageContains { value } => format!("{kind}({value:?})"),
            ValidationRule::FileContains { path, value } => format!("{kind}({path:?}, {value:?})"),
            ValidationRule::FileExists { path } | ValidationRule::FileNotExists { path } => {
                format!("{kind}({path:?})")
            }
            ValidationRule::CommitCountAtMost { value }
            | ValidationRule::StashCountAtLeast { value } => format!("{kind}({value})"),
            ValidationRule::BranchIsCurrent { name }
            | ValidationRule::BranchExists { name }
            | ValidationRule::TagExists { name } => format!("{kind}({name:?})"),
            ValidationRule::SimulatedCommandMatches { pattern } => format!("{kind}(/{pattern}/)"),
            ValidationRule::HasMergeCommits
            | ValidationRule::NoMergeCommits
            | ValidationRule::WorktreeClean => kind.to_string(),
        }
    }

    /// Repository-relative path the rule reads, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            ValidationRule::FileContains { path, .. }
            | ValidationRule::FileExists { path }
            | ValidationRule::FileNotExists { path } => Some(path),
            _ => None,
        }
    }
}

impl std::fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Rules a stage must satisfy: every `must_have` holds and no
/// `must_not_have` does. Declaration order is evaluation order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationRuleSet {
    #[serde(default)]
    pub must_have: Vec<ValidationRule>,
    #[serde(default)]
    pub must_not_have: Vec<ValidationRule>,
}

impl ValidationRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must_have(mut self, rule: ValidationRule) -> Self {
        self.must_have.push(rule);
        self
    }

    pub fn must_not_have(mut self, rule: ValidationRule) -> Self {
        self.must_not_have.push(rule);
        self
    }

    pub fn rules(&self) -> impl Iterator<Item = &ValidationRule> {
        self.must_have.iter().chain(self.must_not_have.iter())
    }
}
