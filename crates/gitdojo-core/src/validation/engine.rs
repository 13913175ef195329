//! Rule evaluation.
//!
//! `must_have` rules are walked in order, then `must_not_have`; evaluation
//! stops at the first failure. The repository is only ever read, so two
//! evaluations with no command in between agree.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::rule::ValidationRule;
use crate::domain::Scenario;
use crate::repo::{
    BranchInfo, CommitInfo, EngineResult, RepositoryEngine, RepositoryHandle, WorktreeStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    MustHave,
    MustNotHave,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::MustHave => "must_have",
            Polarity::MustNotHave => "must_not_have",
        }
    }
}

/// The rule that stopped evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFailure {
    pub polarity: Polarity,
    pub rule: ValidationRule,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub first_failure: Option<RuleFailure>,
}

impl ValidationResult {
    fn pass() -> Self {
        Self {
            passed: true,
            first_failure: None,
        }
    }

    fn fail(failure: RuleFailure) -> Self {
        Self {
            passed: false,
            first_failure: Some(failure),
        }
    }

    /// Human-readable reason, `None` when passed.
    pub fn reason(&self) -> Option<&str> {
        self.first_failure.as_ref().map(|f| f.reason.as_str())
    }
}

/// Whether a rule holds, with a short account of what was observed.
struct Check {
    holds: bool,
    detail: String,
}

impl Check {
    fn new(holds: bool, detail: impl Into<String>) -> Self {
        Self {
            holds,
            detail: detail.into(),
        }
    }
}

/// Read-only view of one repository, fetched lazily and cached for the
/// duration of a single evaluation.
struct Probe<'a> {
    engine: &'a dyn RepositoryEngine,
    repo: &'a Path,
    log: Option<Vec<CommitInfo>>,
    branches: Option<Vec<BranchInfo>>,
    current: Option<Option<String>>,
    status: Option<WorktreeStatus>,
    stash: Option<usize>,
    tags: Option<Vec<String>>,
    files: HashMap<String, Option<String>>,
}

impl<'a> Probe<'a> {
    fn new(engine: &'a dyn RepositoryEngine, repo: &'a Path) -> Self {
        Self {
            engine,
            repo,
            log: None,
            branches: None,
            current: None,
            status: None,
            stash: None,
            tags: None,
            files: HashMap::new(),
        }
    }

    async fn log(&mut self) -> EngineResult<&[CommitInfo]> {
        if self.log.is_none() {
            self.log = Some(self.engine.log(self.repo).await?);
        }
        Ok(self.log.as_deref().unwrap_or_default())
    }

    async fn branches(&mut self) -> EngineResult<&[BranchInfo]> {
        if self.branches.is_none() {
            self.branches = Some(self.engine.branches(self.repo).await?);
        }
        Ok(self.branches.as_deref().unwrap_or_default())
    }

    async fn current_branch(&mut self) -> EngineResult<Option<&str>> {
        if self.current.is_none() {
            self.current = Some(self.engine.current_branch(self.repo).await?);
        }
        Ok(self.current.as_ref().and_then(|c| c.as_deref()))
    }

    async fn status(&mut self) -> EngineResult<&WorktreeStatus> {
        if self.status.is_none() {
            self.status = Some(self.engine.status(self.repo).await?);
        }
        Ok(self.status.get_or_insert_with(WorktreeStatus::default))
    }

    async fn stash_count(&mut self) -> EngineResult<usize> {
        if self.stash.is_none() {
            self.stash = Some(self.engine.stash_count(self.repo).await?);
        }
        Ok(self.stash.unwrap_or_default())
    }

    async fn tags(&mut self) -> EngineResult<&[String]> {
        if self.tags.is_none() {
            self.tags = Some(self.engine.tags(self.repo).await?);
        }
        Ok(self.tags.as_deref().unwrap_or_default())
    }

    async fn file(&mut self, path: &str) -> EngineResult<Option<&str>> {
        if !self.files.contains_key(path) {
            let content = self.engine.read_file(self.repo, path).await?;
            self.files.insert(path.to_string(), content);
        }
        Ok(self.files.get(path).and_then(|c| c.as_deref()))
    }
}

/// Evaluates scenario rule sets against repository handles.
pub struct ValidationEngine {
    engine: Arc<dyn RepositoryEngine>,
}

impl ValidationEngine {
    pub fn new(engine: Arc<dyn RepositoryEngine>) -> Self {
        Self { engine }
    }

    /// Never fails: a rule whose state cannot be read counts as failing.
    pub async fn evaluate(&self, handle: &RepositoryHandle, scenario: &Scenario) -> ValidationResult {
        let mut probe = Probe::new(self.engine.as_ref(), handle.path());
        let rules = &scenario.validation;

        for rule in &rules.must_have {
            match check_rule(&mut probe, handle, rule).await {
                Ok(check) if check.holds => {}
                Ok(check) => {
                    return ValidationResult::fail(RuleFailure {
                        polarity: Polarity::MustHave,
                        rule: rule.clone(),
                        reason: format!("must_have {rule} failed: {}", check.detail),
                    })
                }
                Err(e) => return unreadable(Polarity::MustHave, rule, &e),
            }
        }

        for rule in &rules.must_not_have {
            match check_rule(&mut probe, handle, rule).await {
                Ok(check) if !check.holds => {}
                Ok(check) => {
                    return ValidationResult::fail(RuleFailure {
                        polarity: Polarity::MustNotHave,
                        rule: rule.clone(),
                        reason: format!("must_not_have {rule} matched: {}", check.detail),
                    })
                }
                Err(e) => return unreadable(Polarity::MustNotHave, rule, &e),
            }
        }

        ValidationResult::pass()
    }
}

fn unreadable(
    polarity: Polarity,
    rule: &ValidationRule,
    error: &dyn std::fmt::Display,
) -> ValidationResult {
    tracing::warn!(rule = %rule, error = %error, "validation probe failed");
    ValidationResult::fail(RuleFailure {
        polarity,
        rule: rule.clone(),
        reason: format!(
            "{} {rule} could not be checked: {error}",
            polarity.as_str()
        ),
    })
}

async fn check_rule(
    probe: &mut Probe<'_>,
    handle: &RepositoryHandle,
    rule: &ValidationRule,
) -> EngineResult<Check> {
    let check = match rule {
        ValidationRule::HeadMessageContains { value } => match probe.log().await?.first() {
            Some(head) => Check::new(
                head.message.contains(value.as_str()),
                format!("HEAD message is {:?}", first_line(&head.message)),
            ),
            None => Check::new(false, "repository has no commits"),
        },
        ValidationRule::FileContains { path, value } => match probe.file(path).await? {
            Some(content) => Check::new(
                content.contains(value.as_str()),
                format!("{path} does not contain {value:?}"),
            ),
            None => Check::new(false, format!("{path} does not exist")),
        },
        ValidationRule::FileExists { path } => match probe.file(path).await? {
            Some(_) => Check::new(true, format!("{path} exists")),
            None => Check::new(false, format!("{path} does not exist")),
        },
        ValidationRule::FileNotExists { path } => match probe.file(path).await? {
            Some(_) => Check::new(false, format!("{path} still exists")),
            None => Check::new(true, format!("{path} does not exist")),
        },
        ValidationRule::CommitCountAtMost { value } => {
            let count = probe.log().await?.len();
            Check::new(
                count <= *value,
                format!("HEAD history has {count} commits"),
            )
        }
        ValidationRule::HasMergeCommits => {
            let merges = probe.log().await?.iter().filter(|c| c.is_merge()).count();
            Check::new(merges > 0, format!("HEAD history has {merges} merge commits"))
        }
        ValidationRule::NoMergeCommits => {
            let merges = probe.log().await?.iter().filter(|c| c.is_merge()).count();
            Check::new(merges == 0, format!("HEAD history has {merges} merge commits"))
        }
        ValidationRule::BranchIsCurrent { name } => match probe.current_branch().await? {
            Some(current) => Check::new(
                current == name,
                format!("current branch is {current}"),
            ),
            None => Check::new(false, "HEAD is detached"),
        },
        ValidationRule::BranchExists { name } => {
            let exists = probe.branches().await?.iter().any(|b| &b.name == name);
            let detail = if exists {
                format!("branch {name} exists")
            } else {
                format!("branch {name} does not exist")
            };
            Check::new(exists, detail)
        }
        ValidationRule::StashCountAtLeast { value } => {
            let count = probe.stash_count().await?;
            Check::new(count >= *value, format!("stash has {count} entries"))
        }
        ValidationRule::WorktreeClean => {
            let status = probe.status().await?;
            let dirty = status.staged.len() + status.modified.len() + status.untracked.len();
            Check::new(
                status.is_clean(),
                format!("{dirty} uncommitted changes in the working tree"),
            )
        }
        ValidationRule::CommitMessageContains { value } => {
            let found = probe
                .log()
                .await?
                .iter()
                .any(|c| c.message.contains(value.as_str()));
            let detail = if found {
                format!("a commit mentions {value:?}")
            } else {
                format!("no commit in HEAD history mentions {value:?}")
            };
            Check::new(found, detail)
        }
        ValidationRule::TagExists { name } => {
            let exists = probe.tags().await?.iter().any(|t| t == name);
            let detail = if exists {
                format!("tag {name} exists")
            } else {
                format!("tag {name} does not exist")
            };
            Check::new(exists, detail)
        }
        ValidationRule::SimulatedCommandMatches { pattern } => match Regex::new(pattern) {
            Ok(re) => {
                let hit = handle.simulated().iter().any(|s| re.is_match(&s.raw));
                let detail = if hit {
                    "a simulated command matched".to_string()
                } else {
                    format!("{} simulated commands, none matched", handle.simulated().len())
                };
                Check::new(hit, detail)
            }
            Err(e) => Check::new(false, format!("invalid pattern: {e}")),
        },
    };
    Ok(check)
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::seed_repository;
    use crate::domain::{SeedBranch, SeedCommit, SeedSpec, SessionId};
    use crate::repo::{AttemptKey, GitCliEngine};
    use crate::validation::ValidationRuleSet;
    use std::collections::BTreeMap;

    fn commit(message: &str, path: &str, content: &str) -> SeedCommit {
        SeedCommit {
            message: message.into(),
            files: BTreeMap::from([(path.to_string(), content.to_string())]),
        }
    }

    fn scenario(seed: SeedSpec, validation: ValidationRuleSet) -> Scenario {
        Scenario {
            stage_id: 6,
            title: "t".into(),
            objective: "o".into(),
            hint: String::new(),
            solution: String::new(),
            constraints: vec![],
            seed,
            validation,
        }
    }

    async fn handle_for(seed: &SeedSpec) -> (Arc<dyn RepositoryEngine>, RepositoryHandle) {
        let engine: Arc<dyn RepositoryEngine> = Arc::new(GitCliEngine::new());
        let dir = tempfile::tempdir().unwrap();
        seed_repository(engine.as_ref(), dir.path(), seed).await.unwrap();
        let handle = RepositoryHandle::new(AttemptKey::new(SessionId::new(), 6), 1, dir);
        (engine, handle)
    }

    fn branching_seed() -> SeedSpec {
        SeedSpec {
            commits: vec![
                commit("Initial import", "app.py", "def add(a, b):\n    return a + b\n"),
                commit("Add docs", "docs.txt", "docs\n"),
            ],
            branches: vec![SeedBranch {
                name: "feature".into(),
                start_point: None,
                commits: vec![commit("Feature work", "feature.txt", "wip\n")],
            }],
            ..SeedSpec::default()
        }
    }

    #[tokio::test]
    async fn branch_is_current_fails_on_main() {
        let seed = branching_seed();
        let rules = ValidationRuleSet::new().must_have(ValidationRule::BranchIsCurrent {
            name: "feature".into(),
        });
        let (engine, handle) = handle_for(&seed).await;
        let result = ValidationEngine::new(engine)
            .evaluate(&handle, &scenario(seed, rules))
            .await;

        assert!(!result.passed);
        let reason = result.reason().unwrap();
        assert!(reason.starts_with("must_have branch_is_current(\"feature\") failed"));
        assert!(reason.contains("current branch is main"));
    }

    #[tokio::test]
    async fn first_failure_follows_declaration_order() {
        let seed = branching_seed();
        let rules = ValidationRuleSet::new()
            .must_have(ValidationRule::FileExists {
                path: "app.py".into(),
            })
            .must_have(ValidationRule::CommitCountAtMost { value: 1 })
            .must_have(ValidationRule::TagExists {
                name: "v1.0.0".into(),
            });
        let (engine, handle) = handle_for(&seed).await;
        let result = ValidationEngine::new(engine)
            .evaluate(&handle, &scenario(seed, rules))
            .await;

        let failure = result.first_failure.unwrap();
        assert_eq!(failure.polarity, Polarity::MustHave);
        assert_eq!(failure.rule, ValidationRule::CommitCountAtMost { value: 1 });
        assert!(failure.reason.contains("HEAD history has 2 commits"));
    }

    #[tokio::test]
    async fn must_not_have_reports_match() {
        let seed = branching_seed();
        let rules = ValidationRuleSet::new()
            .must_have(ValidationRule::NoMergeCommits)
            .must_not_have(ValidationRule::FileExists {
                path: "docs.txt".into(),
            });
        let (engine, handle) = handle_for(&seed).await;
        let result = ValidationEngine::new(engine)
            .evaluate(&handle, &scenario(seed, rules))
            .await;

        let failure = result.first_failure.unwrap();
        assert_eq!(failure.polarity, Polarity::MustNotHave);
        assert!(failure
            .reason
            .starts_with("must_not_have file_exists(\"docs.txt\") matched"));
    }

    #[tokio::test]
    async fn evaluation_is_idempotent() {
        let seed = branching_seed();
        let rules = ValidationRuleSet::new()
            .must_have(ValidationRule::CommitMessageContains {
                value: "Initial".into(),
            })
            .must_have(ValidationRule::WorktreeClean)
            .must_have(ValidationRule::StashCountAtLeast { value: 1 });
        let (engine, handle) = handle_for(&seed).await;
        let validator = ValidationEngine::new(engine);
        let sc = scenario(seed, rules);

        let first = validator.evaluate(&handle, &sc).await;
        let second = validator.evaluate(&handle, &sc).await;
        assert_eq!(first, second);
        assert!(first.reason().unwrap().contains("stash has 0 entries"));
    }

    #[tokio::test]
    async fn empty_repository_is_a_valid_state() {
        let seed = SeedSpec::default();
        let rules = ValidationRuleSet::new()
            .must_have(ValidationRule::NoMergeCommits)
            .must_have(ValidationRule::HeadMessageContains { value: "x".into() });
        let (engine, handle) = handle_for(&seed).await;
        let result = ValidationEngine::new(engine)
            .evaluate(&handle, &scenario(seed, rules))
            .await;
        assert_eq!(
            result.reason(),
            Some("must_have head_message_contains(\"x\") failed: repository has no commits")
        );
    }

    #[tokio::test]
    async fn simulated_commands_are_matched_by_pattern() {
        let seed = branching_seed();
        let rules = ValidationRuleSet::new().must_have(ValidationRule::SimulatedCommandMatches {
            pattern: r"rebase\s+(-i|--interactive)".into(),
        });
        let (engine, mut handle) = handle_for(&seed).await;
        let validator = ValidationEngine::new(engine);
        let sc = scenario(seed, rules);

        assert!(!validator.evaluate(&handle, &sc).await.passed);
        handle.record_simulated("rebase", "git rebase -i HEAD~2");
        assert!(validator.evaluate(&handle, &sc).await.passed);
    }
}
