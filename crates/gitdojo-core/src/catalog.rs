//! Scenario Catalog: the immutable, ordered registry of stages.
//!
//! Catalogs are declared in TOML as an array of `[[scenario]]` tables and
//! checked once at load time. After that every scenario is shared
//! read-only behind an `Arc`.

use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;

use crate::domain::{CatalogError, DojoError, Result, Scenario, StageId};
use crate::repo::resolve_in_repo;
use crate::validation::ValidationRule;

const BUILTIN_CATALOG: &str = include_str!("../scenarios/builtin.toml");

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    scenario: Vec<Scenario>,
}

/// Ordered stage registry.
#[derive(Debug, Clone)]
pub struct ScenarioCatalog {
    scenarios: Vec<Arc<Scenario>>,
}

impl ScenarioCatalog {
    /// The stages shipped with gitdojo.
    pub fn builtin() -> std::result::Result<Self, CatalogError> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    pub fn from_toml_str(raw: &str) -> std::result::Result<Self, CatalogError> {
        let file: CatalogFile =
            toml::from_str(raw).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::from_scenarios(file.scenario)
    }

    pub fn from_path(path: &Path) -> std::result::Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Validate and order scenarios by stage id.
    pub fn from_scenarios(mut scenarios: Vec<Scenario>) -> std::result::Result<Self, CatalogError> {
        if scenarios.is_empty() {
            return Err(CatalogError::Empty);
        }
        scenarios.sort_by_key(|s| s.stage_id);
        for pair in scenarios.windows(2) {
            if pair[0].stage_id == pair[1].stage_id {
                return Err(CatalogError::DuplicateStage(pair[0].stage_id));
            }
        }
        for scenario in &scenarios {
            check_scenario(scenario)?;
        }
        tracing::debug!(stages = scenarios.len(), "scenario catalog loaded");
        Ok(Self {
            scenarios: scenarios.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn get(&self, stage_id: StageId) -> Result<Arc<Scenario>> {
        self.position(stage_id)
            .map(|i| Arc::clone(&self.scenarios[i]))
            .ok_or(DojoError::ScenarioNotFound(stage_id))
    }

    /// All scenarios, ordered by stage id.
    pub fn list(&self) -> &[Arc<Scenario>] {
        &self.scenarios
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Index of a stage in catalog order.
    pub fn position(&self, stage_id: StageId) -> Option<usize> {
        self.scenarios
            .binary_search_by_key(&stage_id, |s| s.stage_id)
            .ok()
    }

    pub fn at(&self, index: usize) -> Option<&Arc<Scenario>> {
        self.scenarios.get(index)
    }
}

fn invalid(scenario: &Scenario, reason: impl Into<String>) -> CatalogError {
    CatalogError::InvalidScenario {
        stage_id: scenario.stage_id,
        reason: reason.into(),
    }
}

fn check_scenario(scenario: &Scenario) -> std::result::Result<(), CatalogError> {
    if scenario.title.trim().is_empty() {
        return Err(invalid(scenario, "title is empty"));
    }
    if scenario.objective.trim().is_empty() {
        return Err(invalid(scenario, "objective is empty"));
    }

    let seed = &scenario.seed;
    if seed.default_branch.trim().is_empty() {
        return Err(invalid(scenario, "default branch name is empty"));
    }
    if !seed.branches.is_empty() && seed.commits.is_empty() && seed.files.is_empty() {
        return Err(invalid(scenario, "branches need at least one base commit"));
    }
    if seed.reset_to.as_deref().is_some_and(|r| r.trim().is_empty()) {
        return Err(invalid(scenario, "reset_to is empty"));
    }
    if let Some(branch) = seed.branches.iter().find(|b| b.name.trim().is_empty()) {
        return Err(invalid(scenario, format!("branch with empty name: {branch:?}")));
    }

    // Any root works here; only the relative shape of the path is checked.
    let probe_root = Path::new("repo");
    for path in seed
        .paths()
        .chain(scenario.validation.rules().filter_map(ValidationRule::path))
    {
        resolve_in_repo(probe_root, path)
            .map_err(|_| invalid(scenario, format!("path {path:?} escapes the repository")))?;
    }

    if scenario.validation.must_have.is_empty() {
        return Err(invalid(scenario, "at least one must_have rule is required"));
    }
    for rule in scenario.validation.rules() {
        if let ValidationRule::SimulatedCommandMatches { pattern } = rule {
            Regex::new(pattern)
                .map_err(|e| invalid(scenario, format!("bad pattern {pattern:?}: {e}")))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationRuleSet;

    fn scenario(stage_id: StageId) -> Scenario {
        Scenario {
            stage_id,
            title: format!("Stage {stage_id}"),
            objective: "do it".into(),
            hint: "hint".into(),
            solution: "solution".into(),
            constraints: vec![],
            seed: Default::default(),
            validation: ValidationRuleSet::new().must_have(ValidationRule::WorktreeClean),
        }
    }

    #[test]
    fn builtin_catalog_loads_in_order() {
        let catalog = ScenarioCatalog::builtin().unwrap();
        assert_eq!(catalog.len(), 21);
        let ids: Vec<StageId> = catalog.list().iter().map(|s| s.stage_id).collect();
        assert_eq!(ids, (1..=21).collect::<Vec<_>>());
        assert_eq!(catalog.get(1).unwrap().title, "Cherry-pick Hotfix");
    }

    #[test]
    fn list_is_sorted_regardless_of_input_order() {
        let catalog =
            ScenarioCatalog::from_scenarios(vec![scenario(3), scenario(1), scenario(2)]).unwrap();
        let ids: Vec<StageId> = catalog.list().iter().map(|s| s.stage_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(catalog.position(3), Some(2));
        assert_eq!(catalog.at(0).unwrap().stage_id, 1);
    }

    #[test]
    fn missing_stage_is_scenario_not_found() {
        let catalog = ScenarioCatalog::from_scenarios(vec![scenario(1)]).unwrap();
        assert!(matches!(
            catalog.get(99),
            Err(DojoError::ScenarioNotFound(99))
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = ScenarioCatalog::from_scenarios(vec![scenario(1), scenario(1)]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateStage(1)));
    }

    #[test]
    fn empty_catalog_is_rejected() {
        assert!(matches!(
            ScenarioCatalog::from_scenarios(vec![]),
            Err(CatalogError::Empty)
        ));
        assert!(matches!(
            ScenarioCatalog::from_toml_str(""),
            Err(CatalogError::Empty)
        ));
    }

    #[test]
    fn scenario_without_must_have_is_rejected() {
        let mut s = scenario(1);
        s.validation = ValidationRuleSet::new();
        let err = ScenarioCatalog::from_scenarios(vec![s]).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidScenario { stage_id: 1, .. }));
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let mut s = scenario(4);
        s.seed.files.insert("../outside.txt".into(), "x".into());
        let err = ScenarioCatalog::from_scenarios(vec![s]).unwrap_err();
        assert!(err.to_string().contains("escapes the repository"));
    }

    #[test]
    fn bad_simulated_pattern_is_rejected() {
        let mut s = scenario(2);
        s.validation = ValidationRuleSet::new().must_have(ValidationRule::SimulatedCommandMatches {
            pattern: "rebase (".into(),
        });
        assert!(ScenarioCatalog::from_scenarios(vec![s]).is_err());
    }

    #[test]
    fn toml_catalog_parses_seed_and_rules() {
        let raw = r#"
            [[scenario]]
            stage_id = 7
            title = "Tag it"
            objective = "Create v1"

            [[scenario.seed.commits]]
            message = "Prepare release"
            files = { "CHANGELOG.md" = "v0.1.0\n" }

            [scenario.validation]
            must_have = [{ type = "tag_exists", name = "v1" }]
        "#;
        let catalog = ScenarioCatalog::from_toml_str(raw).unwrap();
        let s = catalog.get(7).unwrap();
        assert_eq!(s.seed.default_branch, "main");
        assert_eq!(s.seed.commits[0].files["CHANGELOG.md"], "v0.1.0\n");
        assert_eq!(
            s.validation.must_have,
            vec![ValidationRule::TagExists { name: "v1".into() }]
        );
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        assert!(matches!(
            ScenarioCatalog::from_toml_str("[[scenario]\nstage_id ="),
            Err(CatalogError::Parse(_))
        ));
    }
}
