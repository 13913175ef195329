//! Score derivation.
//!
//! A score only ever goes down as time, commands or help go up, and only
//! ever goes up as stages are completed.

use gitdojo_state::SessionRecord;
use serde::{Deserialize, Serialize};

use crate::domain::StageOutcome;

/// Totals over a session's outcome history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub stages_completed: u32,
    pub total_commands: u32,
    pub total_elapsed_ms: u64,
    pub hints_used: u32,
    pub solutions_used: u32,
}

impl SessionMetrics {
    pub fn from_outcomes(outcomes: &[StageOutcome]) -> Self {
        outcomes.iter().filter(|o| o.passed).fold(Self::default(), |mut m, o| {
            m.stages_completed += 1;
            m.total_commands += o.commands;
            m.total_elapsed_ms += o.elapsed_ms;
            m.hints_used += u32::from(o.hint_used);
            m.solutions_used += u32::from(o.solution_used);
            m
        })
    }

    pub fn from_record(record: &SessionRecord) -> Self {
        record.stages.iter().fold(Self::default(), |mut m, s| {
            m.stages_completed += 1;
            m.total_commands += s.commands;
            m.total_elapsed_ms += s.elapsed_ms;
            m.hints_used += u32::from(s.hint_used);
            m.solutions_used += u32::from(s.solution_used);
            m
        })
    }

    /// Whole seconds, rounded down.
    pub fn elapsed_secs(&self) -> u64 {
        self.total_elapsed_ms / 1000
    }
}

/// Turns session metrics into a rankable number.
pub trait ScoringPolicy: Send + Sync {
    fn name(&self) -> &str;

    fn score(&self, metrics: &SessionMetrics) -> f64;
}

/// Coefficients for [`StandardScoring`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub per_stage: f64,
    pub command_budget: f64,
    pub per_command: f64,
    pub time_budget_secs: f64,
    pub per_second: f64,
    pub per_hint: f64,
    pub per_solution: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            per_stage: 120.0,
            command_budget: 250.0,
            per_command: 2.0,
            time_budget_secs: 300.0,
            per_second: 1.0,
            per_hint: 5.0,
            per_solution: 10.0,
        }
    }
}

/// Stage reward plus command and time bonuses (each floored at zero),
/// minus help penalties; never below zero.
#[derive(Debug, Clone, Default)]
pub struct StandardScoring {
    pub weights: ScoreWeights,
}

impl StandardScoring {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }
}

impl ScoringPolicy for StandardScoring {
    fn name(&self) -> &str {
        "standard"
    }

    fn score(&self, m: &SessionMetrics) -> f64 {
        let w = &self.weights;
        let stages = f64::from(m.stages_completed) * w.per_stage;
        let command_bonus = (w.command_budget - f64::from(m.total_commands) * w.per_command).max(0.0);
        let time_bonus = (w.time_budget_secs - m.elapsed_secs() as f64 * w.per_second).max(0.0);
        let penalty =
            f64::from(m.hints_used) * w.per_hint + f64::from(m.solutions_used) * w.per_solution;
        (stages + command_bonus + time_bonus - penalty).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn metrics(stages: u32, commands: u32, secs: u64, hints: u32, solutions: u32) -> SessionMetrics {
        SessionMetrics {
            stages_completed: stages,
            total_commands: commands,
            total_elapsed_ms: secs * 1000,
            hints_used: hints,
            solutions_used: solutions,
        }
    }

    #[test]
    fn standard_formula() {
        let s = StandardScoring::default();
        // 2*120 + (250 - 10*2) + (300 - 100) - 5 - 10
        assert_eq!(s.score(&metrics(2, 10, 100, 1, 1)), 655.0);
    }

    #[test]
    fn bonuses_floor_at_zero() {
        let s = StandardScoring::default();
        assert_eq!(s.score(&metrics(1, 500, 10_000, 0, 0)), 120.0);
        assert_eq!(s.score(&metrics(0, 500, 10_000, 3, 3)), 0.0);
    }

    #[test]
    fn monotonic_in_each_input() {
        let s = StandardScoring::default();
        let base = s.score(&metrics(2, 10, 60, 0, 0));
        assert!(s.score(&metrics(3, 10, 60, 0, 0)) > base);
        assert!(s.score(&metrics(2, 11, 60, 0, 0)) <= base);
        assert!(s.score(&metrics(2, 10, 61, 0, 0)) <= base);
        assert!(s.score(&metrics(2, 10, 60, 1, 0)) <= base);
        assert!(s.score(&metrics(2, 10, 60, 0, 1)) <= base);
    }

    #[test]
    fn metrics_ignore_unpassed_outcomes() {
        let passed = StageOutcome {
            stage_id: 1,
            passed: true,
            commands: 3,
            hint_used: true,
            solution_used: false,
            repeated: true,
            elapsed_ms: 4_000,
            completed_at: Utc::now(),
        };
        let failed = StageOutcome {
            passed: false,
            stage_id: 2,
            ..passed.clone()
        };
        let m = SessionMetrics::from_outcomes(&[passed, failed]);
        assert_eq!(m, metrics(1, 3, 4, 1, 0));
    }
}
