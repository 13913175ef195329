//! Validation Engine: judges a stage repository against its rule set.

pub mod engine;
pub mod rule;

pub use engine::{Polarity, RuleFailure, ValidationEngine, ValidationResult};
pub use rule::{ValidationRule, ValidationRuleSet};
