//! Pipeline configuration. Passed explicitly into `analyze_procedure`;
//! nothing reads configuration ambiently.

use serde::{Deserialize, Serialize};

/// Scoring weights and cutoffs for the heuristic passes. All weights sum
/// into a confidence clamped to [0, 1].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Thresholds {
    /// Parameter compared against a literal value.
    pub weight_literal_comparison: f64,
    /// Condition sits in (or directly under) a validation/control block.
    pub weight_control_context: f64,
    /// Branch body returns, throws, or raises.
    pub weight_guard_action: f64,
    /// Condition references a named input parameter.
    pub weight_named_parameter: f64,
    /// Rules scoring below this are dropped silently.
    pub rule_confidence_min: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            weight_literal_comparison: 0.4,
            weight_control_context: 0.3,
            weight_guard_action: 0.2,
            weight_named_parameter: 0.1,
            rule_confidence_min: 0.3,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    /// Basic mode runs the structural passes only; the advisory sections
    /// (rules, patterns, boundaries, complexity, test values) stay empty.
    pub basic: bool,
    pub thresholds: Thresholds,
}

impl AnalysisConfig {
    pub fn basic() -> Self {
        Self {
            basic: true,
            ..Self::default()
        }
    }
}
