use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single ordered step of a runbook. `disruptive` steps are gated by the
/// maintenance window (msp-healing); `rollback_of` links a step to the step
/// index it undoes, used when the healing engine reverts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunbookStep {
    pub name: String,
    pub script: String,
    pub timeout_s: u64,
    pub resource_cost_tier: u8,
    pub disruptive: bool,
    pub post_conditions: Vec<String>,
    pub rollback_script: Option<String>,
}

/// Versioned, immutable remediation procedure. New revisions get new ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runbook {
    pub runbook_id: String,
    pub version: u32,
    pub steps: Vec<RunbookStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOp {
    Eq,
    Ne,
    In,
    Matches,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: ConditionOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    Builtin,
    Yaml,
    Synced,
}

/// Fires only when every condition matches. `source = builtin` rules are
/// never synced from, or promoted to, the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct L1Rule {
    pub rule_id: String,
    pub conditions: Vec<Condition>,
    pub runbook_id: String,
    pub source: RuleSource,
    pub min_confidence: Option<f64>,
}
