use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Immutable once emitted by the drift scanner (C2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftFinding {
    pub hostname: String,
    pub check_type: String,
    pub passed: bool,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub severity: Severity,
    pub hipaa_control: Option<String>,
    pub evidence_data: Option<serde_json::Value>,
}
