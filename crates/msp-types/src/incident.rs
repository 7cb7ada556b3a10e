use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failed,
    Reverted,
    Deferred,
    Alert,
}

/// One remediation attempt against an incident. Runbooks are referenced by
/// id only (never by pointer) per the data-model's no-ownership-cycle rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionTaken {
    pub runbook_id: String,
    pub step_index: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub success: Option<bool>,
    pub pre_state: Option<serde_json::Value>,
    pub notes: Option<String>,
}

/// Created from a drift finding that did not pass. Carries zero or more
/// `ActionTaken` and ends with exactly one terminal `Outcome`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub site_id: String,
    pub host_id: String,
    pub incident_type: String,
    pub severity: Severity,
    pub raw_data: serde_json::Value,
    pub pattern_signature: String,
    pub created_at: DateTime<Utc>,
    pub actions: Vec<ActionTaken>,
    pub outcome: Option<Outcome>,
}

impl Incident {
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }
}
