use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    ForceCheckin,
    RunDrift,
    SyncRules,
    RestartAgent,
    NixosRebuild,
    UpdateAgent,
    UpdateIso,
    ViewLogs,
    Diagnostic,
    DeploySensor,
    RemoveSensor,
    DeployLinuxSensor,
    RemoveLinuxSensor,
    SensorStatus,
    UpdateCredentials,
}

/// A signed instruction from the control plane to the appliance. Valid iff
/// the signature verifies, `now() < expires_at`, and `nonce` has not been
/// seen before for this appliance (msp-controlplane owns the nonce ledger).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpOrder {
    pub order_id: String,
    pub order_type: OrderType,
    pub parameters: Value,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub nonce: String,
    pub signature: String,
}

impl McpOrder {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
