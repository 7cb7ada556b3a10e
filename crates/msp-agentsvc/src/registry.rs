//! In-memory agent registry (spec §4.5): two indexes, `agent_id ->
//! AgentState` and `lower(hostname) -> agent_id`, RW-locked so heartbeat
//! reads and drift-stream writes don't serialize behind each other
//! (spec §5: "RW-locked; single writer per mutation").

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use msp_proto::CapabilityTier;

/// A command nudged onto an agent's FIFO, either immediately from a
/// `ReportDrift` ack or queued out-of-band via `queue_command` (e.g. from
/// the appliance main loop reacting to an `McpOrder`).
#[derive(Debug, Clone)]
pub struct QueuedCommand {
    pub command_id: String,
    pub action: String,
    pub timeout_seconds: u32,
    pub params_json: String,
}

#[derive(Debug, Clone)]
pub struct DetectedRmm {
    pub name: String,
    pub version: String,
    pub vendor: String,
}

#[derive(Debug, Clone)]
pub struct AgentState {
    pub agent_id: String,
    pub hostname: String,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub last_drift_at: Option<DateTime<Utc>>,
    pub capability_tier: CapabilityTier,
    pending: VecDeque<QueuedCommand>,
    pub detected_rmms: Vec<DetectedRmm>,
}

#[derive(Default)]
pub struct AgentRegistry {
    by_id: RwLock<HashMap<String, AgentState>>,
    by_hostname: RwLock<HashMap<String, String>>,
}

fn random_suffix() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 4];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `hostname`, always minting a fresh `agent_id` (spec §8
    /// scenario 5: "a second Register for the same hostname issues a new
    /// agent_id"). The hostname index is updated to the new id; the prior
    /// `AgentState` under the old id is left in place but un-addressable
    /// by hostname, matching "indexed case-insensitively" without ever
    /// deleting history the control plane might still want.
    pub async fn register(&self, hostname: &str) -> String {
        let agent_id = format!("go-{hostname}-{}", random_suffix());
        let now = Utc::now();
        let state = AgentState {
            agent_id: agent_id.clone(),
            hostname: hostname.to_string(),
            registered_at: now,
            last_heartbeat: None,
            last_drift_at: None,
            capability_tier: CapabilityTier::MonitorOnly,
            pending: VecDeque::new(),
            detected_rmms: Vec::new(),
        };

        self.by_id.write().await.insert(agent_id.clone(), state);
        self.by_hostname
            .write()
            .await
            .insert(hostname.to_ascii_lowercase(), agent_id.clone());

        agent_id
    }

    pub async fn agent_id_for_hostname(&self, hostname: &str) -> Option<String> {
        self.by_hostname.read().await.get(&hostname.to_ascii_lowercase()).cloned()
    }

    /// O(1) FIFO push; silently a no-op for an unknown agent id (the
    /// immediate-heal path from `ReportDrift` already holds a valid id by
    /// construction, so this only matters for out-of-band callers).
    pub async fn queue_command(&self, agent_id: &str, command: QueuedCommand) {
        if let Some(state) = self.by_id.write().await.get_mut(agent_id) {
            state.pending.push_back(command);
        }
    }

    /// Drain-and-clear: heartbeat with no queued commands returns an
    /// empty list, never absent (spec §8 boundary behavior).
    pub async fn pop_pending_commands(&self, agent_id: &str) -> Vec<QueuedCommand> {
        match self.by_id.write().await.get_mut(agent_id) {
            Some(state) => state.pending.drain(..).collect(),
            None => Vec::new(),
        }
    }

    pub async fn record_heartbeat(&self, agent_id: &str, now: DateTime<Utc>) {
        if let Some(state) = self.by_id.write().await.get_mut(agent_id) {
            state.last_heartbeat = Some(now);
        }
    }

    pub async fn record_drift(&self, agent_id: &str, now: DateTime<Utc>) {
        if let Some(state) = self.by_id.write().await.get_mut(agent_id) {
            state.last_drift_at = Some(now);
        }
    }

    pub async fn record_rmm_status(&self, agent_id: &str, detected: Vec<DetectedRmm>) {
        if let Some(state) = self.by_id.write().await.get_mut(agent_id) {
            state.detected_rmms = detected;
        }
    }

    pub async fn get(&self, agent_id: &str) -> Option<AgentState> {
        self.by_id.read().await.get(agent_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_register_for_same_hostname_issues_new_id() {
        let registry = AgentRegistry::new();
        let first = registry.register("WS01").await;
        let second = registry.register("WS01").await;
        assert_ne!(first, second);
        assert_eq!(registry.agent_id_for_hostname("ws01").await, Some(second));
    }

    #[tokio::test]
    async fn heartbeat_drains_and_clears_pending_queue() {
        let registry = AgentRegistry::new();
        let id = registry.register("ws02").await;
        registry
            .queue_command(
                &id,
                QueuedCommand {
                    command_id: "c1".into(),
                    action: "enable".into(),
                    timeout_seconds: 60,
                    params_json: "{}".into(),
                },
            )
            .await;

        let first = registry.pop_pending_commands(&id).await;
        assert_eq!(first.len(), 1);
        let second = registry.pop_pending_commands(&id).await;
        assert!(second.is_empty(), "heartbeat with no queued commands must return empty, not missing");
    }

    #[tokio::test]
    async fn hostname_index_is_case_insensitive() {
        let registry = AgentRegistry::new();
        let id = registry.register("Laptop-01").await;
        assert_eq!(registry.agent_id_for_hostname("laptop-01").await, Some(id.clone()));
        assert_eq!(registry.agent_id_for_hostname("LAPTOP-01").await, Some(id));
    }
}
