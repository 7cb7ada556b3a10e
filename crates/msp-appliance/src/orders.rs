//! `McpOrder` dispatch (spec §3, §4.6, invariant I8). The control plane
//! only ever hands the appliance orders that already passed signature,
//! expiry, and nonce checks (`McpOrder`'s doc comment: "msp-controlplane
//! owns the nonce ledger") — this module re-checks expiry defensively and
//! turns an order into one of a small number of effects the main loop
//! applies.
//!
//! Orders that touch the host OS or the appliance's own image
//! (`restart_agent`, `nixos_rebuild`, `update_agent`, `update_iso`,
//! `deploy_sensor`/`remove_sensor`, their Linux counterparts,
//! `sensor_status`, `view_logs`, `diagnostic`, `update_credentials`) are
//! outside this core's scope (the bootable-image packaging and the
//! Windows PowerShell sensor legacy path are explicit non-goals) and are
//! routed through `SystemActions`, whose default implementation only logs
//! — a production deployment wires a real handler behind the same trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use msp_types::{McpOrder, OrderType};

/// What the main loop should do as a direct result of processing one
/// order, as opposed to the system-level side effects in `SystemActions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEffect {
    /// Run the checkin loop again immediately instead of waiting out the
    /// jittered interval.
    ImmediateCheckin,
    /// Run a scan cycle immediately.
    ImmediateScan,
    /// Reload the synced L1 rule set from disk (the order's `parameters`
    /// already wrote the file via `write_synced`, a separate call the
    /// caller makes before dispatching this order).
    ReloadRules,
    /// Dispatched to `SystemActions`; no main-loop state changes.
    Delegated,
}

#[async_trait]
pub trait SystemActions: Send + Sync {
    async fn restart_agent(&self) {
        info!("restart_agent order received (logged only, no system action wired)");
    }
    async fn nixos_rebuild(&self, params: &serde_json::Value) {
        info!(?params, "nixos_rebuild order received (logged only)");
    }
    async fn update_agent(&self, params: &serde_json::Value) {
        info!(?params, "update_agent order received (logged only)");
    }
    async fn update_iso(&self, params: &serde_json::Value) {
        info!(?params, "update_iso order received (logged only)");
    }
    async fn view_logs(&self, params: &serde_json::Value) {
        info!(?params, "view_logs order received (logged only)");
    }
    async fn diagnostic(&self, params: &serde_json::Value) {
        info!(?params, "diagnostic order received (logged only)");
    }
    async fn deploy_sensor(&self, params: &serde_json::Value) {
        info!(?params, "deploy_sensor order received (logged only)");
    }
    async fn remove_sensor(&self, params: &serde_json::Value) {
        info!(?params, "remove_sensor order received (logged only)");
    }
    async fn deploy_linux_sensor(&self, params: &serde_json::Value) {
        info!(?params, "deploy_linux_sensor order received (logged only)");
    }
    async fn remove_linux_sensor(&self, params: &serde_json::Value) {
        info!(?params, "remove_linux_sensor order received (logged only)");
    }
    async fn sensor_status(&self, params: &serde_json::Value) {
        info!(?params, "sensor_status order received (logged only)");
    }
    async fn update_credentials(&self, params: &serde_json::Value) {
        info!(?params, "update_credentials order received (logged only)");
    }
}

pub struct LoggingSystemActions;
impl SystemActions for LoggingSystemActions {}

/// Applies one order. Returns `None` if the order was expired (which
/// should not happen given the control plane's own filtering, but the
/// appliance never trusts a server response blindly).
pub async fn dispatch(order: &McpOrder, now: DateTime<Utc>, system: &dyn SystemActions) -> Option<OrderEffect> {
    if order.is_expired(now) {
        warn!(order_id = %order.order_id, "received expired order, ignoring");
        return None;
    }

    let effect = match order.order_type {
        OrderType::ForceCheckin => OrderEffect::ImmediateCheckin,
        OrderType::RunDrift => OrderEffect::ImmediateScan,
        OrderType::SyncRules => OrderEffect::ReloadRules,
        OrderType::RestartAgent => {
            system.restart_agent().await;
            OrderEffect::Delegated
        }
        OrderType::NixosRebuild => {
            system.nixos_rebuild(&order.parameters).await;
            OrderEffect::Delegated
        }
        OrderType::UpdateAgent => {
            system.update_agent(&order.parameters).await;
            OrderEffect::Delegated
        }
        OrderType::UpdateIso => {
            system.update_iso(&order.parameters).await;
            OrderEffect::Delegated
        }
        OrderType::ViewLogs => {
            system.view_logs(&order.parameters).await;
            OrderEffect::Delegated
        }
        OrderType::Diagnostic => {
            system.diagnostic(&order.parameters).await;
            OrderEffect::Delegated
        }
        OrderType::DeploySensor => {
            system.deploy_sensor(&order.parameters).await;
            OrderEffect::Delegated
        }
        OrderType::RemoveSensor => {
            system.remove_sensor(&order.parameters).await;
            OrderEffect::Delegated
        }
        OrderType::DeployLinuxSensor => {
            system.deploy_linux_sensor(&order.parameters).await;
            OrderEffect::Delegated
        }
        OrderType::RemoveLinuxSensor => {
            system.remove_linux_sensor(&order.parameters).await;
            OrderEffect::Delegated
        }
        OrderType::SensorStatus => {
            system.sensor_status(&order.parameters).await;
            OrderEffect::Delegated
        }
        OrderType::UpdateCredentials => {
            system.update_credentials(&order.parameters).await;
            OrderEffect::Delegated
        }
    };

    info!(order_id = %order.order_id, order_type = ?order.order_type, "order dispatched");
    Some(effect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn order(order_type: OrderType, expires_in_mins: i64) -> McpOrder {
        let now = Utc::now();
        McpOrder {
            order_id: "o1".into(),
            order_type,
            parameters: json!({}),
            priority: 1,
            created_at: now,
            expires_at: now + Duration::minutes(expires_in_mins),
            nonce: "n1".into(),
            signature: "sig".into(),
        }
    }

    #[tokio::test]
    async fn expired_order_is_ignored() {
        let o = order(OrderType::ForceCheckin, -1);
        let effect = dispatch(&o, Utc::now(), &LoggingSystemActions).await;
        assert!(effect.is_none());
    }

    #[tokio::test]
    async fn run_drift_maps_to_immediate_scan() {
        let o = order(OrderType::RunDrift, 5);
        let effect = dispatch(&o, Utc::now(), &LoggingSystemActions).await;
        assert_eq!(effect, Some(OrderEffect::ImmediateScan));
    }

    #[tokio::test]
    async fn restart_agent_is_delegated() {
        let o = order(OrderType::RestartAgent, 5);
        let effect = dispatch(&o, Utc::now(), &LoggingSystemActions).await;
        assert_eq!(effect, Some(OrderEffect::Delegated));
    }
}
