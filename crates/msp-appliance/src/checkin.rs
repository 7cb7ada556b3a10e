//! Checkin fan-in client (spec §4.6): the appliance's single synchronous
//! contact point with the control plane, polled on a jittered 60 s
//! interval. This module only shapes the request/response and posts it —
//! order/target handling lives in `orders.rs`/`targets.rs`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use msp_types::{LinuxTarget, McpOrder, WindowsTarget};

#[derive(Debug, Clone, Serialize)]
pub struct CheckinRequest {
    pub site_id: String,
    pub hostname: String,
    pub mac_address: String,
    pub ip_addresses: Vec<String>,
    pub uptime_seconds: Option<u64>,
    pub agent_version: Option<String>,
    pub nixos_version: Option<String>,
    pub has_local_credentials: bool,
    pub agent_public_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckinResponse {
    pub status: String,
    pub appliance_id: String,
    pub server_time: DateTime<Utc>,
    pub merged_duplicates: u32,
    pub pending_orders: Vec<McpOrder>,
    pub windows_targets: Vec<WindowsTarget>,
    pub linux_targets: Vec<LinuxTarget>,
    pub enabled_runbooks: Vec<String>,
    pub trigger_enumeration: bool,
    pub trigger_immediate_scan: bool,
}

pub async fn checkin(
    client: &reqwest::Client,
    control_plane_url: &str,
    bearer_token: Option<&str>,
    request: &CheckinRequest,
) -> Result<CheckinResponse, reqwest::Error> {
    let url = format!("{control_plane_url}/api/appliances/checkin");
    let mut req = client.post(url).json(request);
    if let Some(token) = bearer_token {
        req = req.bearer_auth(token);
    }
    req.send().await?.error_for_status()?.json().await
}
