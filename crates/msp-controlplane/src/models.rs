//! Wire DTOs for the ten endpoints in spec §6.1. These mirror
//! `msp-appliance`'s `CheckinRequest`/`CheckinResponse` field-for-field
//! (two independent binaries agreeing on a wire shape, not a shared crate
//! dependency — the evidence bundle and the order/target types are the
//! only pieces actually shared, via `msp-types`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use msp_types::{LinuxTarget, McpOrder, WindowsTarget};

#[derive(Debug, Clone, Deserialize)]
pub struct CheckinRequest {
    pub site_id: String,
    pub hostname: String,
    pub mac_address: String,
    #[serde(default)]
    pub ip_addresses: Vec<String>,
    pub uptime_seconds: Option<u64>,
    pub agent_version: Option<String>,
    pub nixos_version: Option<String>,
    #[serde(default)]
    pub has_local_credentials: bool,
    pub agent_public_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
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

#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionClaimRequest {
    pub code: String,
    pub mac_address: String,
    pub hostname: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisionClaimResponse {
    pub site_id: String,
    pub appliance_id: String,
    pub bearer_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainDiscoveredRequest {
    pub site_id: String,
    pub domain_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainDiscoveredResponse {
    pub acknowledged: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumeratedHostRequest {
    pub hostname: String,
    pub platform: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumerationResultsRequest {
    pub site_id: String,
    #[serde(default)]
    pub hosts: Vec<EnumeratedHostRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnumerationResultsResponse {
    pub recorded: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainCredentialRequest {
    /// Specific host this credential applies to, or `None` to fan out to
    /// every host of the matching platform already known from
    /// `/api/appliances/enumeration-results`.
    pub hostname: Option<String>,
    pub credential_type: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub secret: String,
    pub distro: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainCredentialSummary {
    pub hostname: String,
    pub credential_type: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub distro: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainCredentialsResponse {
    pub credentials: Vec<DomainCredentialSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyResponse {
    pub ok: bool,
    pub checked: usize,
    pub error: Option<String>,
    pub failed_at_position: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BundleSummary {
    pub bundle_id: String,
    pub checked_at: DateTime<Utc>,
    pub chain_position: i64,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicKeyResponse {
    pub public_key: String,
}
