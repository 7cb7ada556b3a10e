use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A site: stable identifier, owns exactly one logical appliance across
/// hardware replacements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub site_id: String,
    pub slug: String,
    pub archived: bool,
}

/// Canonical id is `"{site_id}-{MAC}"`. A site may accumulate several rows
/// over hardware replacements; the checkin fan-in keeps the most-recently
/// seen as authoritative and merges the rest (see msp-controlplane).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appliance {
    pub id: String,
    pub site_id: String,
    pub mac: String,
    pub hostname: Option<String>,
    pub ip_addresses: Vec<String>,
    pub agent_version: Option<String>,
    pub agent_public_key: Option<String>,
    pub last_checkin: DateTime<Utc>,
}
