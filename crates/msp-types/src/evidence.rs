use serde::{Deserialize, Serialize};

/// One row of the evidence bundle's `checks` array. Field order here is
/// not the wire order — canonicalization (msp-core) re-serializes with the
/// exact key order mandated by spec §6.5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckEntry {
    pub check: String,
    pub hostname: String,
    pub status: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub hipaa_control: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_checks: usize,
    pub compliant: usize,
    pub non_compliant: usize,
    pub scanned_hosts: usize,
}

/// The object whose canonical JSON encoding is the exact signed payload
/// (spec §4.4, §6.5). Key order: `site_id, checked_at, checks, summary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPayload {
    pub site_id: String,
    pub checked_at: chrono::DateTime<chrono::Utc>,
    pub checks: Vec<CheckEntry>,
    pub summary: Summary,
}

/// The bundle as transmitted to the control plane: the canonical payload
/// plus the detached signature and the exact bytes that were signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedBundle {
    pub payload: CanonicalPayload,
    pub agent_signature: String,
    pub agent_public_key: String,
    pub signed_data: String,
}
