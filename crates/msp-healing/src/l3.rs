//! L3 human escalation (spec §4.3). The escalation channel fan-out itself
//! (actually dialing Slack/Email/Teams/PagerDuty APIs) is an external
//! integration outside this core's scope; `EscalationSink` is the narrow
//! capability boundary (spec §9) the engine depends on, with a
//! log-only default so the crate is fully testable without network
//! access.

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use msp_types::Incident;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationChannel {
    Slack,
    Email,
    Teams,
    PagerDuty,
}

#[derive(Debug, Clone, Serialize)]
pub struct Escalation {
    pub incident_id: uuid::Uuid,
    pub reason: String,
    pub channel: EscalationChannel,
}

#[async_trait]
pub trait EscalationSink: Send + Sync {
    async fn escalate(&self, escalation: &Escalation, incident: &Incident);
}

/// Logs the escalation at `warn` level. Production deployments wire a
/// real sink (Slack webhook, PagerDuty events API, ...) behind the same
/// trait; none of that transport is part of this core.
pub struct LoggingEscalationSink;

#[async_trait]
impl EscalationSink for LoggingEscalationSink {
    async fn escalate(&self, escalation: &Escalation, incident: &Incident) {
        warn!(
            incident_id = %escalation.incident_id,
            channel = ?escalation.channel,
            reason = %escalation.reason,
            pattern_signature = %incident.pattern_signature,
            "L3 escalation"
        );
    }
}
