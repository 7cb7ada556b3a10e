//! The `ComplianceAgent` gRPC service implementation (spec §4.5, §6.2).

use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tonic::{Request, Response, Status, Streaming};
use tracing::{info, instrument, warn};

use msp_proto::agent::compliance_agent_server::ComplianceAgent;
use msp_proto::{
    CapabilityTier, DriftAck, DriftEvent, HealCommand, HealingAck, HealingResult,
    HeartbeatRequest, HeartbeatResponse, RegisterRequest, RegisterResponse, RmmAck,
    RmmStatusReport,
};
use msp_types::{DriftFinding, Severity};

use crate::mapping::{immediate_heal_command, to_internal_check_type};
use crate::registry::{AgentRegistry, DetectedRmm, QueuedCommand};

/// Default checks a Go agent is told to watch (spec §4.5 `enabled_checks`).
const DEFAULT_ENABLED_CHECKS: &[&str] = &["firewall", "defender", "bitlocker", "screenlock", "patches"];

/// Everything the service needs to issue certificates on registration.
/// `None` when the CA hasn't been initialized yet — `needs_certificates`
/// requests are then answered with empty cert fields rather than failing
/// the RPC outright (an agent can still register for monitoring).
pub struct CaMaterial {
    pub ca_cert_pem: String,
    pub ca_cert: rcgen::Certificate,
}

#[derive(Clone)]
pub struct AgentService {
    registry: Arc<AgentRegistry>,
    ca: Option<Arc<CaMaterial>>,
    /// Bounded per spec §5 ("drift-to-heal channel is bounded (256)").
    /// Overflow is logged and the route dropped; the appliance's next
    /// scheduled scan will re-produce the same finding.
    drift_tx: mpsc::Sender<DriftFinding>,
}

impl AgentService {
    pub fn new(registry: Arc<AgentRegistry>, ca: Option<Arc<CaMaterial>>, drift_tx: mpsc::Sender<DriftFinding>) -> Self {
        Self { registry, ca, drift_tx }
    }
}

/// Bounded per spec §5 ("drift-to-heal channel is bounded (256)"). Overflow
/// logs a warning and drops the route; the appliance's next scheduled scan
/// will re-produce the same finding.
fn route_to_healing(drift_tx: &mpsc::Sender<DriftFinding>, finding: DriftFinding) {
    match drift_tx.try_send(finding) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(finding)) => {
            warn!(
                hostname = %finding.hostname,
                check_type = %finding.check_type,
                "drift-to-heal channel full, dropping route (post-scan cycle will retry)"
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            warn!("drift-to-heal channel closed, dropping route");
        }
    }
}

fn severity_for(s: &str) -> Severity {
    match s.to_ascii_lowercase().as_str() {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "medium" => Severity::Medium,
        _ => Severity::Low,
    }
}

fn to_drift_finding(event: &DriftEvent) -> DriftFinding {
    DriftFinding {
        hostname: event.hostname.clone(),
        check_type: to_internal_check_type(&event.check_type),
        passed: event.passed,
        expected: (!event.expected.is_empty()).then(|| event.expected.clone()),
        actual: (!event.actual.is_empty()).then(|| event.actual.clone()),
        severity: severity_for(&event.severity),
        hipaa_control: None,
        evidence_data: (!event.evidence_json.is_empty())
            .then(|| serde_json::from_str(&event.evidence_json).ok())
            .flatten(),
    }
}

fn queued_to_wire(cmd: QueuedCommand) -> HealCommand {
    HealCommand {
        command_id: cmd.command_id,
        action: cmd.action,
        timeout_seconds: cmd.timeout_seconds,
        params_json: cmd.params_json,
    }
}

#[tonic::async_trait]
impl ComplianceAgent for AgentService {
    #[instrument(skip(self, request))]
    async fn register(&self, request: Request<RegisterRequest>) -> Result<Response<RegisterResponse>, Status> {
        let req = request.into_inner();
        if req.hostname.is_empty() {
            return Err(Status::invalid_argument("hostname is required"));
        }

        let agent_id = self.registry.register(&req.hostname).await;
        info!(agent_id = %agent_id, hostname = %req.hostname, "agent registered");

        let (ca_cert_pem, agent_cert_pem, agent_key_pem) = match (&self.ca, req.needs_certificates) {
            (Some(ca), true) => {
                let issued = msp_infra::ca::issue_agent_cert(&ca.ca_cert, &req.hostname)
                    .map_err(|e| Status::internal(format!("certificate issuance failed: {e}")))?;
                (ca.ca_cert_pem.clone(), issued.cert_pem, issued.key_pem)
            }
            _ => (String::new(), String::new(), String::new()),
        };

        Ok(Response::new(RegisterResponse {
            agent_id,
            check_interval_seconds: 300,
            enabled_checks: DEFAULT_ENABLED_CHECKS.iter().map(|s| s.to_string()).collect(),
            capability_tier: CapabilityTier::MonitorOnly as i32,
            ca_cert_pem,
            agent_cert_pem,
            agent_key_pem,
        }))
    }

    type ReportDriftStream = Pin<Box<dyn Stream<Item = Result<DriftAck, Status>> + Send + 'static>>;

    #[instrument(skip(self, request))]
    async fn report_drift(&self, request: Request<Streaming<DriftEvent>>) -> Result<Response<Self::ReportDriftStream>, Status> {
        let registry = self.registry.clone();
        let drift_tx = self.drift_tx.clone();
        let mut inbound = request.into_inner();

        let outbound = async_stream::try_stream! {
            while let Some(event) = inbound.next().await {
                let event = event?;
                let finding = to_drift_finding(&event);

                if let Some(agent_id) = registry.agent_id_for_hostname(&event.hostname).await {
                    registry.record_drift(&agent_id, Utc::now()).await;
                }

                let heal_command = if !event.passed {
                    let cmd = immediate_heal_command(&event.check_type);
                    route_to_healing(&drift_tx, finding);
                    cmd.map(queued_to_wire)
                } else {
                    None
                };

                yield DriftAck { received: true, heal_command };
            }
        };

        Ok(Response::new(Box::pin(outbound)))
    }

    #[instrument(skip(self, request))]
    async fn report_healing(&self, request: Request<HealingResult>) -> Result<Response<HealingAck>, Status> {
        let req = request.into_inner();
        // Artifacts (e.g. BitLocker recovery keys) are never logged
        // verbatim (spec §4.5); only metadata about the report is traced.
        info!(
            hostname = %req.hostname,
            check_type = %req.check_type,
            success = req.success,
            has_artifact = !req.artifact_json.is_empty(),
            "healing result received"
        );
        Ok(Response::new(HealingAck { received: true }))
    }

    #[instrument(skip(self, request))]
    async fn heartbeat(&self, request: Request<HeartbeatRequest>) -> Result<Response<HeartbeatResponse>, Status> {
        let req = request.into_inner();
        self.registry.record_heartbeat(&req.agent_id, Utc::now()).await;
        let pending = self.registry.pop_pending_commands(&req.agent_id).await;

        Ok(Response::new(HeartbeatResponse {
            pending_commands: pending.into_iter().map(queued_to_wire).collect(),
            check_interval_seconds: 300,
        }))
    }

    #[instrument(skip(self, request))]
    async fn report_rmm_status(&self, request: Request<RmmStatusReport>) -> Result<Response<RmmAck>, Status> {
        let req = request.into_inner();
        let detected = req
            .detected
            .into_iter()
            .map(|a| DetectedRmm {
                name: a.name,
                version: a.version,
                vendor: a.vendor,
            })
            .collect();
        self.registry.record_rmm_status(&req.agent_id, detected).await;
        Ok(Response::new(RmmAck { received: true }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_without_ca_returns_empty_certs() {
        let registry = Arc::new(AgentRegistry::new());
        let (tx, _rx) = mpsc::channel(256);
        let service = AgentService::new(registry, None, tx);

        let resp = service
            .register(Request::new(RegisterRequest {
                hostname: "WS01".into(),
                needs_certificates: true,
                agent_version: "1.0.0".into(),
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(resp.agent_id.starts_with("go-WS01-"));
        assert!(resp.ca_cert_pem.is_empty());
        assert_eq!(resp.capability_tier, CapabilityTier::MonitorOnly as i32);
    }

    #[tokio::test]
    async fn register_with_ca_issues_client_cert() {
        let dir = tempfile::tempdir().unwrap();
        let (issued, ca_cert) = msp_infra::ca::load_or_create_ca(dir.path()).unwrap();
        let ca = Arc::new(CaMaterial {
            ca_cert_pem: issued.cert_pem,
            ca_cert,
        });

        let registry = Arc::new(AgentRegistry::new());
        let (tx, _rx) = mpsc::channel(256);
        let service = AgentService::new(registry, Some(ca), tx);

        let resp = service
            .register(Request::new(RegisterRequest {
                hostname: "WS01".into(),
                needs_certificates: true,
                agent_version: "1.0.0".into(),
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(resp.agent_cert_pem.contains("BEGIN CERTIFICATE"));
        assert!(resp.agent_key_pem.contains("BEGIN"));
        assert!(resp.ca_cert_pem.contains("BEGIN CERTIFICATE"));
    }

    #[tokio::test]
    async fn heartbeat_returns_empty_list_not_null_when_nothing_queued() {
        let registry = Arc::new(AgentRegistry::new());
        let agent_id = registry.register("ws02").await;
        let (tx, _rx) = mpsc::channel(256);
        let service = AgentService::new(registry, None, tx);

        let resp = service
            .heartbeat(Request::new(HeartbeatRequest { agent_id, uptime_seconds: 10 }))
            .await
            .unwrap()
            .into_inner();

        assert!(resp.pending_commands.is_empty());
    }
}
