//! The healing engine proper: `HealingEngine::handle` implements the
//! three-tier classifier of spec §4.3 as a single `match`-driven pipeline
//! rather than a class hierarchy, per spec §9's `Remediator` capability
//! trait guidance.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use msp_core::MaintenanceWindow;
use msp_executors::{ExecuteRequest, Executors};
use msp_types::{ActionTaken, Incident, Outcome, Runbook, Severity, Target};

use crate::circuit_registry::CircuitRegistry;
use crate::flap_store::FlapStore;
use crate::l2_client::L2Client;
use crate::l3::{Escalation, EscalationChannel, EscalationSink};
use crate::learning::PatternTelemetry;
use crate::runbooks::RunbookCatalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealingOutcome {
    /// L1 matched and the runbook's post-conditions verified.
    Success,
    /// A runbook step ran but failed, with no rollback possible.
    Failed,
    /// A disruptive runbook's post-verification failed; rollback ran.
    Reverted,
    /// Circuit open, maintenance window closed, or flap-suppressed.
    Deferred,
    /// Routed to a human via L3.
    Alert,
}

impl From<HealingOutcome> for Outcome {
    fn from(o: HealingOutcome) -> Self {
        match o {
            HealingOutcome::Success => Outcome::Success,
            HealingOutcome::Failed => Outcome::Failed,
            HealingOutcome::Reverted => Outcome::Reverted,
            HealingOutcome::Deferred => Outcome::Deferred,
            HealingOutcome::Alert => Outcome::Alert,
        }
    }
}

pub struct HealingEngine {
    rules: Vec<msp_types::L1Rule>,
    catalog: RunbookCatalog,
    l2: Option<Arc<L2Client>>,
    circuits: CircuitRegistry,
    flaps: FlapStore,
    escalation: Arc<dyn EscalationSink>,
    maintenance: MaintenanceWindow,
    executors: Arc<Executors>,
    /// Feeds step 0 of the L2-to-L1 learning pipeline (spec §4.3). `None`
    /// when no pipeline is wired up, e.g. in unit tests.
    telemetry: Option<mpsc::Sender<PatternTelemetry>>,
}

impl HealingEngine {
    pub fn new(
        rules: Vec<msp_types::L1Rule>,
        catalog: RunbookCatalog,
        l2: Option<Arc<L2Client>>,
        flaps: FlapStore,
        escalation: Arc<dyn EscalationSink>,
        maintenance: MaintenanceWindow,
        executors: Arc<Executors>,
    ) -> Self {
        Self {
            rules,
            catalog,
            l2,
            circuits: CircuitRegistry::new(),
            flaps,
            escalation,
            maintenance,
            executors,
            telemetry: None,
        }
    }

    /// Wires this engine's L2 auto-executions into a learning pipeline
    /// started with [`crate::spawn_pipeline`].
    pub fn with_telemetry(mut self, telemetry: mpsc::Sender<PatternTelemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn set_rules(&mut self, rules: Vec<msp_types::L1Rule>) {
        self.rules = rules;
    }

    fn rule_context(incident: &Incident) -> serde_json::Value {
        json!({
            "check_type": incident.incident_type,
            "severity": incident.severity,
            "passed": "false",
            "host_id": incident.host_id,
        })
    }

    /// Must be called once per observed pass/fail toggle, separate from
    /// `handle` (which only runs for `fail` findings). Returns `true` if
    /// the caller should proceed to `handle`; `false` if flap-suppressed.
    pub async fn admit_transition(&mut self, host: &str, check_type: &str, now: DateTime<Utc>) -> bool {
        use msp_core::FlapOutcome;
        match self.flaps.record_transition(host, check_type, now) {
            Ok(FlapOutcome::Normal) => true,
            Ok(FlapOutcome::Suppressed) => false,
            Ok(FlapOutcome::EscalateThenSuppress) => {
                let incident = Incident {
                    id: uuid::Uuid::new_v4(),
                    site_id: String::new(),
                    host_id: host.to_string(),
                    incident_type: check_type.to_string(),
                    severity: Severity::High,
                    raw_data: serde_json::Value::Null,
                    pattern_signature: format!("{check_type}|flap"),
                    created_at: now,
                    actions: Vec::new(),
                    outcome: Some(Outcome::Deferred),
                };
                let escalation = Escalation {
                    incident_id: incident.id,
                    reason: format!("{check_type} on {host} flapped \u{2265}4 times in 30 min, suppressed for the rest of the day"),
                    channel: EscalationChannel::Slack,
                };
                self.escalation.escalate(&escalation, &incident).await;
                false
            }
            Err(e) => {
                warn!(error = %e, "flap store error, admitting transition");
                true
            }
        }
    }

    #[instrument(skip(self, incident, target), fields(incident_id = %incident.id, check_type = %incident.incident_type))]
    pub async fn handle(&mut self, incident: &mut Incident, target: &Target, now: DateTime<Utc>) -> HealingOutcome {
        let host = target.hostname().to_string();

        if self.circuits.is_open(&host, &incident.incident_type, now) {
            info!("circuit open, deferring");
            return self.finish(incident, HealingOutcome::Deferred, "circuit breaker open");
        }

        let context = Self::rule_context(incident);
        let matched = msp_core::find_match(&self.rules, &context).ok().flatten().cloned();

        if let Some(rule) = matched {
            return self.run_l1(incident, target, &rule.runbook_id, now).await;
        }

        match &self.l2 {
            Some(l2) => self.run_l2(incident, target, l2.clone(), now).await,
            None => self.run_l3(incident, "no L2 planner configured").await,
        }
    }

    async fn run_l1(&mut self, incident: &mut Incident, target: &Target, runbook_id: &str, now: DateTime<Utc>) -> HealingOutcome {
        let runbook = match self.catalog.get(runbook_id) {
            Some(r) => r.clone(),
            None => return self.run_l3(incident, &format!("unknown runbook {runbook_id}")).await,
        };
        self.execute_runbook(incident, target, &runbook, now).await
    }

    async fn run_l2(&mut self, incident: &mut Incident, target: &Target, l2: Arc<L2Client>, now: DateTime<Utc>) -> HealingOutcome {
        let decision = match l2.plan(incident).await {
            Ok(d) => d,
            Err(e) => return self.run_l3(incident, &format!("L2 transport error: {e}")).await,
        };

        if decision.escalate_to_l3 || decision.requires_approval || !decision.is_auto_executable() {
            return self
                .run_l3(incident, &format!("L2 declined auto-execution: {}", decision.reasoning))
                .await;
        }

        let runbook_id = match &decision.runbook_id {
            Some(id) => id.clone(),
            None => return self.run_l3(incident, "L2 decision carried no runbook_id").await,
        };
        let runbook = match self.catalog.get(&runbook_id) {
            Some(r) => r.clone(),
            None => return self.run_l3(incident, &format!("unknown runbook {runbook_id}")).await,
        };
        let outcome = self.execute_runbook(incident, target, &runbook, now).await;
        self.publish_pattern_telemetry(incident, &runbook_id, outcome == HealingOutcome::Success);
        outcome
    }

    /// Step 0 input for the learning pipeline (spec §4.3): one record per
    /// L2 auto-execution, fed to whatever `spawn_pipeline` task is
    /// listening on the other end of `self.telemetry`.
    fn publish_pattern_telemetry(&self, incident: &Incident, runbook_id: &str, success: bool) {
        let Some(tx) = &self.telemetry else { return };
        let telemetry = PatternTelemetry {
            pattern_signature: incident.pattern_signature.clone(),
            recommended_action: runbook_id.to_string(),
            runbook_id: Some(runbook_id.to_string()),
            success,
        };
        if let Err(e) = tx.try_send(telemetry) {
            warn!(error = %e, "pattern telemetry channel full or closed, dropping");
        }
    }

    async fn run_l3(&mut self, incident: &mut Incident, reason: &str) -> HealingOutcome {
        let escalation = Escalation {
            incident_id: incident.id,
            reason: reason.to_string(),
            channel: EscalationChannel::Slack,
        };
        self.escalation.escalate(&escalation, incident).await;
        self.finish(incident, HealingOutcome::Alert, reason)
    }

    async fn execute_runbook(&mut self, incident: &mut Incident, target: &Target, runbook: &Runbook, now: DateTime<Utc>) -> HealingOutcome {
        for (idx, step) in runbook.steps.iter().enumerate() {
            if step.disruptive && !self.maintenance.contains(now.time()) {
                let reason = format!(
                    "step {} is disruptive and outside the maintenance window ({now})",
                    step.name
                );
                info!(%reason, "deferring disruptive step");
                return self.finish(incident, HealingOutcome::Deferred, &reason);
            }

            let action = ActionTaken {
                runbook_id: runbook.runbook_id.clone(),
                step_index: idx,
                started_at: now,
                finished_at: None,
                success: None,
                pre_state: step.disruptive.then(|| json!({"snapshot_of": target.hostname()})),
                notes: None,
            };
            incident.actions.push(action);

            let result = self
                .executors
                .execute(ExecuteRequest {
                    target: target.clone(),
                    script: step.script.clone(),
                    runbook_id: runbook.runbook_id.clone(),
                    phase: "remediate".to_string(),
                    timeout: std::time::Duration::from_secs(step.timeout_s),
                    retries: 1,
                    retry_delay: std::time::Duration::from_secs(2),
                    use_sudo: true,
                    hipaa_controls: vec![],
                })
                .await;

            let action = incident.actions.last_mut().expect("just pushed");
            action.finished_at = Some(Utc::now());
            action.success = Some(result.success);

            if !result.success {
                self.circuits.record_failure(target.hostname(), &incident.incident_type, now);
                if step.disruptive {
                    if let Some(rollback_script) = &step.rollback_script {
                        self.run_rollback(target, runbook, rollback_script).await;
                        return self.finish(incident, HealingOutcome::Reverted, "post-verification failed, rolled back");
                    }
                }
                return self.finish(incident, HealingOutcome::Failed, result.error.as_deref().unwrap_or("step failed"));
            }
        }

        self.finish(incident, HealingOutcome::Success, "runbook completed")
    }

    async fn run_rollback(&self, target: &Target, runbook: &Runbook, rollback_script: &str) {
        let _ = self
            .executors
            .execute(ExecuteRequest {
                target: target.clone(),
                script: rollback_script.to_string(),
                runbook_id: runbook.runbook_id.clone(),
                phase: "rollback".to_string(),
                timeout: std::time::Duration::from_secs(60),
                retries: 1,
                retry_delay: std::time::Duration::from_secs(2),
                use_sudo: true,
                hipaa_controls: vec![],
            })
            .await;
    }

    fn finish(&self, incident: &mut Incident, outcome: HealingOutcome, note: &str) -> HealingOutcome {
        incident.outcome = Some(outcome.into());
        if let Some(last) = incident.actions.last_mut() {
            last.notes.get_or_insert_with(|| note.to_string());
        }
        outcome
    }
}
