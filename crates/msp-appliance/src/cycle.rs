//! One scan → heal → evidence cycle (spec §2 data-flow diagram). The main
//! loop calls `run_cycle` once per tick; `main.rs` wraps the call in
//! `catch_unwind` so a panic inside any one cycle doesn't take the process
//! down (spec §7: "the appliance loop tolerates any single-iteration
//! panic").

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ed25519_dalek::SigningKey;
use tracing::{info, warn};

use msp_core::pattern_signature;
use msp_evidence::{build_bundle, free_space_ratio, sign_payload, stage_bundle, submit_bundle, DiskPressure, EvidenceQueue, SubmitOutcome};
use msp_executors::Executors;
use msp_healing::HealingEngine;
use msp_scanner::Scanner;
use msp_types::{DriftFinding, Incident, Summary, Target};

use crate::coverage::full_cycle_coverage;
use crate::error::ApplianceError;

pub struct CycleContext {
    pub site_id: String,
    pub evidence_dir: std::path::PathBuf,
    pub control_plane_url: String,
    pub bearer_token: Option<String>,
    pub http_client: reqwest::Client,
}

/// Tracks whether pass/fail toggled for a `(host, check_type)` bucket
/// relative to the previous cycle, the trigger the flap store needs to
/// decide whether this is a "transition" at all (spec §4.3: "must be
/// invoked once per observed transition").
#[derive(Default)]
pub struct LastCycleState {
    failing: HashSet<(String, String)>,
}

impl LastCycleState {
    pub fn new() -> Self {
        Self::default()
    }

    fn toggled(&self, host: &str, check_type: &str, now_failing: bool) -> bool {
        let was_failing = self.failing.contains(&(host.to_string(), check_type.to_string()));
        was_failing != now_failing
    }

    fn update(&mut self, findings: &[DriftFinding]) {
        self.failing = findings.iter().map(|f| (f.hostname.clone(), f.check_type.clone())).collect();
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn run_cycle(
    ctx: &CycleContext,
    scanner: &Scanner,
    executors: Arc<Executors>,
    targets: &[Target],
    enabled: Option<&HashSet<String>>,
    engine: &mut HealingEngine,
    last_state: &mut LastCycleState,
    signing_key: &SigningKey,
    queue: &EvidenceQueue,
    now: DateTime<Utc>,
) -> Result<(), ApplianceError> {
    let findings = scanner.scan(executors, targets, enabled).await;
    info!(drift_count = findings.len(), target_count = targets.len(), "scan cycle complete");

    for finding in &findings {
        if !finding.passed {
            let transitioned = last_state.toggled(&finding.hostname, &finding.check_type, true);
            if !transitioned {
                continue;
            }
            if !engine.admit_transition(&finding.hostname, &finding.check_type, now).await {
                info!(host = %finding.hostname, check_type = %finding.check_type, "flap-suppressed, skipping remediation");
                continue;
            }

            let target = match targets.iter().find(|t| t.hostname() == finding.hostname) {
                Some(t) => t,
                None => continue,
            };

            let mut incident = Incident {
                id: uuid::Uuid::new_v4(),
                site_id: ctx.site_id.clone(),
                host_id: finding.hostname.clone(),
                incident_type: finding.check_type.clone(),
                severity: finding.severity,
                raw_data: finding.evidence_data.clone().unwrap_or(serde_json::Value::Null),
                pattern_signature: pattern_signature(finding),
                created_at: now,
                actions: Vec::new(),
                outcome: None,
            };

            let outcome = engine.handle(&mut incident, target, now).await;
            info!(
                incident_id = %incident.id,
                host = %finding.hostname,
                check_type = %finding.check_type,
                outcome = ?outcome,
                "healing attempt finished"
            );
        }
    }
    last_state.update(&findings);

    let (mut checks, summary) = full_cycle_coverage(targets, &findings, enabled);
    let ratio = free_space_ratio(&ctx.evidence_dir);
    if msp_evidence::classify(ratio) == DiskPressure::SummaryOnly {
        warn!(free_ratio = ratio, "disk pressure detected, staging summary-only bundle");
        checks.clear();
    }

    submit_or_queue(ctx, checks, summary, signing_key, queue, now).await?;
    drain_queue(ctx, queue, now).await?;
    Ok(())
}

async fn submit_or_queue(
    ctx: &CycleContext,
    checks: Vec<msp_types::CheckEntry>,
    summary: Summary,
    signing_key: &SigningKey,
    queue: &EvidenceQueue,
    now: DateTime<Utc>,
) -> Result<(), ApplianceError> {
    let payload = build_bundle(&ctx.site_id, now, checks, summary);
    let signed = sign_payload(payload, signing_key)?;
    let staged = stage_bundle(&ctx.evidence_dir, &signed, now)?;

    let bundle_path = staged.bundle_path.to_string_lossy().to_string();
    let signature_path = staged.signature_path.to_string_lossy().to_string();

    match submit_bundle(&ctx.http_client, &ctx.control_plane_url, &ctx.site_id, ctx.bearer_token.as_deref(), &signed).await {
        Ok(SubmitOutcome::Accepted) => {
            info!(bundle_id = %staged.bundle_id, "evidence bundle accepted");
        }
        Ok(SubmitOutcome::Rejected { status, body }) => {
            warn!(bundle_id = %staged.bundle_id, status, body, "evidence submit rejected, enqueuing");
            queue.enqueue(&staged.bundle_id, &bundle_path, &signature_path, now)?;
        }
        Err(e) => {
            warn!(bundle_id = %staged.bundle_id, error = %e, "evidence submit failed, enqueuing");
            queue.enqueue(&staged.bundle_id, &bundle_path, &signature_path, now)?;
        }
    }
    Ok(())
}

async fn drain_queue(ctx: &CycleContext, queue: &EvidenceQueue, now: DateTime<Utc>) -> Result<(), ApplianceError> {
    for row in queue.due_for_retry(now)? {
        let bundle_json = match std::fs::read_to_string(&row.bundle_path) {
            Ok(s) => s,
            Err(e) => {
                queue.mark_failed(&row.bundle_id, &e.to_string(), now)?;
                continue;
            }
        };
        let bundle: msp_types::SignedBundle = match serde_json::from_str(&bundle_json) {
            Ok(b) => b,
            Err(e) => {
                queue.mark_failed(&row.bundle_id, &e.to_string(), now)?;
                continue;
            }
        };

        match submit_bundle(&ctx.http_client, &ctx.control_plane_url, &ctx.site_id, ctx.bearer_token.as_deref(), &bundle).await {
            Ok(SubmitOutcome::Accepted) => {
                queue.mark_uploaded(&row.bundle_id, now)?;
                info!(bundle_id = %row.bundle_id, "queued evidence bundle drained");
            }
            Ok(SubmitOutcome::Rejected { status, body }) => {
                queue.mark_failed(&row.bundle_id, &format!("status {status}: {body}"), now)?;
            }
            Err(e) => {
                queue.mark_failed(&row.bundle_id, &e.to_string(), now)?;
            }
        }
    }
    Ok(())
}
