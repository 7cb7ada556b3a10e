//! Appliance main loop: orchestrates C1-C5 (spec §2 "Appliance Main
//! Loop"). Owns the checkin schedule, dispatches orders, runs the
//! scan/heal/evidence cycle, and serves the agent gRPC endpoints
//! concurrently.

mod checkin;
mod coverage;
mod cycle;
mod error;
mod orders;
mod targets;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use msp_core::{pattern_signature, MaintenanceWindow};
use msp_evidence::EvidenceQueue;
use msp_executors::Executors;
use msp_healing::{spawn_pipeline, HealingEngine, L2Client, LoggingEscalationSink, LoggingSyncNotifier, RuleStore, RunbookCatalog};
use msp_infra::ApplianceConfig;
use msp_scanner::{Scanner, ScannerConfig};
use msp_types::{DriftFinding, Incident, Target};

use checkin::{checkin, CheckinRequest};
use cycle::{run_cycle, CycleContext, LastCycleState};
use orders::{dispatch, LoggingSystemActions, OrderEffect};
use targets::{hostnames, targets_from_checkin};

fn parse_hms(s: &str) -> chrono::NaiveTime {
    chrono::NaiveTime::parse_from_str(s, "%H:%M").unwrap_or_else(|_| chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap())
}

/// Consumes findings pushed by the agent gRPC stream (spec §4.5's
/// immediate-heal path) and drives them through the same healing engine
/// `run_cycle` uses, rather than waiting for the next scheduled scan tick.
async fn drift_sink(
    mut rx: mpsc::Receiver<DriftFinding>,
    engine: Arc<Mutex<HealingEngine>>,
    targets: Arc<Mutex<Vec<Target>>>,
    site_id: String,
) {
    while let Some(finding) = rx.recv().await {
        if finding.passed {
            continue;
        }

        let target = {
            let targets = targets.lock().await;
            targets.iter().find(|t| t.hostname() == finding.hostname).cloned()
        };
        let Some(target) = target else {
            warn!(hostname = %finding.hostname, "agent-reported drift for unknown target, skipping immediate heal");
            continue;
        };

        let now = Utc::now();
        let mut incident = Incident {
            id: uuid::Uuid::new_v4(),
            site_id: site_id.clone(),
            host_id: finding.hostname.clone(),
            incident_type: finding.check_type.clone(),
            severity: finding.severity,
            raw_data: finding.evidence_data.clone().unwrap_or(serde_json::Value::Null),
            pattern_signature: pattern_signature(&finding),
            created_at: now,
            actions: Vec::new(),
            outcome: None,
        };

        let outcome = engine.lock().await.handle(&mut incident, &target, now).await;
        info!(
            incident_id = %incident.id,
            host = %finding.hostname,
            check_type = %finding.check_type,
            outcome = ?outcome,
            "healing attempt finished for agent-pushed drift"
        );
    }
}

fn whoami_hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown-appliance".to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("MSP_CONFIG").unwrap_or_else(|_| "/var/lib/msp/config.yaml".to_string());
    let config = ApplianceConfig::load(&PathBuf::from(config_path))?;
    msp_infra::logging::init(&config.logging);

    info!(site_id = %config.site_id, "appliance starting");

    let signing_key = msp_infra::keys::load_or_create_signing_key(&config.keys_dir().join("signing.key"))?;
    let public_key_hex = hex::encode(signing_key.verifying_key().to_bytes());
    info!(public_key = %public_key_hex, "evidence signing key ready");

    let evidence_dir = config.evidence_dir();
    std::fs::create_dir_all(&evidence_dir)?;
    let queue = EvidenceQueue::open(msp_infra::sqlite::open_wal(&config.queue_db_path())?)?;

    let mut rule_store = RuleStore::new(config.data_dir.join("rules").join("yaml_rules.yaml"), config.rules_path())?;
    let flap_store = msp_healing::FlapStore::open(msp_infra::sqlite::open_wal(&config.flap_db_path())?)?;

    let l2 = if config.l2_socket_path.exists() {
        Some(Arc::new(L2Client::new(config.l2_socket_path.clone())))
    } else {
        None
    };

    let maintenance = MaintenanceWindow::new(parse_hms(&config.maintenance_window.start), parse_hms(&config.maintenance_window.end));
    let executors = Arc::new(Executors::new());

    let (telemetry_tx, telemetry_rx) = mpsc::channel(256);
    let learning_rule_store = RuleStore::new(config.data_dir.join("rules").join("yaml_rules.yaml"), config.rules_path())?;
    let _learning_pipeline = spawn_pipeline(telemetry_rx, Arc::new(LoggingSyncNotifier), learning_rule_store);

    let engine = Arc::new(Mutex::new(
        HealingEngine::new(
            rule_store.rules().to_vec(),
            RunbookCatalog::builtin(),
            l2,
            flap_store,
            Arc::new(LoggingEscalationSink),
            maintenance,
            executors.clone(),
        )
        .with_telemetry(telemetry_tx),
    ));

    let scanner = Scanner::new(ScannerConfig {
        concurrency: config.scan_concurrency,
        cycle_budget: std::time::Duration::from_secs(config.scan_cycle_budget_s),
        ..ScannerConfig::default()
    });

    let live_targets: Arc<Mutex<Vec<Target>>> = Arc::new(Mutex::new(Vec::new()));

    let (drift_tx, drift_rx) = mpsc::channel::<DriftFinding>(256);
    tokio::spawn(drift_sink(drift_rx, engine.clone(), live_targets.clone(), config.site_id.clone()));

    let registry = Arc::new(msp_agentsvc::AgentRegistry::new());
    let bootstrapped = msp_agentsvc::bootstrap(&config.ca_dir(), "0.0.0.0".parse().unwrap())?;
    let agent_service = msp_agentsvc::AgentService::new(registry, Some(bootstrapped.ca.clone()), drift_tx);

    let grpc_addr: std::net::SocketAddr = format!("0.0.0.0:{}", config.grpc_port).parse()?;
    let bootstrap_addr: std::net::SocketAddr = format!("0.0.0.0:{}", config.grpc_port + 1).parse()?;
    tokio::spawn(async move {
        if let Err(e) = msp_agentsvc::serve(grpc_addr, bootstrap_addr, agent_service, bootstrapped.tls_config).await {
            error!(error = %e, "agent gRPC server exited");
        }
    });

    let http_client = reqwest::Client::new();
    let ctx = CycleContext {
        site_id: config.site_id.clone(),
        evidence_dir: evidence_dir.clone(),
        control_plane_url: config.control_plane_url.clone(),
        bearer_token: config.bearer_token.clone(),
        http_client: http_client.clone(),
    };

    let panic_count = AtomicU64::new(0);
    let mut last_state = LastCycleState::new();
    let mut immediate_scan = false;

    loop {
        let now = Utc::now();
        let request = CheckinRequest {
            site_id: config.site_id.clone(),
            hostname: whoami_hostname(),
            mac_address: "00:00:00:00:00:00".to_string(),
            ip_addresses: vec![],
            uptime_seconds: None,
            agent_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            nixos_version: None,
            has_local_credentials: false,
            agent_public_key: Some(public_key_hex.clone()),
        };

        match checkin(&http_client, &config.control_plane_url, config.bearer_token.as_deref(), &request).await {
            Ok(response) => {
                info!(
                    appliance_id = %response.appliance_id,
                    merged_duplicates = response.merged_duplicates,
                    order_count = response.pending_orders.len(),
                    "checkin complete"
                );

                for order in &response.pending_orders {
                    match dispatch(order, now, &LoggingSystemActions).await {
                        Some(OrderEffect::ReloadRules) => match rule_store.reload() {
                            Ok(()) => engine.lock().await.set_rules(rule_store.rules().to_vec()),
                            Err(e) => warn!(error = %e, "failed to reload synced rules"),
                        },
                        Some(OrderEffect::ImmediateScan) => immediate_scan = true,
                        Some(OrderEffect::ImmediateCheckin) | Some(OrderEffect::Delegated) | None => {}
                    }
                }

                let targets = targets_from_checkin(&response);
                *live_targets.lock().await = targets.clone();
                if !targets.is_empty() {
                    if immediate_scan || response.trigger_immediate_scan {
                        info!("running scan cycle ahead of schedule by order/control-plane request");
                    }
                    immediate_scan = false;
                    let enabled: Option<HashSet<String>> = None;
                    let host_list = hostnames(&targets);

                    let mut engine_guard = engine.lock().await;
                    let cycle = std::panic::AssertUnwindSafe(run_cycle(
                        &ctx,
                        &scanner,
                        executors.clone(),
                        &targets,
                        enabled.as_ref(),
                        &mut engine_guard,
                        &mut last_state,
                        &signing_key,
                        &queue,
                        now,
                    ))
                    .catch_unwind();

                    match cycle.await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            error!(error = %e, kind = ?e.kind(), hosts = ?host_list, "scan/heal/evidence cycle failed");
                        }
                        Err(_) => {
                            let count = panic_count.fetch_add(1, Ordering::SeqCst) + 1;
                            error!(panic_count = count, hosts = ?host_list, "scan/heal/evidence cycle panicked, continuing");
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "checkin failed, will retry next interval");
            }
        }

        tokio::time::sleep(std::time::Duration::from_secs(config.checkin_interval_s)).await;
    }
}
