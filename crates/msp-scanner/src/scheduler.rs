//! Scan scheduling (spec §4.2): concurrency bounded by a semaphore
//! (default 10), the whole cycle bounded by a wall-clock budget (default
//! 600 s). Checks still running when the budget elapses are reported as
//! `passed=false, severity=low, actual="timeout"` rather than silently
//! dropped, so evidence coverage (I2) still accounts for them.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use msp_executors::{ExecuteRequest, Executors};
use msp_types::{DriftFinding, Severity, Target};
use tokio::sync::Semaphore;
use tracing::warn;

use crate::catalog::{self, CheckDef, LINUX_CHECKS, NETWORK_CHECKS, WINDOWS_CHECKS};
use crate::probe::ProbeTable;

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub concurrency: usize,
    pub cycle_budget: Duration,
    pub probe_timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            cycle_budget: Duration::from_secs(600),
            probe_timeout: Duration::from_secs(30),
            retries: 2,
            retry_delay: Duration::from_secs(2),
        }
    }
}

pub struct Scanner {
    config: ScannerConfig,
    probes: ProbeTable,
}

fn checks_for(target: &Target) -> impl Iterator<Item = &'static CheckDef> {
    let platform_checks: &'static [CheckDef] = match target {
        Target::Windows(_) => WINDOWS_CHECKS,
        Target::Linux(_) => LINUX_CHECKS,
    };
    platform_checks.iter().chain(NETWORK_CHECKS.iter())
}

impl Scanner {
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            config,
            probes: ProbeTable::new(),
        }
    }

    /// Runs one scan cycle across `targets`, optionally filtered to
    /// `enabled` check types (`None` = all checks in the catalog for each
    /// target's platform, plus network checks). Returns only the drift
    /// (failing) findings; coverage cross-join happens in `coverage`.
    pub async fn scan(
        &self,
        executors: Arc<Executors>,
        targets: &[Target],
        enabled: Option<&HashSet<String>>,
    ) -> Vec<DriftFinding> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut pending: HashSet<(String, &'static str)> = HashSet::new();
        let mut join_set = tokio::task::JoinSet::new();

        for target in targets {
            for check in checks_for(target) {
                if let Some(enabled) = enabled {
                    if !enabled.contains(check.check_type) {
                        continue;
                    }
                }
                let hostname = target.hostname().to_string();
                pending.insert((hostname.clone(), check.check_type));

                let probe_fn = match self.probes.get(check.check_type) {
                    Some(f) => f,
                    None => continue,
                };
                let sem = semaphore.clone();
                let executors = executors.clone();
                let target = target.clone();
                let timeout = self.config.probe_timeout;
                let retries = self.config.retries;
                let retry_delay = self.config.retry_delay;
                let check = *check;

                join_set.spawn(async move {
                    let _permit = sem.acquire_owned().await.expect("semaphore closed");
                    let req = ExecuteRequest {
                        target,
                        script: check.probe_script.to_string(),
                        runbook_id: format!("SCAN-{}", check.check_type),
                        phase: "scan".to_string(),
                        timeout,
                        retries,
                        retry_delay,
                        use_sudo: false,
                        hipaa_controls: vec![check.hipaa_control.to_string()],
                    };
                    let result = executors.execute(req).await;
                    (hostname, check, result)
                });
            }
        }

        let mut findings = Vec::new();
        let deadline = tokio::time::sleep(self.config.cycle_budget);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = &mut deadline => {
                    join_set.abort_all();
                    for (hostname, check_type) in pending.drain() {
                        findings.push(timeout_finding(&hostname, check_type));
                    }
                    break;
                }
                joined = join_set.join_next() => {
                    match joined {
                        Some(Ok((hostname, check, result))) => {
                            pending.remove(&(hostname.clone(), check.check_type));
                            if let Some(probe_fn) = self.probes.get(check.check_type) {
                                if let Some(finding) = probe_fn(&check, &hostname, &result) {
                                    findings.push(finding);
                                }
                            }
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "scan task panicked");
                        }
                        None => break,
                    }
                }
            }
        }

        findings
    }
}

fn timeout_finding(hostname: &str, check_type: &'static str) -> DriftFinding {
    DriftFinding {
        hostname: hostname.to_string(),
        check_type: check_type.to_string(),
        passed: false,
        expected: Some("PASS".to_string()),
        actual: Some("timeout".to_string()),
        severity: Severity::Low,
        hipaa_control: catalog::find(check_type).map(|c| c.hipaa_control.to_string()),
        evidence_data: None,
    }
}
