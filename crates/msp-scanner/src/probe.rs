//! `ProbeFn` function-value table keyed by `check_type` (spec §9), the
//! sum-type/function-table alternative to a probe class hierarchy.

use std::collections::HashMap;

use msp_executors::ExecutionResult;
use msp_types::{DriftFinding, Severity};

use crate::catalog::CheckDef;

/// A probe's contract: given the executor's result for one `(host,
/// check_type)` pair, decide whether drift exists. `None` means the host
/// passed the check and no finding is emitted (spec §4.2's evidence
/// rule); `Some` is an immutable drift finding.
pub type ProbeFn = fn(&CheckDef, &str, &ExecutionResult) -> Option<DriftFinding>;

/// Every probe script in the catalog is expected to print either `PASS`
/// or `FAIL:<actual>` as the first line of stdout; execution failures
/// (non-zero exit, connection error, timeout) are themselves drift.
fn default_probe(check: &CheckDef, hostname: &str, result: &ExecutionResult) -> Option<DriftFinding> {
    if !result.success {
        return Some(DriftFinding {
            hostname: hostname.to_string(),
            check_type: check.check_type.to_string(),
            passed: false,
            expected: Some("PASS".to_string()),
            actual: result.error.clone().or(Some("execution failed".to_string())),
            severity: default_severity(check.check_type),
            hipaa_control: Some(check.hipaa_control.to_string()),
            evidence_data: result.output.parsed.clone(),
        });
    }

    let first_line = result.output.stdout.lines().next().unwrap_or("").trim();
    if first_line == "PASS" {
        return None;
    }

    let actual = first_line
        .strip_prefix("FAIL:")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| first_line.to_string());

    Some(DriftFinding {
        hostname: hostname.to_string(),
        check_type: check.check_type.to_string(),
        passed: false,
        expected: Some("PASS".to_string()),
        actual: Some(actual),
        severity: default_severity(check.check_type),
        hipaa_control: Some(check.hipaa_control.to_string()),
        evidence_data: result.output.parsed.clone(),
    })
}

/// Checks whose drift represents an immediate, high-impact exposure get
/// `critical`/`high`; the rest default to `medium`/`low` by how directly
/// they map to an audit-trail gap versus an active control failure.
fn default_severity(check_type: &str) -> Severity {
    match check_type {
        "bitlocker_status" | "smb1_protocol" | "guest_account" | "linux_suid_binaries" => Severity::Critical,
        "firewall_status" | "windows_defender" | "linux_firewall" | "rogue_admin_users"
        | "linux_user_accounts" | "rdp_nla" | "net_unexpected_ports" => Severity::High,
        "windows_update" | "smb_signing" | "screen_lock_policy" | "password_policy"
        | "linux_ssh_config" | "linux_unattended_upgrades" | "linux_open_ports"
        | "linux_file_permissions" => Severity::Medium,
        _ => Severity::Low,
    }
}

pub struct ProbeTable {
    probes: HashMap<&'static str, ProbeFn>,
}

impl ProbeTable {
    pub fn new() -> Self {
        let mut probes: HashMap<&'static str, ProbeFn> = HashMap::new();
        for check in crate::catalog::all_checks() {
            probes.insert(check.check_type, default_probe as ProbeFn);
        }
        Self { probes }
    }

    pub fn get(&self, check_type: &str) -> Option<ProbeFn> {
        self.probes.get(check_type).copied()
    }
}

impl Default for ProbeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use msp_executors::RemoteOutput;

    fn ok_result(stdout: &str) -> ExecutionResult {
        ExecutionResult {
            success: true,
            runbook_id: String::new(),
            target: "ws01".into(),
            phase: "scan".into(),
            output: RemoteOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: 0,
                success: true,
                parsed: None,
            },
            duration_s: 0.1,
            error: None,
            timestamp: Utc::now(),
            output_hash: "x".repeat(16),
            retry_count: 0,
            hipaa_controls: vec![],
            distro: None,
            exit_code: 0,
        }
    }

    #[test]
    fn pass_emits_no_finding() {
        let check = crate::catalog::find("firewall_status").unwrap();
        let result = ok_result("PASS");
        assert!(default_probe(check, "ws01", &result).is_none());
    }

    #[test]
    fn fail_emits_finding_with_actual() {
        let check = crate::catalog::find("firewall_status").unwrap();
        let result = ok_result("FAIL: disabled");
        let finding = default_probe(check, "ws01", &result).unwrap();
        assert!(!finding.passed);
        assert_eq!(finding.actual.as_deref(), Some("disabled"));
        assert_eq!(finding.hipaa_control.as_deref(), Some("164.312(c)(1)"));
    }

    #[test]
    fn execution_failure_is_drift() {
        let check = crate::catalog::find("firewall_status").unwrap();
        let mut result = ok_result("");
        result.success = false;
        result.error = Some("auth failure".to_string());
        let finding = default_probe(check, "ws01", &result).unwrap();
        assert_eq!(finding.actual.as_deref(), Some("auth failure"));
    }
}
