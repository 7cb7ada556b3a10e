//! Per-platform coverage merge (spec §4.2, invariant I2). The scanner's
//! `full_coverage` cross-joins one host set against one check-type list;
//! Windows and Linux hosts have disjoint catalogs (plus the shared
//! network checks), so the cycle groups targets by platform and merges
//! the resulting grids rather than cross-joining mixed-platform hosts
//! against a single flattened check list (seed scenario 3: two Windows
//! hosts yield `2*19=38` Windows-catalog entries, not a grid diluted by
//! Linux check types that never apply to them).

use std::collections::HashSet;

use msp_scanner::{full_coverage, CheckDef, LINUX_CHECKS, NETWORK_CHECKS, WINDOWS_CHECKS};
use msp_types::{CheckEntry, DriftFinding, Summary, Target};

fn filtered_types(catalog: &'static [CheckDef], enabled: Option<&HashSet<String>>) -> Vec<&'static str> {
    catalog
        .iter()
        .map(|c| c.check_type)
        .chain(NETWORK_CHECKS.iter().map(|c| c.check_type))
        .filter(|ct| enabled.map_or(true, |e| e.contains(*ct)))
        .collect()
}

fn merge(mut entries: Vec<CheckEntry>, mut summary: Summary, extra_entries: Vec<CheckEntry>, extra_summary: Summary) -> (Vec<CheckEntry>, Summary) {
    entries.extend(extra_entries);
    summary.total_checks += extra_summary.total_checks;
    summary.compliant += extra_summary.compliant;
    summary.non_compliant += extra_summary.non_compliant;
    summary.scanned_hosts += extra_summary.scanned_hosts;
    (entries, summary)
}

/// Builds the full coverage grid across all scanned targets, split by
/// platform catalog and merged back into one `(checks, summary)` pair.
pub fn full_cycle_coverage(targets: &[Target], findings: &[DriftFinding], enabled: Option<&HashSet<String>>) -> (Vec<CheckEntry>, Summary) {
    let windows_hosts: Vec<String> = targets
        .iter()
        .filter(|t| matches!(t, Target::Windows(_)))
        .map(|t| t.hostname().to_string())
        .collect();
    let linux_hosts: Vec<String> = targets
        .iter()
        .filter(|t| matches!(t, Target::Linux(_)))
        .map(|t| t.hostname().to_string())
        .collect();

    let windows_types = filtered_types(WINDOWS_CHECKS, enabled);
    let linux_types = filtered_types(LINUX_CHECKS, enabled);

    let (w_checks, w_summary) = full_coverage(&windows_hosts, &windows_types, findings);
    let (l_checks, l_summary) = full_coverage(&linux_hosts, &linux_types, findings);

    merge(w_checks, w_summary, l_checks, l_summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use msp_types::{Severity, WindowsTarget};

    fn windows_target(hostname: &str) -> Target {
        Target::Windows(WindowsTarget {
            hostname: hostname.to_string(),
            port: 5986,
            user: "admin".into(),
            password: "pw".into(),
            use_ssl: true,
        })
    }

    #[test]
    fn two_windows_hosts_yield_38_windows_checks() {
        let targets = vec![windows_target("dc01"), windows_target("ws01")];
        let findings = vec![DriftFinding {
            hostname: "ws01".into(),
            check_type: "firewall_status".into(),
            passed: false,
            expected: Some("enabled".into()),
            actual: Some("disabled".into()),
            severity: Severity::High,
            hipaa_control: Some("164.312(c)(1)".into()),
            evidence_data: None,
        }];

        let (checks, summary) = full_cycle_coverage(&targets, &findings, None);
        assert_eq!(checks.len(), 38);
        assert_eq!(summary.total_checks, 38);
        assert_eq!(summary.non_compliant, 1);
        assert_eq!(summary.compliant, 37);
    }
}
