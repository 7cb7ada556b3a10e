//! Evidence coverage (spec §4.2, invariant I2): the emitted bundle
//! enumerates the full Cartesian product of scanned hosts × check types,
//! with `fail` exactly where a drift finding exists and `pass` elsewhere.

use std::collections::HashMap;

use msp_types::{CheckEntry, DriftFinding, Summary};

/// Builds the full `(host, check_type)` coverage grid. `check_types` must
/// be the complete enabled set for the hosts' platforms; `findings`
/// should contain only the drift (failing) results the scan produced.
pub fn full_coverage(
    hosts: &[String],
    check_types: &[&str],
    findings: &[DriftFinding],
) -> (Vec<CheckEntry>, Summary) {
    let mut by_key: HashMap<(&str, &str), &DriftFinding> = HashMap::new();
    for f in findings {
        by_key.insert((f.hostname.as_str(), f.check_type.as_str()), f);
    }

    let mut checks = Vec::with_capacity(hosts.len() * check_types.len());
    let mut non_compliant = 0usize;

    for host in hosts {
        for check_type in check_types {
            match by_key.get(&(host.as_str(), *check_type)) {
                Some(finding) => {
                    non_compliant += 1;
                    checks.push(CheckEntry {
                        check: check_type.to_string(),
                        hostname: host.clone(),
                        status: "fail".to_string(),
                        expected: finding.expected.clone(),
                        actual: finding.actual.clone(),
                        hipaa_control: finding.hipaa_control.clone(),
                    });
                }
                None => {
                    checks.push(CheckEntry {
                        check: check_type.to_string(),
                        hostname: host.clone(),
                        status: "pass".to_string(),
                        expected: None,
                        actual: None,
                        hipaa_control: crate::catalog::find(check_type).map(|c| c.hipaa_control.to_string()),
                    });
                }
            }
        }
    }

    let total = checks.len();
    let summary = Summary {
        total_checks: total,
        compliant: total - non_compliant,
        non_compliant,
        scanned_hosts: hosts.len(),
    };

    (checks, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use msp_types::Severity;

    #[test]
    fn cross_join_is_exactly_hosts_times_checks() {
        let hosts = vec!["dc01".to_string(), "ws01".to_string()];
        let check_types = vec!["firewall_status", "audit_logging"];
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

        let (checks, summary) = full_coverage(&hosts, &check_types, &findings);
        assert_eq!(checks.len(), 4);
        assert_eq!(summary.total_checks, 4);
        assert_eq!(summary.non_compliant, 1);
        assert_eq!(summary.compliant, 3);

        let failed: Vec<_> = checks.iter().filter(|c| c.status == "fail").collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].hostname, "ws01");
    }
}
