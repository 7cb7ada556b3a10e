//! Pattern signatures: a deterministic string summarizing a drift
//! condition so identical problems produce identical signatures across
//! sites (spec §3, "Pattern signature"). Used for incident dedup and for
//! the L2→L1 learning-loop promotion rule (§4.3).

use msp_types::DriftFinding;

/// Coarse host class inferred from naming convention, independent of the
/// specific hostname so the signature generalizes across sites.
fn host_class(hostname: &str) -> &'static str {
    let lower = hostname.to_ascii_lowercase();
    if lower.starts_with("dc") {
        "domain_controller"
    } else if lower.starts_with("ws") {
        "workstation"
    } else if lower.starts_with("srv") || lower.starts_with("svr") {
        "server"
    } else {
        "host"
    }
}

/// Strips digits from an observable so "firewall disabled on port 8080"
/// and "...port 9090" collapse to the same signature; digits are the most
/// common site-specific noise in probe output.
fn scrub_digits(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_digit() { '#' } else { c })
        .collect()
}

/// `{check_type}|{host_class}|{scrubbed actual}`. Stable across sites for
/// the same underlying problem; stable across repeated scans of the same
/// problem on the same host class.
pub fn pattern_signature(finding: &DriftFinding) -> String {
    let class = host_class(&finding.hostname);
    let observable = finding
        .actual
        .as_deref()
        .map(scrub_digits)
        .unwrap_or_default();
    format!("{}|{}|{}", finding.check_type, class, observable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use msp_types::Severity;

    fn finding(hostname: &str, actual: &str) -> DriftFinding {
        DriftFinding {
            hostname: hostname.into(),
            check_type: "firewall_status".into(),
            passed: false,
            expected: Some("enabled".into()),
            actual: Some(actual.into()),
            severity: Severity::High,
            hipaa_control: Some("164.312(c)(1)".into()),
            evidence_data: None,
        }
    }

    #[test]
    fn identical_problems_same_signature_across_sites() {
        let a = pattern_signature(&finding("ws01", "disabled on port 8080"));
        let b = pattern_signature(&finding("ws42", "disabled on port 9090"));
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_host_class_distinct_signature() {
        let a = pattern_signature(&finding("ws01", "disabled"));
        let b = pattern_signature(&finding("dc01", "disabled"));
        assert_ne!(a, b);
    }
}
