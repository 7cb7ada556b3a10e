//! The closed check catalog (spec §4.2): 19 Windows checks, 15 Linux
//! checks, 4 network checks, each tied to exactly one HIPAA control.
//! Check-type identifiers are stable and additive-only — evidence-bundle
//! summaries are built by cross-joining scanned hosts × check types, so
//! removing or renaming an entry here would break historical bundles.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    Network,
}

#[derive(Debug, Clone, Copy)]
pub struct CheckDef {
    pub check_type: &'static str,
    pub hipaa_control: &'static str,
    pub platform: Platform,
    /// Probe script run on the target via msp-executors; the scanner
    /// doesn't interpret its contents, only its structured stdout.
    pub probe_script: &'static str,
}

macro_rules! check {
    ($check_type:literal, $hipaa:literal, $platform:expr, $script:literal) => {
        CheckDef {
            check_type: $check_type,
            hipaa_control: $hipaa,
            platform: $platform,
            probe_script: $script,
        }
    };
}

pub const WINDOWS_CHECKS: &[CheckDef] = &[
    check!("firewall_status", "164.312(c)(1)", Platform::Windows, "probe-firewall-status"),
    check!("windows_defender", "164.308(a)(5)(ii)(B)", Platform::Windows, "probe-defender-status"),
    check!("windows_update", "164.308(a)(5)(ii)(B)", Platform::Windows, "probe-windows-update"),
    check!("audit_logging", "164.312(b)", Platform::Windows, "probe-audit-logging"),
    check!("rogue_admin_users", "164.308(a)(4)(ii)(C)", Platform::Windows, "probe-rogue-admins"),
    check!("rogue_scheduled_tasks", "164.308(a)(5)(ii)(C)", Platform::Windows, "probe-scheduled-tasks"),
    check!("agent_status", "164.308(a)(1)(ii)(D)", Platform::Windows, "probe-agent-status"),
    check!("bitlocker_status", "164.312(a)(2)(iv)", Platform::Windows, "probe-bitlocker-status"),
    check!("smb_signing", "164.312(e)(1)", Platform::Windows, "probe-smb-signing"),
    check!("smb1_protocol", "164.312(e)(1)", Platform::Windows, "probe-smb1-protocol"),
    check!("screen_lock_policy", "164.312(a)(2)(iii)", Platform::Windows, "probe-screen-lock"),
    check!("defender_exclusions", "164.308(a)(5)(ii)(B)", Platform::Windows, "probe-defender-exclusions"),
    check!("dns_config", "164.312(e)(1)", Platform::Windows, "probe-dns-config"),
    check!("network_profile", "164.312(e)(1)", Platform::Windows, "probe-network-profile"),
    check!("password_policy", "164.308(a)(5)(ii)(D)", Platform::Windows, "probe-password-policy"),
    check!("rdp_nla", "164.312(e)(1)", Platform::Windows, "probe-rdp-nla"),
    check!("guest_account", "164.308(a)(4)(ii)(C)", Platform::Windows, "probe-guest-account"),
    check!("service_dns", "164.312(e)(1)", Platform::Windows, "probe-service-dns"),
    check!("service_netlogon", "164.312(e)(1)", Platform::Windows, "probe-service-netlogon"),
];

pub const LINUX_CHECKS: &[CheckDef] = &[
    check!("linux_firewall", "164.312(c)(1)", Platform::Linux, "probe-linux-firewall"),
    check!("linux_ssh_config", "164.312(e)(1)", Platform::Linux, "probe-linux-ssh-config"),
    check!("linux_failed_services", "164.308(a)(1)(ii)(D)", Platform::Linux, "probe-linux-failed-services"),
    check!("linux_disk_space", "164.308(a)(7)(ii)(A)", Platform::Linux, "probe-linux-disk-space"),
    check!("linux_suid_binaries", "164.308(a)(4)(ii)(C)", Platform::Linux, "probe-linux-suid-binaries"),
    check!("linux_audit_logging", "164.312(b)", Platform::Linux, "probe-linux-audit-logging"),
    check!("linux_ntp_sync", "164.312(b)", Platform::Linux, "probe-linux-ntp-sync"),
    check!("linux_kernel_params", "164.312(e)(1)", Platform::Linux, "probe-linux-kernel-params"),
    check!("linux_open_ports", "164.312(e)(1)", Platform::Linux, "probe-linux-open-ports"),
    check!("linux_user_accounts", "164.308(a)(4)(ii)(C)", Platform::Linux, "probe-linux-user-accounts"),
    check!("linux_file_permissions", "164.312(a)(1)", Platform::Linux, "probe-linux-file-permissions"),
    check!("linux_unattended_upgrades", "164.308(a)(5)(ii)(B)", Platform::Linux, "probe-linux-unattended-upgrades"),
    check!("linux_log_forwarding", "164.312(b)", Platform::Linux, "probe-linux-log-forwarding"),
    check!("linux_cron_review", "164.308(a)(5)(ii)(C)", Platform::Linux, "probe-linux-cron-review"),
    check!("linux_cert_expiry", "164.312(e)(1)", Platform::Linux, "probe-linux-cert-expiry"),
];

pub const NETWORK_CHECKS: &[CheckDef] = &[
    check!("net_unexpected_ports", "164.312(e)(1)", Platform::Network, "probe-net-unexpected-ports"),
    check!("net_expected_service", "164.312(e)(1)", Platform::Network, "probe-net-expected-service"),
    check!("net_host_reachability", "164.308(a)(7)(ii)(C)", Platform::Network, "probe-net-host-reachability"),
    check!("net_dns_resolution", "164.312(e)(1)", Platform::Network, "probe-net-dns-resolution"),
];

pub fn all_checks() -> impl Iterator<Item = &'static CheckDef> {
    WINDOWS_CHECKS.iter().chain(LINUX_CHECKS.iter()).chain(NETWORK_CHECKS.iter())
}

pub fn find(check_type: &str) -> Option<&'static CheckDef> {
    all_checks().find(|c| c.check_type == check_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_sizes_match_spec() {
        assert_eq!(WINDOWS_CHECKS.len(), 19);
        assert_eq!(LINUX_CHECKS.len(), 15);
        assert_eq!(NETWORK_CHECKS.len(), 4);
    }

    #[test]
    fn every_check_type_is_unique() {
        let mut seen = std::collections::HashSet::new();
        for c in all_checks() {
            assert!(seen.insert(c.check_type), "duplicate check_type {}", c.check_type);
        }
    }
}
