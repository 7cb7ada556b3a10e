//! Builtin runbook catalog and the L1 rules that reference them (spec §3
//! "Runbook", §4.3 "L1 Rule"). `source = builtin` throughout: these never
//! sync from, or get overwritten by, the control plane.

use std::collections::HashMap;

use msp_types::{Condition, ConditionOp, L1Rule, Runbook, RuleSource, RunbookStep};
use serde_json::json;

fn step(
    name: &str,
    script: &str,
    timeout_s: u64,
    tier: u8,
    disruptive: bool,
    post_conditions: &[&str],
    rollback_script: Option<&str>,
) -> RunbookStep {
    RunbookStep {
        name: name.to_string(),
        script: script.to_string(),
        timeout_s,
        resource_cost_tier: tier,
        disruptive,
        post_conditions: post_conditions.iter().map(|s| s.to_string()).collect(),
        rollback_script: rollback_script.map(str::to_string),
    }
}

fn runbook(runbook_id: &str, steps: Vec<RunbookStep>) -> Runbook {
    Runbook {
        runbook_id: runbook_id.to_string(),
        version: 1,
        steps,
    }
}

/// Every runbook the appliance ships with. Identified by stable ids; new
/// revisions would be new ids entirely (spec §3: "Immutable per version").
pub fn builtin_runbooks() -> Vec<Runbook> {
    vec![
        runbook(
            "RB-WIN-FIREWALL-001",
            vec![step(
                "enable-firewall",
                "remediate-firewall-enable",
                60,
                1,
                true,
                &["firewall_status=enabled"],
                Some("remediate-firewall-restore-previous"),
            )],
        ),
        runbook(
            "RB-WIN-DEFENDER-001",
            vec![step(
                "start-defender",
                "remediate-defender-start",
                60,
                1,
                false,
                &["windows_defender=running"],
                None,
            )],
        ),
        runbook(
            "RB-WIN-BITLOCKER-001",
            vec![step(
                "enable-bitlocker",
                "remediate-bitlocker-enable",
                120,
                3,
                true,
                &["bitlocker_status=enabled"],
                None,
            )],
        ),
        runbook(
            "RB-WIN-SCREENLOCK-001",
            vec![step(
                "configure-screen-lock",
                "remediate-screenlock-configure",
                30,
                1,
                false,
                &["screen_lock_policy=enforced"],
                None,
            )],
        ),
        runbook(
            "RB-WIN-SMB1-001",
            vec![step(
                "disable-smb1",
                "remediate-smb1-disable",
                90,
                2,
                true,
                &["smb1_protocol=disabled"],
                Some("remediate-smb1-restore-previous"),
            )],
        ),
        runbook(
            "RB-WIN-GUEST-001",
            vec![step(
                "disable-guest-account",
                "remediate-guest-disable",
                30,
                1,
                false,
                &["guest_account=disabled"],
                None,
            )],
        ),
        runbook(
            "RB-LINUX-FIREWALL-001",
            vec![step(
                "enable-ufw",
                "remediate-linux-firewall-enable",
                60,
                1,
                true,
                &["linux_firewall=active"],
                Some("remediate-linux-firewall-restore-previous"),
            )],
        ),
        runbook(
            "RB-LINUX-SSHCFG-001",
            vec![step(
                "harden-sshd-config",
                "remediate-linux-ssh-harden",
                60,
                2,
                true,
                &["linux_ssh_config=hardened"],
                Some("remediate-linux-ssh-restore-previous"),
            )],
        ),
        runbook(
            "RB-LINUX-UNATTENDED-001",
            vec![step(
                "enable-unattended-upgrades",
                "remediate-linux-unattended-enable",
                60,
                1,
                false,
                &["linux_unattended_upgrades=enabled"],
                None,
            )],
        ),
    ]
}

fn condition_eq(field: &str, value: &str) -> Condition {
    Condition {
        field: field.to_string(),
        op: ConditionOp::Eq,
        value: json!(value),
    }
}

/// Builtin L1 rules, one per check type with a deterministic remediation.
/// Check types with no safe deterministic fix (e.g. `rogue_admin_users`,
/// which needs judgment about which account is rogue) intentionally have
/// no builtin rule and fall through to L2/L3.
pub fn builtin_rules() -> Vec<L1Rule> {
    let mapping: &[(&str, &str)] = &[
        ("firewall_status", "RB-WIN-FIREWALL-001"),
        ("windows_defender", "RB-WIN-DEFENDER-001"),
        ("bitlocker_status", "RB-WIN-BITLOCKER-001"),
        ("screen_lock_policy", "RB-WIN-SCREENLOCK-001"),
        ("smb1_protocol", "RB-WIN-SMB1-001"),
        ("guest_account", "RB-WIN-GUEST-001"),
        ("linux_firewall", "RB-LINUX-FIREWALL-001"),
        ("linux_ssh_config", "RB-LINUX-SSHCFG-001"),
        ("linux_unattended_upgrades", "RB-LINUX-UNATTENDED-001"),
    ];

    mapping
        .iter()
        .map(|(check_type, runbook_id)| L1Rule {
            rule_id: format!("builtin-{check_type}"),
            conditions: vec![condition_eq("check_type", check_type), condition_eq("passed", "false")],
            runbook_id: runbook_id.to_string(),
            source: RuleSource::Builtin,
            min_confidence: None,
        })
        .collect()
}

/// In-memory lookup from `runbook_id` to its definition; used by the
/// engine to fetch steps once a rule (or an L2 decision carrying a
/// `runbook_id`) has selected one.
pub struct RunbookCatalog {
    by_id: HashMap<String, Runbook>,
}

impl RunbookCatalog {
    pub fn new(runbooks: Vec<Runbook>) -> Self {
        let by_id = runbooks.into_iter().map(|r| (r.runbook_id.clone(), r)).collect();
        Self { by_id }
    }

    pub fn builtin() -> Self {
        Self::new(builtin_runbooks())
    }

    pub fn get(&self, runbook_id: &str) -> Option<&Runbook> {
        self.by_id.get(runbook_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_rule_references_a_real_runbook() {
        let catalog = RunbookCatalog::builtin();
        for rule in builtin_rules() {
            assert!(
                catalog.get(&rule.runbook_id).is_some(),
                "rule {} references missing runbook {}",
                rule.rule_id,
                rule.runbook_id
            );
        }
    }

    #[test]
    fn disruptive_steps_carry_a_rollback() {
        let catalog = RunbookCatalog::builtin();
        let rb = catalog.get("RB-WIN-FIREWALL-001").unwrap();
        assert!(rb.steps[0].disruptive);
        assert!(rb.steps[0].rollback_script.is_some());
    }
}
