//! Go-agent check-name mapping and the immediate `HealCommand` table
//! (spec §4.5). The Go agent's check names are a subset of the internal
//! L1 check-type catalog (`msp_scanner`); this module is the single
//! translation point so neither the registry nor the service trait
//! implementation has to know about it.

use crate::registry::QueuedCommand;

/// Maps a Go-agent check name onto the internal L1 `check_type` used by
/// `msp_core::find_match`/`msp_scanner`. Unknown names pass through
/// unchanged so a future agent check is additive rather than silently
/// dropped.
pub fn to_internal_check_type(agent_check: &str) -> String {
    match agent_check {
        "defender" => "windows_defender",
        "firewall" => "firewall_status",
        "screenlock" => "screen_lock_policy",
        "patches" => "patching",
        other => other,
    }
    .to_string()
}

/// Builds the bounded immediate `HealCommand` an ack carries for a small
/// set of known check types (spec §4.5's `ReportDrift` row): firewall,
/// defender, bitlocker, and screenlock each get a fixed action/timeout.
/// Anything else returns `None` — it's handled by the normal post-scan
/// healing cycle instead.
pub fn immediate_heal_command(agent_check: &str) -> Option<QueuedCommand> {
    let (action, timeout_seconds) = match agent_check {
        "firewall" => ("enable", 60),
        "defender" => ("start", 60),
        "bitlocker" => ("enable", 120),
        "screenlock" => ("configure", 30),
        _ => return None,
    };

    Some(QueuedCommand {
        command_id: uuid::Uuid::new_v4().to_string(),
        action: action.to_string(),
        timeout_seconds,
        params_json: "{}".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_agent_checks() {
        assert_eq!(to_internal_check_type("defender"), "windows_defender");
        assert_eq!(to_internal_check_type("firewall"), "firewall_status");
        assert_eq!(to_internal_check_type("screenlock"), "screen_lock_policy");
        assert_eq!(to_internal_check_type("patches"), "patching");
    }

    #[test]
    fn unknown_check_passes_through() {
        assert_eq!(to_internal_check_type("rogue_admin_users"), "rogue_admin_users");
    }

    #[test]
    fn immediate_commands_only_for_known_types() {
        assert!(immediate_heal_command("firewall").is_some());
        assert_eq!(immediate_heal_command("bitlocker").unwrap().timeout_seconds, 120);
        assert!(immediate_heal_command("linux_firewall").is_none());
    }
}
