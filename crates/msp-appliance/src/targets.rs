//! Converts a checkin response's target lists into the `Target` values the
//! scanner and healing engine operate on. Targets are never persisted
//! (spec §3: "transient data... live in memory for one execution cycle").

use msp_types::Target;

use crate::checkin::CheckinResponse;

pub fn targets_from_checkin(response: &CheckinResponse) -> Vec<Target> {
    let mut targets: Vec<Target> = response
        .windows_targets
        .iter()
        .cloned()
        .map(Target::Windows)
        .collect();
    targets.extend(response.linux_targets.iter().cloned().map(Target::Linux));
    targets
}

pub fn hostnames(targets: &[Target]) -> Vec<String> {
    targets.iter().map(|t| t.hostname().to_string()).collect()
}
