use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Dashboard status derived purely from the last checkin timestamp.
/// Rendering is out of scope; this predicate is the load-bearing contract
/// the (out-of-scope) dashboard consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplianceStatus {
    Online,
    Stale,
    Offline,
}

/// `online` <5 min, `stale` 5-15 min, `offline` >15 min since `last_checkin`.
/// Boundaries are right-exclusive on the lower status (exactly 5 min is
/// already `stale`, exactly 15 min is already `offline`).
pub fn appliance_status(last_checkin: DateTime<Utc>, now: DateTime<Utc>) -> ApplianceStatus {
    let age = now - last_checkin;
    if age < Duration::minutes(5) {
        ApplianceStatus::Online
    } else if age < Duration::minutes(15) {
        ApplianceStatus::Stale
    } else {
        ApplianceStatus::Offline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(mins_ago: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc::now();
        (now - Duration::minutes(mins_ago), now)
    }

    #[test]
    fn boundaries() {
        let (last, now) = at(0);
        assert_eq!(appliance_status(last, now), ApplianceStatus::Online);

        let (last, now) = at(4);
        assert_eq!(appliance_status(last, now), ApplianceStatus::Online);

        let (last, now) = at(5);
        assert_eq!(appliance_status(last, now), ApplianceStatus::Stale);

        let (last, now) = at(14);
        assert_eq!(appliance_status(last, now), ApplianceStatus::Stale);

        let (last, now) = at(15);
        assert_eq!(appliance_status(last, now), ApplianceStatus::Offline);

        let (last, now) = at(60);
        assert_eq!(appliance_status(last, now), ApplianceStatus::Offline);
    }
}
