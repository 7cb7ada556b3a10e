//! Flap suppression state machine (spec §4.3, invariant I7). Persistence
//! lives in msp-healing's `flap_suppressions.db`; this module is the pure
//! decision logic over one `(host, check_type)` bucket's transition
//! history.

use chrono::{DateTime, Duration, TimeZone, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlapOutcome {
    /// Fewer than 4 toggles in the trailing 30 minutes; proceed normally.
    Normal,
    /// The 4th toggle in the window just happened: suppress for the rest
    /// of the day and escalate to L3 exactly once.
    EscalateThenSuppress,
    /// Already suppressed today; silently drop.
    Suppressed,
}

#[derive(Debug, Clone)]
pub struct FlapState {
    pub first_seen: DateTime<Utc>,
    pub last_flap: DateTime<Utc>,
    transitions: Vec<DateTime<Utc>>,
    suppressed_until: Option<DateTime<Utc>>,
    escalated_today: bool,
}

fn end_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let next_midnight = now.date_naive().succ_opt().unwrap_or(now.date_naive());
    Utc.from_utc_datetime(&next_midnight.and_hms_opt(0, 0, 0).unwrap())
}

impl FlapState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            first_seen: now,
            last_flap: now,
            transitions: Vec::new(),
            suppressed_until: None,
            escalated_today: false,
        }
    }

    pub fn flap_count_in_window(&self) -> usize {
        self.transitions.len()
    }

    /// Records a pass/fail toggle and returns how the caller should treat
    /// it. Must be called once per observed transition, not per scan.
    pub fn record_transition(&mut self, now: DateTime<Utc>) -> FlapOutcome {
        if let Some(until) = self.suppressed_until {
            if now < until {
                self.last_flap = now;
                return FlapOutcome::Suppressed;
            }
            // A new day has started: the daily mute resets.
            self.suppressed_until = None;
            self.transitions.clear();
            self.escalated_today = false;
        }

        self.transitions
            .retain(|t| now.signed_duration_since(*t) < Duration::minutes(30));
        self.transitions.push(now);
        self.last_flap = now;

        if self.transitions.len() >= 4 {
            self.suppressed_until = Some(end_of_day(now));
            if !self.escalated_today {
                self.escalated_today = true;
                return FlapOutcome::EscalateThenSuppress;
            }
            return FlapOutcome::Suppressed;
        }

        FlapOutcome::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourth_toggle_in_thirty_minutes_escalates_then_suppresses() {
        let t0 = Utc::now();
        let mut fs = FlapState::new(t0);
        assert_eq!(fs.record_transition(t0), FlapOutcome::Normal);
        assert_eq!(fs.record_transition(t0 + Duration::minutes(5)), FlapOutcome::Normal);
        assert_eq!(fs.record_transition(t0 + Duration::minutes(10)), FlapOutcome::Normal);
        assert_eq!(
            fs.record_transition(t0 + Duration::minutes(18)),
            FlapOutcome::EscalateThenSuppress
        );
        assert_eq!(
            fs.record_transition(t0 + Duration::minutes(28)),
            FlapOutcome::Suppressed
        );
    }

    #[test]
    fn sixth_transition_ten_minutes_later_stays_suppressed() {
        let t0 = Utc::now();
        let mut fs = FlapState::new(t0);
        for m in [0, 5, 10, 18] {
            fs.record_transition(t0 + Duration::minutes(m));
        }
        let outcome = fs.record_transition(t0 + Duration::minutes(28));
        assert_eq!(outcome, FlapOutcome::Suppressed);
    }

    #[test]
    fn fewer_than_four_stays_normal() {
        let t0 = Utc::now();
        let mut fs = FlapState::new(t0);
        assert_eq!(fs.record_transition(t0), FlapOutcome::Normal);
        assert_eq!(fs.record_transition(t0 + Duration::minutes(29)), FlapOutcome::Normal);
    }
}
