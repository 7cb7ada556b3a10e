//! In-memory registry of per-`(host, check_type)` circuit breakers (spec
//! §4.3, §5 "single writer per mutation"). Not persisted: a restart resets
//! all breakers to closed, which is acceptable since the bucket re-opens
//! within the hour if the underlying problem is still there.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use msp_core::CircuitBreaker;

#[derive(Default)]
pub struct CircuitRegistry {
    breakers: HashMap<(String, String), CircuitBreaker>,
}

impl CircuitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_failure(&mut self, host: &str, check_type: &str, now: DateTime<Utc>) {
        self.breakers
            .entry((host.to_string(), check_type.to_string()))
            .or_default()
            .record_failure(now);
    }

    pub fn is_open(&mut self, host: &str, check_type: &str, now: DateTime<Utc>) -> bool {
        self.breakers
            .entry((host.to_string(), check_type.to_string()))
            .or_default()
            .is_open(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn buckets_are_independent() {
        let mut reg = CircuitRegistry::new();
        let t0 = Utc::now();
        for _ in 0..3 {
            reg.record_failure("ws01", "firewall_status", t0);
        }
        assert!(reg.is_open("ws01", "firewall_status", t0));
        assert!(!reg.is_open("ws01", "windows_defender", t0));
        assert!(!reg.is_open("ws02", "firewall_status", t0));
    }
}
