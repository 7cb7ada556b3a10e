//! Per-`(host, check_type)` circuit breaker (spec §4.3, invariant-adjacent
//! to I5/I7). Persistence of the bucket key lives in msp-healing; this is
//! the pure state machine for one bucket.

use chrono::{DateTime, Duration, Utc};

/// Opens when 3 failures land within a trailing hour; once open, stays
/// open until 2 hours pass with no new failure (spec §4.3).
#[derive(Debug, Clone, Default)]
pub struct CircuitBreaker {
    failure_times: Vec<DateTime<Utc>>,
    open: bool,
    last_failure_at: Option<DateTime<Utc>>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.failure_times
            .retain(|t| now.signed_duration_since(*t) < Duration::hours(1));
        self.failure_times.push(now);
        self.last_failure_at = Some(now);
        if self.failure_times.len() >= 3 {
            self.open = true;
        }
    }

    /// Evaluates the 2-hour auto-close rule against `now` and returns
    /// whether the bucket is currently open (i.e. should be `deferred`).
    pub fn is_open(&mut self, now: DateTime<Utc>) -> bool {
        if self.open {
            if let Some(last) = self.last_failure_at {
                if now.signed_duration_since(last) >= Duration::hours(2) {
                    self.open = false;
                    self.failure_times.clear();
                }
            }
        }
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_three_failures_in_an_hour() {
        let mut cb = CircuitBreaker::new();
        let t0 = Utc::now();
        assert!(!cb.is_open(t0));
        cb.record_failure(t0);
        cb.record_failure(t0 + Duration::minutes(10));
        assert!(!cb.is_open(t0 + Duration::minutes(10)));
        cb.record_failure(t0 + Duration::minutes(20));
        assert!(cb.is_open(t0 + Duration::minutes(20)));
    }

    #[test]
    fn stays_open_until_two_hours_of_quiet() {
        let mut cb = CircuitBreaker::new();
        let t0 = Utc::now();
        cb.record_failure(t0);
        cb.record_failure(t0 + Duration::minutes(5));
        cb.record_failure(t0 + Duration::minutes(10));
        assert!(cb.is_open(t0 + Duration::minutes(70)));
        assert!(cb.is_open(t0 + Duration::hours(1) + Duration::minutes(59)));
        assert!(!cb.is_open(t0 + Duration::minutes(10) + Duration::hours(2)));
    }
}
