use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A staged-but-unsent evidence bundle. Backed by a SQLite row on the
/// appliance (msp-evidence owns the table); this is the in-memory shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedEvidence {
    pub id: i64,
    pub bundle_id: String,
    pub bundle_path: String,
    pub signature_path: String,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub next_retry_at: DateTime<Utc>,
}

impl QueuedEvidence {
    /// `delay_minutes = min(2^retry_count, 60)`.
    pub fn backoff_minutes(retry_count: u32) -> i64 {
        let doubled = 1i64.checked_shl(retry_count).unwrap_or(i64::MAX);
        doubled.min(60)
    }

    pub fn is_max_retries(&self) -> bool {
        self.retry_count >= 10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_caps_at_sixty() {
        assert_eq!(QueuedEvidence::backoff_minutes(0), 1);
        assert_eq!(QueuedEvidence::backoff_minutes(1), 2);
        assert_eq!(QueuedEvidence::backoff_minutes(5), 32);
        assert_eq!(QueuedEvidence::backoff_minutes(6), 60);
        assert_eq!(QueuedEvidence::backoff_minutes(10), 60);
    }
}
