//! Persistent flap-suppression tracking (spec §3 `flap_suppressions.db`,
//! §4.3, invariant I7). The 30-minute rolling window lives in the
//! in-memory `msp_core::FlapState` per bucket (it needs the full
//! transition history, which the on-disk table intentionally doesn't
//! carry); the SQLite row is the durable summary an operator can inspect
//! (`first_seen, last_flap, flap_count`) and survives a restart even
//! though the rolling window itself resets (see DESIGN.md).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use msp_core::{FlapOutcome, FlapState};

use crate::error::HealingError;

pub struct FlapStore {
    conn: Connection,
    states: HashMap<(String, String), FlapState>,
}

impl FlapStore {
    pub fn open(conn: Connection) -> Result<Self, HealingError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS flap_suppressions (
                host TEXT NOT NULL,
                check_type TEXT NOT NULL,
                first_seen TEXT NOT NULL,
                last_flap TEXT NOT NULL,
                flap_count INTEGER NOT NULL,
                PRIMARY KEY (host, check_type)
            )",
        )?;
        Ok(Self {
            conn,
            states: HashMap::new(),
        })
    }

    /// Records one observed pass/fail toggle for `(host, check_type)` and
    /// returns how the caller should treat it. Must be invoked once per
    /// observed transition (the scanner, not the engine, decides whether
    /// a given scan result is a toggle relative to the previous one).
    pub fn record_transition(
        &mut self,
        host: &str,
        check_type: &str,
        now: DateTime<Utc>,
    ) -> Result<FlapOutcome, HealingError> {
        let key = (host.to_string(), check_type.to_string());
        let state = self.states.entry(key).or_insert_with(|| FlapState::new(now));
        let outcome = state.record_transition(now);

        self.conn.execute(
            "INSERT INTO flap_suppressions (host, check_type, first_seen, last_flap, flap_count)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(host, check_type) DO UPDATE SET
                last_flap = excluded.last_flap,
                flap_count = excluded.flap_count",
            params![
                host,
                check_type,
                state.first_seen.to_rfc3339(),
                state.last_flap.to_rfc3339(),
                state.flap_count_in_window() as i64,
            ],
        )?;

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use msp_infra::sqlite::open_memory;

    #[test]
    fn fourth_toggle_escalates_and_persists_count() {
        let mut store = FlapStore::open(open_memory().unwrap()).unwrap();
        let t0 = Utc::now();
        for m in [0, 5, 10] {
            let outcome = store
                .record_transition("ws01", "smb1_protocol", t0 + Duration::minutes(m))
                .unwrap();
            assert_eq!(outcome, FlapOutcome::Normal);
        }
        let outcome = store
            .record_transition("ws01", "smb1_protocol", t0 + Duration::minutes(18))
            .unwrap();
        assert_eq!(outcome, FlapOutcome::EscalateThenSuppress);

        let count: i64 = store
            .conn
            .query_row(
                "SELECT flap_count FROM flap_suppressions WHERE host = 'ws01' AND check_type = 'smb1_protocol'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 4);
    }
}
