//! The offline queue (spec §4.4, §7, invariant R2): SQLite WAL-backed,
//! exponential backoff capped at 60 minutes, rows beyond 10 retries stay
//! as `failed_max_retries` for operator inspection rather than being
//! dropped.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use msp_types::QueuedEvidence;

use crate::error::EvidenceError;

pub struct EvidenceQueue {
    conn: Connection,
}

impl EvidenceQueue {
    pub fn open(conn: Connection) -> Result<Self, EvidenceError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS evidence_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bundle_id TEXT NOT NULL UNIQUE,
                bundle_path TEXT NOT NULL,
                signature_path TEXT NOT NULL,
                retry_count INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                uploaded_at TEXT,
                next_retry_at TEXT NOT NULL
            )",
        )?;
        Ok(Self { conn })
    }

    pub fn enqueue(&self, bundle_id: &str, bundle_path: &str, signature_path: &str, now: DateTime<Utc>) -> Result<i64, EvidenceError> {
        self.conn.execute(
            "INSERT INTO evidence_queue (bundle_id, bundle_path, signature_path, retry_count, next_retry_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![bundle_id, bundle_path, signature_path, now.to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Rows due for an upload attempt: `next_retry_at <= now` and
    /// `retry_count <= 10`, oldest-first (spec §4.4: "Drain is attempted
    /// every cycle, oldest-first").
    pub fn due_for_retry(&self, now: DateTime<Utc>) -> Result<Vec<QueuedEvidence>, EvidenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, bundle_id, bundle_path, signature_path, retry_count, last_error, uploaded_at, next_retry_at
             FROM evidence_queue
             WHERE uploaded_at IS NULL AND retry_count <= 10 AND next_retry_at <= ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![now.to_rfc3339()], Self::row_to_queued)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn row_to_queued(row: &rusqlite::Row) -> rusqlite::Result<QueuedEvidence> {
        let uploaded_at: Option<String> = row.get(6)?;
        let next_retry_at: String = row.get(7)?;
        Ok(QueuedEvidence {
            id: row.get(0)?,
            bundle_id: row.get(1)?,
            bundle_path: row.get(2)?,
            signature_path: row.get(3)?,
            retry_count: row.get(4)?,
            last_error: row.get(5)?,
            uploaded_at: uploaded_at.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&Utc)),
            next_retry_at: DateTime::parse_from_rfc3339(&next_retry_at).unwrap().with_timezone(&Utc),
        })
    }

    /// Bumps `retry_count`, records `error`, and schedules the next
    /// attempt with `delay_minutes = min(2^retry_count, 60)`.
    pub fn mark_failed(&self, bundle_id: &str, error: &str, now: DateTime<Utc>) -> Result<(), EvidenceError> {
        let retry_count: u32 = self
            .conn
            .query_row("SELECT retry_count FROM evidence_queue WHERE bundle_id = ?1", params![bundle_id], |r| r.get(0))?;
        let next_count = retry_count + 1;
        let delay = QueuedEvidence::backoff_minutes(retry_count);
        let next_retry_at = now + Duration::minutes(delay);

        self.conn.execute(
            "UPDATE evidence_queue SET retry_count = ?1, last_error = ?2, next_retry_at = ?3 WHERE bundle_id = ?4",
            params![next_count, error, next_retry_at.to_rfc3339(), bundle_id],
        )?;
        Ok(())
    }

    pub fn mark_uploaded(&self, bundle_id: &str, now: DateTime<Utc>) -> Result<(), EvidenceError> {
        self.conn.execute(
            "UPDATE evidence_queue SET uploaded_at = ?1 WHERE bundle_id = ?2",
            params![now.to_rfc3339(), bundle_id],
        )?;
        Ok(())
    }

    pub fn get(&self, bundle_id: &str) -> Result<Option<QueuedEvidence>, EvidenceError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, bundle_id, bundle_path, signature_path, retry_count, last_error, uploaded_at, next_retry_at
                 FROM evidence_queue WHERE bundle_id = ?1",
                params![bundle_id],
                Self::row_to_queued,
            )
            .optional()?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msp_infra::sqlite::open_memory;

    #[test]
    fn enqueue_then_mark_failed_preserves_identity_and_backs_off() {
        let queue = EvidenceQueue::open(open_memory().unwrap()).unwrap();
        let now = Utc::now();
        queue.enqueue("bundle-1", "/path/bundle.json", "/path/bundle.sig", now).unwrap();

        let row = queue.get("bundle-1").unwrap().unwrap();
        assert_eq!(row.retry_count, 0);

        queue.mark_failed("bundle-1", "network unreachable", now).unwrap();
        let row = queue.get("bundle-1").unwrap().unwrap();
        assert_eq!(row.retry_count, 1);
        assert_eq!(row.id, 1);
        assert!(row.next_retry_at > now);
    }

    #[test]
    fn enqueue_then_mark_uploaded_preserves_identity() {
        let queue = EvidenceQueue::open(open_memory().unwrap()).unwrap();
        let now = Utc::now();
        let id = queue.enqueue("bundle-2", "/p.json", "/p.sig", now).unwrap();
        queue.mark_uploaded("bundle-2", now).unwrap();

        let row = queue.get("bundle-2").unwrap().unwrap();
        assert_eq!(row.id, id);
        assert!(row.uploaded_at.is_some());

        let due = queue.due_for_retry(now).unwrap();
        assert!(due.is_empty(), "uploaded rows should not be due for retry");
    }

    #[test]
    fn due_for_retry_respects_backoff_window() {
        let queue = EvidenceQueue::open(open_memory().unwrap()).unwrap();
        let now = Utc::now();
        queue.enqueue("bundle-3", "/p.json", "/p.sig", now).unwrap();
        queue.mark_failed("bundle-3", "timeout", now).unwrap();

        assert!(queue.due_for_retry(now).unwrap().is_empty());
        let later = now + Duration::minutes(2);
        assert_eq!(queue.due_for_retry(later).unwrap().len(), 1);
    }
}
