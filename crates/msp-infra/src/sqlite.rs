//! SQLite connection helpers shared by the offline queue, flap-suppression
//! table, and order-nonce ledger (spec §5: "SQLite WAL, single appliance
//! process writer, multiple readers allowed").

use std::path::Path;

use rusqlite::{Connection, OpenFlags};

/// Opens `path` with WAL journaling and a busy timeout, creating the file
/// (and its parent directory) if absent.
pub fn open_wal(path: &Path) -> rusqlite::Result<Connection> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(conn)
}

/// In-memory connection for tests; still WAL-equivalent semantics are
/// irrelevant for `:memory:` but pragmas are harmless to set.
pub fn open_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(conn)
}
