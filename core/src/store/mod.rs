//! SQLite persistence layer.
//!
//! RULE: Only the store module talks to the database.
//! Extractor, loader, validator and auditor call store methods and
//! never execute SQL directly.
//!
//! Three physically separate databases:
//!   - source:    identifiable `members` / `loans` (read-only to the pipeline)
//!   - analytics: bucketed `members_clean` / `loans_clean`
//!   - link:      `member_link`, the only place member ids meet analytics ids

mod analytics;
mod link;
mod source;

pub use analytics::AnalyticsStore;
pub use link::LinkStore;
pub use source::SourceStore;

use crate::error::EtlResult;
use rusqlite::Connection;

/// Open (or create) a database at `path`. Accepts SQLite URIs, so
/// `file:name?mode=memory&cache=shared` gives a named in-memory database
/// that several connections can share.
fn open_connection(path: &str) -> EtlResult<Connection> {
    let conn = Connection::open_with_flags(
        path,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
            | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
            | rusqlite::OpenFlags::SQLITE_OPEN_URI,
    )?;
    // WAL mode only for real files (shared-memory and :memory: ignore it).
    let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

fn open_in_memory() -> EtlResult<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}
