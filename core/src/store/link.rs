use super::{open_connection, open_in_memory};
use crate::{
    error::EtlResult,
    identity::IdentityMap,
    types::{AnalyticsId, MemberId},
};
use rusqlite::{params, Connection, OptionalExtension};

/// The isolated member-link database.
///
/// RULE: Nothing downstream of the pipeline opens this store.
pub struct LinkStore {
    conn: Connection,
}

impl LinkStore {
    pub fn open(path: &str) -> EtlResult<Self> {
        Ok(Self {
            conn: open_connection(path)?,
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> EtlResult<Self> {
        Ok(Self {
            conn: open_in_memory()?,
        })
    }

    pub fn migrate(&self) -> EtlResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/003_member_link.sql"))?;
        Ok(())
    }

    /// Drop every existing link and write `map` in its place, atomically.
    /// Returns the number of links written.
    pub fn replace_all(&self, map: &IdentityMap) -> EtlResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        self.conn.execute("DELETE FROM member_link", [])?;
        {
            let mut stmt = self.conn.prepare_cached(
                "INSERT INTO member_link (member_id, analytics_id) VALUES (?1, ?2)",
            )?;
            for (member_id, analytics_id) in map.iter() {
                stmt.execute(params![member_id, analytics_id])?;
            }
        }
        tx.commit()?;
        Ok(map.len())
    }

    pub fn link_count(&self) -> EtlResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM member_link", [], |r| r.get(0))?)
    }

    pub fn analytics_id_for(&self, member_id: MemberId) -> EtlResult<Option<AnalyticsId>> {
        Ok(self
            .conn
            .query_row(
                "SELECT analytics_id FROM member_link WHERE member_id = ?1",
                params![member_id],
                |r| r.get(0),
            )
            .optional()?)
    }

    pub fn member_id_for(&self, analytics_id: &str) -> EtlResult<Option<MemberId>> {
        Ok(self
            .conn
            .query_row(
                "SELECT member_id FROM member_link WHERE analytics_id = ?1",
                params![analytics_id],
                |r| r.get(0),
            )
            .optional()?)
    }

    pub fn links(&self) -> EtlResult<Vec<(MemberId, AnalyticsId)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT member_id, analytics_id FROM member_link ORDER BY member_id ASC")?;
        let rows = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
