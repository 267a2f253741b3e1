use super::{open_connection, open_in_memory};
use crate::{
    error::{EtlError, EtlResult},
    records::{CleanLoan, CleanMember},
    types::{LoanId, TableName},
};
use rusqlite::{params, types::ValueRef, Connection, OptionalExtension};

/// The analytics database. Holds nothing that identifies a member
/// without the link store.
pub struct AnalyticsStore {
    conn: Connection,
}

impl AnalyticsStore {
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
            .execute_batch(include_str!("../../../migrations/002_analytics.sql"))?;
        Ok(())
    }

    /// Empty both clean tables. Loans first: they reference members.
    pub fn clear(&self) -> EtlResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        self.conn.execute("DELETE FROM loans_clean", [])?;
        self.conn.execute("DELETE FROM members_clean", [])?;
        tx.commit()?;
        Ok(())
    }

    // ── Bulk writes ────────────────────────────────────────────

    /// Insert a batch in a single transaction. No upsert: a duplicate
    /// analytics id is an error.
    pub fn insert_members(&self, batch: &[CleanMember]) -> EtlResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = self.conn.prepare_cached(
                "INSERT INTO members_clean (
                    analytics_id, age_bracket, state, region, membership_year,
                    tenure_years, account_type, credit_tier
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            )?;
            for m in batch {
                stmt.execute(params![
                    m.analytics_id,
                    m.age_bracket.label(),
                    m.state,
                    m.region.label(),
                    m.membership_year,
                    m.tenure_years,
                    m.account_type.as_str(),
                    m.credit_tier.label(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(batch.len())
    }

    pub fn insert_loans(&self, batch: &[CleanLoan]) -> EtlResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = self.conn.prepare_cached(
                "INSERT INTO loans_clean (
                    loan_id, analytics_id, loan_type, principal_amount, interest_rate,
                    term_months, origination_year, status, monthly_payment, remaining_balance
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            )?;
            for l in batch {
                stmt.execute(params![
                    l.loan_id,
                    l.analytics_id,
                    l.loan_type.as_str(),
                    l.principal_amount,
                    l.interest_rate,
                    l.term_months,
                    l.origination_year,
                    l.status.as_str(),
                    l.monthly_payment,
                    l.remaining_balance,
                ])?;
            }
        }
        tx.commit()?;
        Ok(batch.len())
    }

    // ── Counts ─────────────────────────────────────────────────

    pub fn row_count(&self, table: TableName) -> EtlResult<i64> {
        Ok(self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", clean_table(table)?),
            [],
            |r| r.get(0),
        )?)
    }

    pub fn member_count(&self) -> EtlResult<i64> {
        self.row_count(TableName::MembersClean)
    }

    pub fn loan_count(&self) -> EtlResult<i64> {
        self.row_count(TableName::LoansClean)
    }

    /// Loans whose analytics id has no member row.
    pub fn orphan_loan_count(&self) -> EtlResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM loans_clean l
             LEFT JOIN members_clean m ON m.analytics_id = l.analytics_id
             WHERE m.analytics_id IS NULL",
            [],
            |r| r.get(0),
        )?)
    }

    // ── Structure ──────────────────────────────────────────────

    /// Column names of a clean table, in declaration order. Empty when the
    /// table does not exist.
    pub fn table_columns(&self, table: TableName) -> EtlResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", clean_table(table)?))?;
        let cols = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cols)
    }

    // ── Sampling ───────────────────────────────────────────────

    pub fn rowids(&self, table: TableName) -> EtlResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT rowid FROM {} ORDER BY rowid ASC",
            clean_table(table)?
        ))?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Every text-valued column of one row, as `(column, value)` pairs.
    /// Reads whatever columns the table actually has, not the expected set.
    pub fn text_fields(&self, table: TableName, rowid: i64) -> EtlResult<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT * FROM {} WHERE rowid = ?1",
            clean_table(table)?
        ))?;
        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let fields = stmt
            .query_row(params![rowid], |row| {
                let mut out = Vec::new();
                for (i, name) in names.iter().enumerate() {
                    if let ValueRef::Text(bytes) = row.get_ref(i)? {
                        out.push((name.clone(), String::from_utf8_lossy(bytes).into_owned()));
                    }
                }
                Ok(out)
            })
            .optional()?;
        Ok(fields.unwrap_or_default())
    }

    // ── Typed reads ────────────────────────────────────────────

    pub fn get_member(&self, analytics_id: &str) -> EtlResult<Option<CleanMember>> {
        let raw = self
            .conn
            .query_row(
                "SELECT analytics_id, age_bracket, state, region, membership_year,
                        tenure_years, account_type, credit_tier
                 FROM members_clean WHERE analytics_id = ?1",
                params![analytics_id],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, i32>(4)?,
                        r.get::<_, i32>(5)?,
                        r.get::<_, String>(6)?,
                        r.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, age, state, region, year, tenure, account, tier)) = raw else {
            return Ok(None);
        };
        let bad = |reason: String| anyhow::anyhow!("members_clean row {id}: {reason}");
        Ok(Some(CleanMember {
            age_bracket: age.parse().map_err(bad)?,
            region: region.parse().map_err(bad)?,
            account_type: account.parse().map_err(bad)?,
            credit_tier: tier.parse().map_err(bad)?,
            analytics_id: id,
            state,
            membership_year: year,
            tenure_years: tenure,
        }))
    }

    pub fn get_loan(&self, loan_id: LoanId) -> EtlResult<Option<CleanLoan>> {
        let raw = self
            .conn
            .query_row(
                "SELECT loan_id, analytics_id, loan_type, principal_amount, interest_rate,
                        term_months, origination_year, status, monthly_payment, remaining_balance
                 FROM loans_clean WHERE loan_id = ?1",
                params![loan_id],
                |r| {
                    Ok((
                        r.get::<_, i64>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, f64>(3)?,
                        r.get::<_, f64>(4)?,
                        r.get::<_, i64>(5)?,
                        r.get::<_, i32>(6)?,
                        r.get::<_, String>(7)?,
                        r.get::<_, f64>(8)?,
                        r.get::<_, f64>(9)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, aid, kind, principal, rate, term, year, status, payment, balance)) = raw
        else {
            return Ok(None);
        };
        let bad = |reason: String| anyhow::anyhow!("loans_clean row {id}: {reason}");
        Ok(Some(CleanLoan {
            loan_id: id,
            analytics_id: aid,
            loan_type: kind.parse().map_err(bad)?,
            principal_amount: principal,
            interest_rate: rate,
            term_months: term,
            origination_year: year,
            status: status.parse().map_err(bad)?,
            monthly_payment: payment,
            remaining_balance: balance,
        }))
    }

    pub fn analytics_ids(&self) -> EtlResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT analytics_id FROM members_clean ORDER BY analytics_id ASC")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}

/// Table names are interpolated into SQL, so only the two clean tables
/// are accepted.
fn clean_table(table: TableName) -> EtlResult<&'static str> {
    match table {
        TableName::MembersClean | TableName::LoansClean => Ok(table.as_str()),
        other => Err(EtlError::InvalidConfig(format!(
            "{other} is not an analytics table"
        ))),
    }
}
