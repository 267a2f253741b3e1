use super::{open_connection, open_in_memory};
use crate::{
    error::EtlResult,
    records::{RawLoan, RawMember},
    types::{LoanId, MemberId},
};
use rusqlite::{params, Connection, Row};

/// The identifiable source database.
pub struct SourceStore {
    conn: Connection,
}

impl SourceStore {
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
            .execute_batch(include_str!("../../../migrations/001_source.sql"))?;
        Ok(())
    }

    // ── Members ────────────────────────────────────────────────

    pub fn insert_member(&self, m: &RawMember) -> EtlResult<()> {
        self.conn.execute(
            "INSERT INTO members (
                member_id, first_name, last_name, ssn, email, phone, date_of_birth,
                address_line1, city, state, zip_code, membership_date, account_type,
                credit_score
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)",
            params![
                m.member_id,
                m.first_name,
                m.last_name,
                m.ssn,
                m.email,
                m.phone,
                m.date_of_birth,
                m.address_line1,
                m.city,
                m.state,
                m.zip_code,
                m.membership_date,
                m.account_type,
                m.credit_score,
            ],
        )?;
        Ok(())
    }

    /// Every member id, ascending.
    pub fn member_ids(&self) -> EtlResult<Vec<MemberId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT member_id FROM members ORDER BY member_id ASC")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn member_count(&self) -> EtlResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM members", [], |r| r.get(0))?)
    }

    /// Up to `limit` members with `member_id > after`, ascending.
    pub fn members_after(&self, after: MemberId, limit: usize) -> EtlResult<Vec<RawMember>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT member_id, first_name, last_name, ssn, email, phone, date_of_birth,
                    address_line1, city, state, zip_code, membership_date, account_type,
                    credit_score
             FROM members WHERE member_id > ?1
             ORDER BY member_id ASC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![after, limit as i64], member_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Loans ──────────────────────────────────────────────────

    pub fn insert_loan(&self, l: &RawLoan) -> EtlResult<()> {
        self.conn.execute(
            "INSERT INTO loans (
                loan_id, member_id, loan_type, principal_amount, interest_rate,
                term_months, origination_date, status, monthly_payment, remaining_balance
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                l.loan_id,
                l.member_id,
                l.loan_type,
                l.principal_amount,
                l.interest_rate,
                l.term_months,
                l.origination_date,
                l.status,
                l.monthly_payment,
                l.remaining_balance,
            ],
        )?;
        Ok(())
    }

    pub fn loan_count(&self) -> EtlResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM loans", [], |r| r.get(0))?)
    }

    /// Up to `limit` loans with `loan_id > after`, ascending.
    pub fn loans_after(&self, after: LoanId, limit: usize) -> EtlResult<Vec<RawLoan>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT loan_id, member_id, loan_type, principal_amount, interest_rate,
                    term_months, origination_date, status, monthly_payment, remaining_balance
             FROM loans WHERE loan_id > ?1
             ORDER BY loan_id ASC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![after, limit as i64], loan_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Insert many members in one transaction (test and fixture helper).
    pub fn insert_members(&self, members: &[RawMember]) -> EtlResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for m in members {
            self.insert_member(m)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Insert many loans in one transaction (test and fixture helper).
    pub fn insert_loans(&self, loans: &[RawLoan]) -> EtlResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for l in loans {
            self.insert_loan(l)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn member_from_row(r: &Row<'_>) -> rusqlite::Result<RawMember> {
    Ok(RawMember {
        member_id: r.get(0)?,
        first_name: r.get(1)?,
        last_name: r.get(2)?,
        ssn: r.get(3)?,
        email: r.get(4)?,
        phone: r.get(5)?,
        date_of_birth: r.get(6)?,
        address_line1: r.get(7)?,
        city: r.get(8)?,
        state: r.get(9)?,
        zip_code: r.get(10)?,
        membership_date: r.get(11)?,
        account_type: r.get(12)?,
        credit_score: r.get(13)?,
    })
}

fn loan_from_row(r: &Row<'_>) -> rusqlite::Result<RawLoan> {
    Ok(RawLoan {
        loan_id: r.get(0)?,
        member_id: r.get(1)?,
        loan_type: r.get(2)?,
        principal_amount: r.get(3)?,
        interest_rate: r.get(4)?,
        term_months: r.get(5)?,
        origination_date: r.get(6)?,
        status: r.get(7)?,
        monthly_payment: r.get(8)?,
        remaining_balance: r.get(9)?,
    })
}
