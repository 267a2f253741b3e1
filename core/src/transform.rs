//! Parallel transform: raw rows in, clean rows out.
//!
//! RULES:
//!   - Workers see plain data only: a slice of raw rows, the read-only
//!     identity map, and the reference year.
//!   - Workers never touch a store. Extraction and loading stay on the
//!     coordinating thread.
//!   - Any row that cannot be transformed fails the whole batch.

use crate::{
    bucketing::{age_bracket, credit_tier, region_for_state, tenure_years, year_of},
    error::{EtlError, EtlResult},
    identity::IdentityMap,
    records::{AccountType, CleanLoan, CleanMember, LoanStatus, LoanType, RawLoan, RawMember},
    types::TableName,
};
use rayon::prelude::*;

/// Read-only inputs shared by every worker for one run.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    pub identities: &'a IdentityMap,
    pub reference_year: i32,
}

/// A raw row type that can be turned into its clean counterpart.
pub trait Transform: Sync {
    type Clean: Send;

    fn transform(&self, ctx: &TransformContext<'_>) -> EtlResult<Self::Clean>;
}

impl Transform for RawMember {
    type Clean = CleanMember;

    fn transform(&self, ctx: &TransformContext<'_>) -> EtlResult<CleanMember> {
        let table = TableName::Members;
        let analytics_id = ctx
            .identities
            .analytics_id(self.member_id)
            .ok_or(EtlError::UnmappedMember {
                member_id: self.member_id,
            })?;
        let birth_year = year_of(&self.date_of_birth).map_err(|e| {
            EtlError::malformed(
                table,
                self.member_id,
                format!("date_of_birth '{}': {e}", self.date_of_birth),
            )
        })?;
        let membership_year = year_of(&self.membership_date).map_err(|e| {
            EtlError::malformed(
                table,
                self.member_id,
                format!("membership_date '{}': {e}", self.membership_date),
            )
        })?;
        let account_type = self
            .account_type
            .parse::<AccountType>()
            .map_err(|reason: String| EtlError::malformed(table, self.member_id, reason))?;

        Ok(CleanMember {
            analytics_id: analytics_id.to_string(),
            age_bracket: age_bracket(birth_year, ctx.reference_year),
            state: self.state.clone(),
            region: region_for_state(&self.state),
            membership_year,
            tenure_years: tenure_years(membership_year, ctx.reference_year),
            account_type,
            credit_tier: credit_tier(self.credit_score),
        })
    }
}

impl Transform for RawLoan {
    type Clean = CleanLoan;

    fn transform(&self, ctx: &TransformContext<'_>) -> EtlResult<CleanLoan> {
        let table = TableName::Loans;
        let analytics_id = ctx
            .identities
            .analytics_id(self.member_id)
            .ok_or(EtlError::UnmappedMember {
                member_id: self.member_id,
            })?;
        let origination_year = year_of(&self.origination_date).map_err(|e| {
            EtlError::malformed(
                table,
                self.loan_id,
                format!("origination_date '{}': {e}", self.origination_date),
            )
        })?;
        let loan_type = self
            .loan_type
            .parse::<LoanType>()
            .map_err(|reason: String| EtlError::malformed(table, self.loan_id, reason))?;
        let status = self
            .status
            .parse::<LoanStatus>()
            .map_err(|reason: String| EtlError::malformed(table, self.loan_id, reason))?;

        Ok(CleanLoan {
            loan_id: self.loan_id,
            analytics_id: analytics_id.to_string(),
            loan_type,
            principal_amount: self.principal_amount,
            interest_rate: self.interest_rate,
            term_months: self.term_months,
            origination_year,
            status,
            monthly_payment: self.monthly_payment,
            remaining_balance: self.remaining_balance,
        })
    }
}

/// Transform every row of one chunk, stopping at the first bad row.
pub fn transform_chunk<R: Transform>(
    rows: &[R],
    ctx: &TransformContext<'_>,
) -> EtlResult<Vec<R::Clean>> {
    rows.iter().map(|row| row.transform(ctx)).collect()
}

/// Split `len` rows into at most `workers` contiguous chunks of nearly
/// equal size. Returns the chunk length (at least 1).
pub fn chunk_len(len: usize, workers: usize) -> usize {
    len.div_ceil(workers.max(1)).max(1)
}

// ── Worker pool ──────────────────────────────────────────────────────────────

/// Fixed-size pool of transform workers for one run.
pub struct TransformPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl TransformPool {
    pub fn new(workers: usize) -> EtlResult<Self> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("etl-transform-{i}"))
            .build()?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Transform one batch. The batch is cut into `workers` chunks, each
    /// chunk runs on its own worker, and the results are concatenated in
    /// chunk order.
    pub fn transform_batch<R: Transform>(
        &self,
        batch: &[R],
        ctx: &TransformContext<'_>,
    ) -> EtlResult<Vec<R::Clean>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let size = chunk_len(batch.len(), self.workers);
        let chunk_results: Vec<Vec<R::Clean>> = self.pool.install(|| {
            batch
                .par_chunks(size)
                .map(|chunk| transform_chunk(chunk, ctx))
                .collect::<EtlResult<Vec<_>>>()
        })?;
        Ok(chunk_results.into_iter().flatten().collect())
    }
}
