//! Shared primitive types used across the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary key of a member in the source store.
pub type MemberId = i64;

/// Primary key of a loan. Carried unchanged into the analytics store.
pub type LoanId = i64;

/// Opaque stand-in for a member in the analytics store.
pub type AnalyticsId = String;

/// The tables the pipeline reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    Members,
    Loans,
    MembersClean,
    LoansClean,
}

impl TableName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Members => "members",
            Self::Loans => "loans",
            Self::MembersClean => "members_clean",
            Self::LoansClean => "loans_clean",
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
