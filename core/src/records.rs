//! Typed rows for the source and analytics tables.
//!
//! Raw rows carry identity attributes and never leave the coordinating
//! thread except as read-only input to the transform workers. Clean rows
//! are what the analytics store holds.

use crate::{
    bucketing::{AgeBracket, CreditTier, Region},
    types::{AnalyticsId, LoanId, MemberId},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

// ── Source rows ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMember {
    pub member_id: MemberId,
    pub first_name: String,
    pub last_name: String,
    pub ssn: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: String, // YYYY-MM-DD
    pub address_line1: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub membership_date: String, // YYYY-MM-DD
    pub account_type: String,
    pub credit_score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLoan {
    pub loan_id: LoanId,
    pub member_id: MemberId,
    pub loan_type: String,
    pub principal_amount: f64,
    pub interest_rate: f64,
    pub term_months: i64,
    pub origination_date: String, // YYYY-MM-DD
    pub status: String,
    pub monthly_payment: f64,
    pub remaining_balance: f64,
}

// ── Analytics rows ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanMember {
    pub analytics_id: AnalyticsId,
    pub age_bracket: AgeBracket,
    pub state: String,
    pub region: Region,
    pub membership_year: i32,
    pub tenure_years: i32,
    pub account_type: AccountType,
    pub credit_tier: CreditTier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanLoan {
    pub loan_id: LoanId,
    pub analytics_id: AnalyticsId,
    pub loan_type: LoanType,
    pub principal_amount: f64,
    pub interest_rate: f64,
    pub term_months: i64,
    pub origination_year: i32,
    pub status: LoanStatus,
    pub monthly_payment: f64,
    pub remaining_balance: f64,
}

// ── Domain codes ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Checking,
    Savings,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanType {
    Auto,
    Mortgage,
    Personal,
    CreditCard,
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    PaidOff,
    Defaulted,
    Delinquent,
}

impl AccountType {
    pub const ALL: [AccountType; 3] = [Self::Checking, Self::Savings, Self::Both];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Savings => "savings",
            Self::Both => "both",
        }
    }
}

impl LoanType {
    pub const ALL: [LoanType; 5] = [
        Self::Auto,
        Self::Mortgage,
        Self::Personal,
        Self::CreditCard,
        Self::Student,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Mortgage => "mortgage",
            Self::Personal => "personal",
            Self::CreditCard => "credit_card",
            Self::Student => "student",
        }
    }
}

impl LoanStatus {
    pub const ALL: [LoanStatus; 4] = [
        Self::Active,
        Self::PaidOff,
        Self::Defaulted,
        Self::Delinquent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::PaidOff => "paid_off",
            Self::Defaulted => "defaulted",
            Self::Delinquent => "delinquent",
        }
    }
}

macro_rules! code_from_str {
    ($ty:ty, $what:literal) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty>::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| format!("unknown {}: '{s}'", $what))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

code_from_str!(AccountType, "account type");
code_from_str!(LoanType, "loan type");
code_from_str!(LoanStatus, "loan status");
