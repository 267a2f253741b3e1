//! Bucketing rules: lossy, deterministic mappings from precise member
//! attributes to coarse categories.
//!
//! RULE: Nothing in this module performs I/O or reads the clock.
//! The reference year is always passed in by the caller, so every
//! function is reproducible in isolation.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

// ── Age bracket ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeBracket {
    From18To25,
    From26To35,
    From36To45,
    From46To55,
    From56To65,
    Over65,
}

impl AgeBracket {
    pub const ALL: [AgeBracket; 6] = [
        Self::From18To25,
        Self::From26To35,
        Self::From36To45,
        Self::From46To55,
        Self::From56To65,
        Self::Over65,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::From18To25 => "18-25",
            Self::From26To35 => "26-35",
            Self::From36To45 => "36-45",
            Self::From46To55 => "46-55",
            Self::From56To65 => "56-65",
            Self::Over65 => "65+",
        }
    }
}

/// Bracket for a member born in `birth_year`, as of `reference_year`.
///
/// Calendar-year arithmetic only: a member born in December counts as a
/// full year older on January 1st. Anyone younger than 26 lands in the
/// youngest band.
pub fn age_bracket(birth_year: i32, reference_year: i32) -> AgeBracket {
    let age = reference_year - birth_year;
    match age {
        a if a < 26 => AgeBracket::From18To25,
        a if a < 36 => AgeBracket::From26To35,
        a if a < 46 => AgeBracket::From36To45,
        a if a < 56 => AgeBracket::From46To55,
        a if a < 66 => AgeBracket::From56To65,
        _ => AgeBracket::Over65,
    }
}

// ── Credit tier ──────────────────────────────────────────────────────────────

/// Loan-approval tier. Tier 1 is the best credit, Tier 5 the worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreditTier {
    Tier1,
    Tier2,
    Tier3,
    Tier4,
    Tier5,
}

impl CreditTier {
    pub const ALL: [CreditTier; 5] = [
        Self::Tier1,
        Self::Tier2,
        Self::Tier3,
        Self::Tier4,
        Self::Tier5,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Tier1 => "Tier 1",
            Self::Tier2 => "Tier 2",
            Self::Tier3 => "Tier 3",
            Self::Tier4 => "Tier 4",
            Self::Tier5 => "Tier 5",
        }
    }
}

/// Tier boundaries are inclusive on the upper edge.
pub fn credit_tier(score: i64) -> CreditTier {
    match score {
        s if s <= 450 => CreditTier::Tier5, // highest risk, limited products
        s if s <= 580 => CreditTier::Tier4, // subprime
        s if s <= 670 => CreditTier::Tier3, // near-prime
        s if s <= 740 => CreditTier::Tier2, // prime
        _ => CreditTier::Tier1,
    }
}

// ── Census region ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    Northeast,
    Midwest,
    South,
    West,
    Unknown,
}

impl Region {
    pub const ALL: [Region; 5] = [
        Self::Northeast,
        Self::Midwest,
        Self::South,
        Self::West,
        Self::Unknown,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Northeast => "Northeast",
            Self::Midwest => "Midwest",
            Self::South => "South",
            Self::West => "West",
            Self::Unknown => "Unknown",
        }
    }
}

/// US census region for a two-letter state code. Unmapped codes
/// (territories, typos, lower-case input) yield `Region::Unknown`.
pub fn region_for_state(state: &str) -> Region {
    match state {
        "CT" | "ME" | "MA" | "NH" | "RI" | "VT" | "NJ" | "NY" | "PA" => Region::Northeast,

        "IL" | "IN" | "MI" | "OH" | "WI" | "IA" | "KS" | "MN" | "MO" | "NE" | "ND" | "SD" => {
            Region::Midwest
        }

        "DE" | "DC" | "FL" | "GA" | "MD" | "NC" | "SC" | "VA" | "WV" | "AL" | "KY" | "MS"
        | "TN" | "AR" | "LA" | "OK" | "TX" => Region::South,

        "AZ" | "CO" | "ID" | "MT" | "NV" | "NM" | "UT" | "WY" | "AK" | "CA" | "HI" | "OR"
        | "WA" => Region::West,

        _ => Region::Unknown,
    }
}

// ── Dates ────────────────────────────────────────────────────────────────────

/// Whole years of membership as of `reference_year`.
pub fn tenure_years(membership_year: i32, reference_year: i32) -> i32 {
    reference_year - membership_year
}

/// Year component of an ISO `YYYY-MM-DD` date.
pub fn year_of(iso_date: &str) -> Result<i32, chrono::ParseError> {
    NaiveDate::parse_from_str(iso_date.trim(), "%Y-%m-%d").map(|d| d.year())
}

// ── Label parsing ────────────────────────────────────────────────────────────
// Buckets are stored as their labels; reading them back goes through FromStr.

macro_rules! label_from_str {
    ($ty:ty, $what:literal) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty>::ALL
                    .iter()
                    .copied()
                    .find(|v| v.label() == s)
                    .ok_or_else(|| format!("unknown {}: '{s}'", $what))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

label_from_str!(AgeBracket, "age bracket");
label_from_str!(CreditTier, "credit tier");
label_from_str!(Region, "region");
