//! Schema-level leak check for the analytics store.
//!
//! Compares the columns each clean table actually has against a fixed
//! allow-list. Content is never inspected here; see `auditor` for that.

use crate::{error::EtlResult, store::AnalyticsStore, types::TableName};
use serde::{Deserialize, Serialize};

pub const MEMBERS_CLEAN_COLUMNS: &[&str] = &[
    "analytics_id",
    "age_bracket",
    "state",
    "region",
    "membership_year",
    "tenure_years",
    "account_type",
    "credit_tier",
];

pub const LOANS_CLEAN_COLUMNS: &[&str] = &[
    "loan_id",
    "analytics_id",
    "loan_type",
    "principal_amount",
    "interest_rate",
    "term_months",
    "origination_year",
    "status",
    "monthly_payment",
    "remaining_balance",
];

/// Source columns that identify a member on their own. Any of these in
/// the analytics store is a critical leak.
pub const RAW_IDENTIFIER_COLUMNS: &[&str] = &[
    "member_id",
    "first_name",
    "last_name",
    "ssn",
    "email",
    "phone",
    "date_of_birth",
    "address_line1",
    "zip_code",
    "membership_date",
    "origination_date",
];

pub const CLEAN_TABLES: [TableName; 2] = [TableName::MembersClean, TableName::LoansClean];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Structural,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaIssue {
    UnexpectedColumn,
    RawIdentifierColumn,
    MissingColumn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaFinding {
    pub table: TableName,
    pub column: String,
    pub issue: SchemaIssue,
    pub severity: Severity,
}

impl SchemaFinding {
    pub fn message(&self) -> String {
        match self.issue {
            SchemaIssue::UnexpectedColumn => {
                format!("Unexpected column {} in {}", self.column, self.table)
            }
            SchemaIssue::RawIdentifierColumn => format!(
                "CRITICAL: {} found in {}; raw identifiers must not reach the analytics store",
                self.column, self.table
            ),
            SchemaIssue::MissingColumn => {
                format!("Expected column {} missing from {}", self.column, self.table)
            }
        }
    }
}

pub fn allowed_columns(table: TableName) -> &'static [&'static str] {
    match table {
        TableName::MembersClean => MEMBERS_CLEAN_COLUMNS,
        TableName::LoansClean => LOANS_CLEAN_COLUMNS,
        TableName::Members | TableName::Loans => &[],
    }
}

/// Compare one table's actual columns with its allow-list.
pub fn check_columns(table: TableName, actual: &[String]) -> Vec<SchemaFinding> {
    let allowed = allowed_columns(table);
    let mut findings = Vec::new();

    for col in actual {
        let name = col.as_str();
        if RAW_IDENTIFIER_COLUMNS.contains(&name) {
            findings.push(SchemaFinding {
                table,
                column: col.clone(),
                issue: SchemaIssue::RawIdentifierColumn,
                severity: Severity::Critical,
            });
        } else if !allowed.contains(&name) {
            findings.push(SchemaFinding {
                table,
                column: col.clone(),
                issue: SchemaIssue::UnexpectedColumn,
                severity: Severity::Structural,
            });
        }
    }

    for expected in allowed {
        if !actual.iter().any(|c| c == expected) {
            findings.push(SchemaFinding {
                table,
                column: expected.to_string(),
                issue: SchemaIssue::MissingColumn,
                severity: Severity::Structural,
            });
        }
    }
    findings
}

pub struct SchemaValidator<'a> {
    store: &'a AnalyticsStore,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(store: &'a AnalyticsStore) -> Self {
        Self { store }
    }

    /// Check both clean tables. Findings are returned, never raised; only
    /// a store failure is an error.
    pub fn validate(&self) -> EtlResult<Vec<SchemaFinding>> {
        let mut findings = Vec::new();
        for table in CLEAN_TABLES {
            let columns = self.store.table_columns(table)?;
            findings.extend(check_columns(table, &columns));
        }
        for f in &findings {
            match f.severity {
                Severity::Critical => log::error!("schema: {}", f.message()),
                Severity::Structural => log::warn!("schema: {}", f.message()),
            }
        }
        Ok(findings)
    }
}
