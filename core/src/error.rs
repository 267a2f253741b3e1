use thiserror::Error;

use crate::types::{MemberId, TableName};

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Malformed row in {table} (id {row_id}): {reason}")]
    MalformedRow {
        table: TableName,
        row_id: i64,
        reason: String,
    },

    #[error("Member {member_id} has no analytics id in the identity map")]
    UnmappedMember { member_id: MemberId },

    #[error("PII detector failed: {0}")]
    Detector(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EtlError {
    pub fn malformed(table: TableName, row_id: i64, reason: impl Into<String>) -> Self {
        Self::MalformedRow {
            table,
            row_id,
            reason: reason.into(),
        }
    }
}

pub type EtlResult<T> = Result<T, EtlError>;
