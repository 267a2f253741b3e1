//! anonymizer-core: batch ETL that moves member and loan records from an
//! identifiable source store into an analytics store keyed by opaque ids.

pub mod auditor;
pub mod bucketing;
pub mod config;
pub mod detector;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod loader;
pub mod pipeline;
pub mod records;
pub mod rng;
pub mod run_control;
pub mod schema_validator;
pub mod store;
pub mod transform;
pub mod types;
