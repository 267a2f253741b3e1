//! Sampling auditor: content-level PII check on a random subset of the
//! clean tables.
//!
//! RULE: The auditor reads only. It reports findings; whether a finding
//! is fatal is the caller's decision.

use crate::{
    detector::PiiDetector,
    error::EtlResult,
    rng::SeededRng,
    schema_validator::CLEAN_TABLES,
    store::AnalyticsStore,
    types::TableName,
};
use serde::{Deserialize, Serialize};

/// A detector hit that is not an expected false positive for its field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiFinding {
    pub table: TableName,
    pub field: String,
    pub entity_type: String,
    pub matched_text: String,
    pub confidence: f64,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub findings: Vec<PiiFinding>,
    /// Rows examined across all tables.
    pub sample_size: usize,
}

/// Entity types a detector is expected to report for a field's legitimate
/// values (a state code looks like a LOCATION, an age band like a
/// DATE_TIME). Unknown fields have no allowances.
pub fn expected_entities(field: &str) -> &'static [&'static str] {
    match field {
        "analytics_id" => &["DATE_TIME", "PERSON", "LOCATION", "MEDICAL_LICENSE"],
        "state" | "region" => &["LOCATION"],
        "age_bracket" | "credit_tier" => &["DATE_TIME"],
        _ => &[],
    }
}

/// Rows to sample from a table of `rows` rows: the floor of
/// `rows * fraction`, so tiny tables may get none.
pub fn sample_size(rows: usize, fraction: f64) -> usize {
    ((rows as f64 * fraction).floor() as usize).min(rows)
}

pub struct SamplingAuditor<'a> {
    store: &'a AnalyticsStore,
    detector: &'a dyn PiiDetector,
    sample_fraction: f64,
}

impl<'a> SamplingAuditor<'a> {
    pub fn new(
        store: &'a AnalyticsStore,
        detector: &'a dyn PiiDetector,
        sample_fraction: f64,
    ) -> Self {
        Self {
            store,
            detector,
            sample_fraction,
        }
    }

    pub fn audit(&self, rng: &mut SeededRng) -> EtlResult<AuditReport> {
        let mut report = AuditReport::default();
        for table in CLEAN_TABLES {
            self.audit_table(table, rng, &mut report)?;
        }
        if !report.findings.is_empty() {
            log::warn!(
                "audit: {} PII findings in {} sampled rows",
                report.findings.len(),
                report.sample_size
            );
        }
        Ok(report)
    }

    fn audit_table(
        &self,
        table: TableName,
        rng: &mut SeededRng,
        report: &mut AuditReport,
    ) -> EtlResult<()> {
        let rowids = self.store.rowids(table)?;
        let n = sample_size(rowids.len(), self.sample_fraction);
        log::debug!("audit {table}: sampling {n} of {} rows", rowids.len());

        for idx in rng.pick_indices(rowids.len(), n) {
            let fields = self.store.text_fields(table, rowids[idx])?;
            report.sample_size += 1;
            for (field, value) in fields {
                self.scan_field(table, &field, &value, &mut report.findings)?;
            }
        }
        Ok(())
    }

    /// Scan one value and keep the hits that are not expected for `field`.
    pub fn scan_field(
        &self,
        table: TableName,
        field: &str,
        value: &str,
        out: &mut Vec<PiiFinding>,
    ) -> EtlResult<()> {
        let expected = expected_entities(field);
        for span in self.detector.detect(value)? {
            if expected.contains(&span.entity_type.as_str()) {
                continue;
            }
            out.push(PiiFinding {
                table,
                field: field.to_string(),
                entity_type: span.entity_type,
                matched_text: span.matched_text,
                confidence: span.confidence,
                start: span.start,
                end: span.end,
            });
        }
        Ok(())
    }
}
