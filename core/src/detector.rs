//! PII detection seam.
//!
//! The auditor depends only on the `PiiDetector` trait. Any entity
//! recognizer can sit behind it; `PatternDetector` covers identifiers with
//! a fixed textual shape and needs no external service.

use crate::error::EtlResult;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One entity recognized in a piece of text. `start`/`end` are byte
/// offsets into the scanned string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub entity_type: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
    pub matched_text: String,
}

/// Classifier consumed by the sampling auditor.
pub trait PiiDetector: Send {
    /// Entities found in `text`. An empty string yields no entities.
    fn detect(&self, text: &str) -> EtlResult<Vec<EntitySpan>>;
}

// ── Pattern detector ─────────────────────────────────────────────────────────

struct Pattern {
    entity_type: &'static str,
    confidence: f64,
    regex: Regex,
}

/// Regex-based detector for structurally recognizable identifiers.
///
/// Entity type names follow the common NER vocabulary (`US_SSN`,
/// `EMAIL_ADDRESS`, `PHONE_NUMBER`, `DATE_TIME`, `CREDIT_CARD`) so the
/// auditor's allow-lists work unchanged with a full NLP service.
pub struct PatternDetector {
    patterns: Vec<Pattern>,
}

impl PatternDetector {
    pub fn new() -> Self {
        let table: [(&'static str, f64, &str); 5] = [
            ("US_SSN", 0.85, r"\b\d{3}-\d{2}-\d{4}\b"),
            (
                "EMAIL_ADDRESS",
                1.0,
                r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            ),
            (
                "PHONE_NUMBER",
                0.75,
                r"(?:\+1[-. ]?)?\(?\b\d{3}\)?[-. ]\d{3}[-. ]\d{4}\b",
            ),
            ("DATE_TIME", 0.6, r"\b\d{4}-\d{2}-\d{2}\b"),
            ("CREDIT_CARD", 0.5, r"\b(?:\d[ -]?){13,16}\b"),
        ];
        let patterns = table
            .into_iter()
            .map(|(entity_type, confidence, re)| Pattern {
                entity_type,
                confidence,
                // Literal patterns above; a failure here is a programming error.
                regex: Regex::new(re).unwrap_or_else(|e| panic!("bad {entity_type} pattern: {e}")),
            })
            .collect();
        Self { patterns }
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PiiDetector for PatternDetector {
    fn detect(&self, text: &str) -> EtlResult<Vec<EntitySpan>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let mut spans = Vec::new();
        for p in &self.patterns {
            for m in p.regex.find_iter(text) {
                spans.push(EntitySpan {
                    entity_type: p.entity_type.to_string(),
                    start: m.start(),
                    end: m.end(),
                    confidence: p.confidence,
                    matched_text: m.as_str().to_string(),
                });
            }
        }
        Ok(spans)
    }
}
