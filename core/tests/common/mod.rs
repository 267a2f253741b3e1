//! Shared fixtures: deterministic source populations and ready-to-run
//! pipelines over in-memory stores.

#![allow(dead_code)]

use anonymizer_core::{
    config::{EtlConfig, RunOptions},
    detector::{EntitySpan, PiiDetector},
    error::EtlResult,
    pipeline::EtlPipeline,
    records::{RawLoan, RawMember},
    rng::SeededRng,
    store::{AnalyticsStore, LinkStore, SourceStore},
};
use rusqlite::{Connection, OpenFlags};

/// Matches `EtlConfig::default_test().reference_year`.
pub const REFERENCE_YEAR: i32 = 2026;

const STATES: [&str; 10] = ["CA", "NY", "TX", "IL", "WA", "FL", "OH", "MA", "CO", "GA"];
const ACCOUNT_TYPES: [&str; 3] = ["checking", "savings", "both"];
const LOAN_TYPES: [&str; 5] = ["auto", "mortgage", "personal", "credit_card", "student"];
const STATUSES: [&str; 4] = ["active", "paid_off", "defaulted", "delinquent"];

fn pick<'a>(rng: &mut SeededRng, items: &[&'a str]) -> &'a str {
    items[rng.next_u64_below(items.len() as u64) as usize]
}

pub fn member(member_id: i64, date_of_birth: &str, state: &str, credit_score: i64) -> RawMember {
    RawMember {
        member_id,
        first_name: format!("First{member_id}"),
        last_name: format!("Last{member_id}"),
        ssn: format!("{:03}-{:02}-{:04}", 100 + member_id % 800, 10 + member_id % 89, 1000 + member_id),
        email: format!("member{member_id}@example.com"),
        phone: format!("(555) 010-{:04}", member_id % 10_000),
        date_of_birth: date_of_birth.to_string(),
        address_line1: format!("{} Main St", 100 + member_id),
        city: "Springfield".into(),
        state: state.to_string(),
        zip_code: format!("{:05}", 10_000 + member_id),
        membership_date: "2015-06-01".into(),
        account_type: "checking".into(),
        credit_score,
    }
}

pub fn loan(loan_id: i64, member_id: i64) -> RawLoan {
    RawLoan {
        loan_id,
        member_id,
        loan_type: "auto".into(),
        principal_amount: 25_000.0,
        interest_rate: 0.059,
        term_months: 60,
        origination_date: "2022-03-15".into(),
        status: "active".into(),
        monthly_payment: 482.41,
        remaining_balance: 18_250.0,
    }
}

/// `members` random members with ids 1..=members and 0-3 loans each.
pub fn population(members: i64, seed: u64) -> (Vec<RawMember>, Vec<RawLoan>) {
    let mut rng = SeededRng::new(seed);
    let mut ms = Vec::new();
    let mut ls = Vec::new();
    let mut next_loan = 1;

    for id in 1..=members {
        let year = 1945 + rng.next_u64_below(60) as i64;
        let dob = format!("{year}-{:02}-{:02}", 1 + rng.next_u64_below(12), 1 + rng.next_u64_below(28));
        let score = 300 + rng.next_u64_below(551) as i64;
        let mut m = member(id, &dob, pick(&mut rng, &STATES), score);
        m.account_type = pick(&mut rng, &ACCOUNT_TYPES).to_string();
        m.membership_date = format!("{}-01-15", 2000 + rng.next_u64_below(26));
        ms.push(m);

        for _ in 0..rng.next_u64_below(4) {
            let mut l = loan(next_loan, id);
            l.loan_type = pick(&mut rng, &LOAN_TYPES).to_string();
            l.status = pick(&mut rng, &STATUSES).to_string();
            l.origination_date = format!("{}-07-01", 2010 + rng.next_u64_below(16));
            ls.push(l);
            next_loan += 1;
        }
    }
    (ms, ls)
}

pub fn source_with(members: &[RawMember], loans: &[RawLoan]) -> SourceStore {
    let source = SourceStore::in_memory().expect("in-memory source");
    source.migrate().expect("source migration");
    source.insert_members(members).expect("insert members");
    source.insert_loans(loans).expect("insert loans");
    source
}

/// Source store with values the schema's CHECK constraints would refuse.
/// Rows go in through the store; `corrupt_sql` then runs on a second
/// connection with constraint checking off.
pub fn source_with_corruption(
    name: &str,
    members: &[RawMember],
    loans: &[RawLoan],
    corrupt_sql: &str,
) -> SourceStore {
    let uri = format!("file:{name}?mode=memory&cache=shared");
    let source = SourceStore::open(&uri).expect("shared-memory source");
    source.migrate().expect("source migration");
    source.insert_members(members).expect("insert members");
    source.insert_loans(loans).expect("insert loans");

    let side = Connection::open_with_flags(
        &uri,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_URI,
    )
    .expect("side connection");
    side.execute_batch("PRAGMA ignore_check_constraints = ON;")
        .expect("disable checks");
    side.execute_batch(corrupt_sql).expect("corrupt rows");
    source
}

pub fn pipeline_over(source: SourceStore) -> EtlPipeline {
    pipeline_with_analytics(source, fresh_analytics())
}

/// Route library logs through the test harness. `RUST_LOG=debug` shows
/// per-batch progress.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn pipeline_with_analytics(source: SourceStore, analytics: AnalyticsStore) -> EtlPipeline {
    init_logging();
    let links = LinkStore::in_memory().expect("in-memory links");
    links.migrate().expect("link migration");
    let config = EtlConfig::default_test();
    let mut pipeline = EtlPipeline::new(source, analytics, links)
        .with_reference_year(config.reference_year.unwrap_or(REFERENCE_YEAR));
    if let Some(seed) = config.audit_seed {
        pipeline = pipeline.with_audit_seed(seed);
    }
    pipeline
}

pub fn fresh_analytics() -> AnalyticsStore {
    let analytics = AnalyticsStore::in_memory().expect("in-memory analytics");
    analytics.migrate().expect("analytics migration");
    analytics
}

/// Pipeline over a seeded random population.
pub fn build(members: i64, seed: u64) -> EtlPipeline {
    let (ms, ls) = population(members, seed);
    pipeline_over(source_with(&ms, &ls))
}

pub fn test_options() -> RunOptions {
    EtlConfig::default_test().run
}

// ── Stub detectors ───────────────────────────────────────────────────────────

/// Finds nothing.
pub struct SilentDetector;

impl PiiDetector for SilentDetector {
    fn detect(&self, _text: &str) -> EtlResult<Vec<EntitySpan>> {
        Ok(Vec::new())
    }
}

/// Reports the whole of every non-empty value as one entity of a fixed type.
pub struct EverythingIs(pub &'static str);

impl PiiDetector for EverythingIs {
    fn detect(&self, text: &str) -> EtlResult<Vec<EntitySpan>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![EntitySpan {
            entity_type: self.0.to_string(),
            start: 0,
            end: text.len(),
            confidence: 0.9,
            matched_text: text.to_string(),
        }])
    }
}
