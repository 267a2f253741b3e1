//! The ETL pipeline: source store → identity map → parallel transform →
//! analytics store, followed by the schema check and the sampling audit.
//!
//! Phase order per run:
//!   1. Clear the analytics tables (loans first).
//!   2. Build a fresh identity map and replace the link store with it.
//!   3. Members: extract batch → transform on the worker pool → load.
//!   4. Loans: same, after every member row is in place.
//!   5. Schema validation (always).
//!   6. Sampling audit (when enabled).
//!
//! RULE: Only this coordinating thread touches a store. Workers get plain
//! data.

use crate::{
    auditor::SamplingAuditor,
    config::{EtlConfig, RunOptions},
    detector::{PatternDetector, PiiDetector},
    error::EtlResult,
    extractor::{BatchExtractor, SourceRow},
    identity::IdentityMap,
    loader::{Loadable, Loader},
    records::{RawLoan, RawMember},
    rng::SeededRng,
    run_control::{Finding, RunController},
    schema_validator::SchemaValidator,
    store::{AnalyticsStore, LinkStore, SourceStore},
    transform::{Transform, TransformContext, TransformPool},
};
use chrono::{Datelike, Utc};
use std::time::Instant;

pub struct EtlPipeline {
    source: SourceStore,
    analytics: AnalyticsStore,
    links: LinkStore,
    detector: Box<dyn PiiDetector>,
    reference_year: Option<i32>,
    audit_seed: Option<u64>,
}

impl EtlPipeline {
    /// Assemble a pipeline over already-migrated stores, with the built-in
    /// pattern detector.
    pub fn new(source: SourceStore, analytics: AnalyticsStore, links: LinkStore) -> Self {
        Self {
            source,
            analytics,
            links,
            detector: Box::new(PatternDetector::new()),
            reference_year: None,
            audit_seed: None,
        }
    }

    /// Open the three stores named in `config`. The analytics and link
    /// schemas are created if missing; the source store is used as found.
    pub fn open(config: &EtlConfig) -> EtlResult<Self> {
        let source = SourceStore::open(&config.source_db)?;
        let analytics = AnalyticsStore::open(&config.analytics_db)?;
        analytics.migrate()?;
        let links = LinkStore::open(&config.link_db)?;
        links.migrate()?;

        let mut pipeline = Self::new(source, analytics, links);
        pipeline.reference_year = config.reference_year;
        pipeline.audit_seed = config.audit_seed;
        Ok(pipeline)
    }

    pub fn with_detector(mut self, detector: impl PiiDetector + 'static) -> Self {
        self.detector = Box::new(detector);
        self
    }

    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = Some(year);
        self
    }

    pub fn with_audit_seed(mut self, seed: u64) -> Self {
        self.audit_seed = Some(seed);
        self
    }

    pub fn source(&self) -> &SourceStore {
        &self.source
    }

    pub fn analytics(&self) -> &AnalyticsStore {
        &self.analytics
    }

    pub fn links(&self) -> &LinkStore {
        &self.links
    }

    /// The year ages and tenure are computed against: the configured one,
    /// or the current UTC year. Fixed once per run.
    pub fn reference_year(&self) -> i32 {
        self.reference_year.unwrap_or_else(|| Utc::now().year())
    }

    /// Run every phase once, reporting progress to `progress`. State
    /// transitions belong to the caller (`RunController`).
    pub fn execute(
        &self,
        progress: &RunController,
        options: &RunOptions,
        reference_year: i32,
    ) -> EtlResult<()> {
        let run_start = Instant::now();
        let loader = Loader::new(&self.analytics, progress);
        timed("clear analytics store", || loader.prepare())?;

        let identities = timed("generate identity map", || -> EtlResult<IdentityMap> {
            let member_ids = self.source.member_ids()?;
            Ok(IdentityMap::generate(&member_ids))
        })?;
        let links = timed("persist member links", || self.links.replace_all(&identities))?;
        progress.record_links(links);

        let pool = TransformPool::new(options.worker_count)?;
        let ctx = TransformContext {
            identities: &identities,
            reference_year,
        };
        timed("process members", || {
            self.process_table::<RawMember>(&pool, &ctx, &loader, options.batch_size)
        })?;
        timed("process loans", || {
            self.process_table::<RawLoan>(&pool, &ctx, &loader, options.batch_size)
        })?;

        let schema = timed("validate schema", || {
            SchemaValidator::new(&self.analytics).validate()
        })?;
        progress.record_findings(schema.into_iter().map(Finding::Schema));

        if options.audit_enabled {
            let mut rng = SeededRng::from_optional_seed(self.audit_seed);
            let auditor =
                SamplingAuditor::new(&self.analytics, &*self.detector, options.sample_fraction);
            let report = timed("audit sample", || auditor.audit(&mut rng))?;
            progress.record_audit(report);
        }

        log::info!("pipeline finished in {:.2?}", run_start.elapsed());
        Ok(())
    }

    /// Stream one source table through the worker pool into the analytics
    /// store, one batch at a time. Returns the number of rows loaded.
    fn process_table<R>(
        &self,
        pool: &TransformPool,
        ctx: &TransformContext<'_>,
        loader: &Loader<'_>,
        batch_size: usize,
    ) -> EtlResult<usize>
    where
        R: SourceRow + Transform,
        R::Clean: Loadable,
    {
        let mut loaded = 0;
        for (n, batch) in BatchExtractor::<R>::new(&self.source, batch_size).enumerate() {
            let batch = batch?;
            let clean = pool.transform_batch(&batch, ctx)?;
            loaded += loader.load(&clean)?;
            log::debug!("{}: batch {} loaded, {} rows so far", R::TABLE, n + 1, loaded);
        }
        log::info!(
            "{}: {} rows across {} workers",
            R::TABLE,
            loaded,
            pool.workers()
        );
        Ok(loaded)
    }
}

/// Run `f`, logging how long it took under `label`.
fn timed<T>(label: &str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let out = f();
    log::info!("{label}: {:.2?}", start.elapsed());
    out
}
