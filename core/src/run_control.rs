//! Run controller: single-flight state machine around one pipeline run.
//!
//! RULES:
//!   - idle → running → {completed, failed}; a finished run may be followed
//!     by a new one.
//!   - A start request while running is answered with
//!     `StartOutcome::AlreadyRunning` and changes nothing.
//!   - Options are validated before the state changes.
//!   - A run that errors or panics always ends in `failed`.
//!   - The status lock is held for short updates only, never across I/O.
//!     Readers get copies through `snapshot()`.

use crate::{
    auditor::{AuditReport, PiiFinding},
    config::RunOptions,
    error::{EtlError, EtlResult},
    pipeline::EtlPipeline,
    schema_validator::{SchemaFinding, Severity},
    types::TableName,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread::JoinHandle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    Schema(SchemaFinding),
    Pii(PiiFinding),
}

impl Finding {
    pub fn is_critical(&self) -> bool {
        matches!(self, Finding::Schema(f) if f.severity == Severity::Critical)
    }
}

/// Observable state of the current or most recent run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatus {
    pub state: RunState,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub members_processed: usize,
    pub loans_processed: usize,
    pub links_created: usize,
    pub findings: Vec<Finding>,
    pub pii_sample_size: usize,
    pub error: Option<String>,
    pub options: Option<RunOptions>,
    pub reference_year: Option<i32>,
}

impl RunStatus {
    pub fn idle() -> Self {
        Self {
            state: RunState::Idle,
            started_at: None,
            completed_at: None,
            members_processed: 0,
            loans_processed: 0,
            links_created: 0,
            findings: Vec::new(),
            pii_sample_size: 0,
            error: None,
            options: None,
            reference_year: None,
        }
    }

    fn running(options: &RunOptions, reference_year: i32) -> Self {
        Self {
            state: RunState::Running,
            started_at: Some(Utc::now()),
            options: Some(options.clone()),
            reference_year: Some(reference_year),
            ..Self::idle()
        }
    }

    pub fn schema_findings(&self) -> impl Iterator<Item = &SchemaFinding> {
        self.findings.iter().filter_map(|f| match f {
            Finding::Schema(s) => Some(s),
            Finding::Pii(_) => None,
        })
    }

    pub fn pii_findings(&self) -> impl Iterator<Item = &PiiFinding> {
        self.findings.iter().filter_map(|f| match f {
            Finding::Pii(p) => Some(p),
            Finding::Schema(_) => None,
        })
    }

    pub fn critical_findings(&self) -> usize {
        self.findings.iter().filter(|f| f.is_critical()).count()
    }

    pub fn to_json(&self) -> EtlResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::idle()
    }
}

/// Result of a start request.
#[derive(Debug)]
pub enum StartOutcome<T> {
    Accepted(T),
    AlreadyRunning,
}

impl<T> StartOutcome<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, StartOutcome::Accepted(_))
    }

    pub fn accepted(self) -> Option<T> {
        match self {
            StartOutcome::Accepted(v) => Some(v),
            StartOutcome::AlreadyRunning => None,
        }
    }
}

pub struct RunController {
    status: Mutex<RunStatus>,
}

impl Default for RunController {
    fn default() -> Self {
        Self::new()
    }
}

impl RunController {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(RunStatus::idle()),
        }
    }

    pub fn snapshot(&self) -> RunStatus {
        self.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock().state == RunState::Running
    }

    /// A panic while holding the lock leaves a usable status behind.
    fn lock(&self) -> MutexGuard<'_, RunStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Triggers ─────────────────────────────────────────────────────────────

    /// Run `pipeline` on the calling thread.
    pub fn run(
        &self,
        pipeline: &EtlPipeline,
        options: RunOptions,
    ) -> EtlResult<StartOutcome<RunStatus>> {
        options.validate()?;
        let reference_year = pipeline.reference_year();
        if !self.try_begin(&options, reference_year) {
            return Ok(StartOutcome::AlreadyRunning);
        }
        self.execute(pipeline, &options, reference_year)
            .map(StartOutcome::Accepted)
    }

    /// Run `pipeline` on a background thread. The single-flight check
    /// happens before this returns; the handle yields the run's result.
    pub fn spawn(
        self: &Arc<Self>,
        pipeline: EtlPipeline,
        options: RunOptions,
    ) -> EtlResult<StartOutcome<JoinHandle<EtlResult<RunStatus>>>> {
        options.validate()?;
        let reference_year = pipeline.reference_year();
        if !self.try_begin(&options, reference_year) {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let controller = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name("etl-run".into())
            .spawn(move || controller.execute(&pipeline, &options, reference_year));

        match spawned {
            Ok(handle) => Ok(StartOutcome::Accepted(handle)),
            Err(e) => {
                let err = EtlError::Other(anyhow::anyhow!("cannot start run thread: {e}"));
                self.fail(&err);
                Err(err)
            }
        }
    }

    fn execute(
        &self,
        pipeline: &EtlPipeline,
        options: &RunOptions,
        reference_year: i32,
    ) -> EtlResult<RunStatus> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            pipeline.execute(self, options, reference_year)
        }))
        .unwrap_or_else(|payload| Err(panicked(payload)));

        match result {
            Ok(()) => {
                self.complete();
                Ok(self.snapshot())
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    // ── Transitions ──────────────────────────────────────────────────────────

    /// Move to running unless a run is already in flight. Returns whether
    /// the caller now owns the run.
    pub(crate) fn try_begin(&self, options: &RunOptions, reference_year: i32) -> bool {
        let mut status = self.lock();
        if status.state == RunState::Running {
            log::warn!("run requested while another run is in progress");
            return false;
        }
        *status = RunStatus::running(options, reference_year);
        log::info!(
            "run started: workers={} batch_size={} sample={} audit={} reference_year={}",
            options.worker_count,
            options.batch_size,
            options.sample_fraction,
            options.audit_enabled,
            reference_year
        );
        true
    }

    pub(crate) fn record_loaded(&self, table: TableName, rows: usize) {
        let mut status = self.lock();
        match table {
            TableName::MembersClean | TableName::Members => status.members_processed += rows,
            TableName::LoansClean | TableName::Loans => status.loans_processed += rows,
        }
    }

    pub(crate) fn record_links(&self, links: usize) {
        self.lock().links_created = links;
    }

    pub(crate) fn record_findings(&self, findings: impl IntoIterator<Item = Finding>) {
        self.lock().findings.extend(findings);
    }

    pub(crate) fn record_audit(&self, report: AuditReport) {
        let mut status = self.lock();
        status.pii_sample_size = report.sample_size;
        status.findings.extend(report.findings.into_iter().map(Finding::Pii));
    }

    fn complete(&self) {
        let mut status = self.lock();
        status.state = RunState::Completed;
        status.completed_at = Some(Utc::now());
        log::info!(
            "run completed: {} members, {} loans, {} links, {} findings ({} critical)",
            status.members_processed,
            status.loans_processed,
            status.links_created,
            status.findings.len(),
            status.critical_findings()
        );
    }

    fn fail(&self, err: &EtlError) {
        let mut status = self.lock();
        status.state = RunState::Failed;
        status.error = Some(err.to_string());
        status.completed_at = Some(Utc::now());
        log::error!("run failed: {err}");
    }
}

/// A panic inside a run becomes an ordinary run failure.
fn panicked(payload: Box<dyn Any + Send>) -> EtlError {
    let msg = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    EtlError::Other(anyhow::anyhow!("run panicked: {msg}"))
}
