//! Run controller behaviour: single-flight, validation before any state
//! change, failure isolation and rebuilds.

mod common;

use anonymizer_core::{
    config::RunOptions,
    detector::{EntitySpan, PiiDetector},
    error::{EtlError, EtlResult},
    run_control::{RunController, RunState, RunStatus, StartOutcome},
    types::TableName,
};
use std::{
    collections::HashSet,
    sync::{mpsc, Arc},
};

/// Blocks inside the audit until the test drops the sender.
struct GatedDetector {
    gate: mpsc::Receiver<()>,
}

impl PiiDetector for GatedDetector {
    fn detect(&self, _text: &str) -> EtlResult<Vec<EntitySpan>> {
        let _ = self.gate.recv();
        Ok(Vec::new())
    }
}

#[test]
fn second_trigger_while_running_is_refused() {
    let (release, gate) = mpsc::channel::<()>();
    let pipeline = common::build(40, 1).with_detector(GatedDetector { gate });
    let ctl = Arc::new(RunController::new());

    let handle = ctl
        .spawn(pipeline, common::test_options())
        .expect("valid options")
        .accepted()
        .expect("first run accepted");
    assert!(ctl.is_running());
    let started_at = ctl.snapshot().started_at;

    let second = ctl
        .spawn(common::build(10, 2), common::test_options())
        .expect("valid options");
    assert!(matches!(second, StartOutcome::AlreadyRunning));

    let inline = ctl
        .run(&common::build(10, 3), common::test_options())
        .expect("valid options");
    assert!(matches!(inline, StartOutcome::AlreadyRunning));

    let during = ctl.snapshot();
    assert_eq!(during.state, RunState::Running);
    assert_eq!(during.started_at, started_at, "refused trigger must not reset the run");

    drop(release);
    let status = handle.join().expect("run thread").expect("run succeeds");
    assert_eq!(status.state, RunState::Completed);
    assert_eq!(status.members_processed, 40);
    assert!(!ctl.is_running());

    let again = ctl
        .spawn(common::build(10, 4), common::test_options())
        .expect("valid options");
    assert!(again.is_accepted(), "a finished run can be followed by a new one");
    if let Some(h) = again.accepted() {
        h.join().expect("run thread").expect("run succeeds");
    }
}

#[test]
fn invalid_options_are_rejected_before_any_state_change() {
    let pipeline = common::build(20, 7);
    let ctl = RunController::new();

    for opts in [
        RunOptions { worker_count: 0, ..common::test_options() },
        RunOptions { batch_size: 0, ..common::test_options() },
        RunOptions { sample_fraction: 0.0, ..common::test_options() },
        RunOptions { sample_fraction: 1.01, ..common::test_options() },
    ] {
        let err = ctl.run(&pipeline, opts).expect_err("rejected");
        assert!(matches!(err, EtlError::InvalidConfig(_)), "{err}");
    }
    assert_eq!(ctl.snapshot(), RunStatus::idle());
    assert_eq!(pipeline.analytics().member_count().unwrap(), 0);
    assert_eq!(pipeline.links().link_count().unwrap(), 0);

    // Same after a completed run: the last status stays as it was.
    ctl.run(&pipeline, common::test_options()).expect("run");
    let done = ctl.snapshot();
    let bad = RunOptions { worker_count: 0, ..common::test_options() };
    assert!(ctl.run(&pipeline, bad).is_err());
    assert_eq!(ctl.snapshot(), done);
}

#[test]
fn malformed_row_in_a_later_batch_keeps_earlier_batches() {
    let (mut members, _) = common::population(80, 12);
    members[59].date_of_birth = "1985-13-45".into(); // member 60, third batch of 25
    let pipeline = common::pipeline_over(common::source_with(&members, &[]));
    let ctl = RunController::new();

    let err = ctl
        .run(&pipeline, common::test_options())
        .expect_err("malformed row aborts the run");
    match err {
        EtlError::MalformedRow { table, row_id, .. } => {
            assert_eq!(table, TableName::Members);
            assert_eq!(row_id, 60);
        }
        other => panic!("unexpected error: {other}"),
    }

    let status = ctl.snapshot();
    assert_eq!(status.state, RunState::Failed);
    assert!(status.completed_at.is_some());
    assert!(status.error.as_deref().unwrap_or_default().contains("date_of_birth"));
    assert_eq!(status.members_processed, 50);
    assert_eq!(status.loans_processed, 0);
    assert_eq!(pipeline.analytics().member_count().unwrap(), 50);
}

#[test]
fn unknown_loan_status_fails_the_run() {
    let members = vec![common::member(1, "1980-01-01", "CA", 700)];
    let source = common::source_with_corruption(
        "unknown_loan_status",
        &members,
        &[common::loan(1, 1)],
        "UPDATE loans SET status = 'written_off' WHERE loan_id = 1;",
    );
    let pipeline = common::pipeline_over(source);
    let ctl = RunController::new();

    let err = ctl.run(&pipeline, common::test_options()).expect_err("bad code");
    assert!(matches!(err, EtlError::MalformedRow { table: TableName::Loans, row_id: 1, .. }));
    assert_eq!(ctl.snapshot().members_processed, 1);
}

#[test]
fn source_schema_refuses_unknown_codes() {
    let source = common::source_with(&[common::member(1, "1980-01-01", "CA", 700)], &[]);

    let mut bad_member = common::member(2, "1980-01-01", "CA", 700);
    bad_member.account_type = "brokerage".into();
    assert!(matches!(source.insert_member(&bad_member), Err(EtlError::Database(_))));

    let mut bad_loan = common::loan(1, 1);
    bad_loan.loan_type = "boat".into();
    assert!(matches!(source.insert_loan(&bad_loan), Err(EtlError::Database(_))));

    assert_eq!(source.member_count().unwrap(), 1);
    assert_eq!(source.loan_count().unwrap(), 0);
}

#[test]
fn a_failed_run_can_be_followed_by_a_good_one() {
    let (members, _) = common::population(10, 3);
    let source = common::source_with_corruption(
        "unknown_account_type",
        &members,
        &[],
        "UPDATE members SET account_type = 'brokerage' WHERE member_id = 5;",
    );
    let broken = common::pipeline_over(source);
    let ctl = RunController::new();
    assert!(ctl.run(&broken, common::test_options()).is_err());
    assert_eq!(ctl.snapshot().state, RunState::Failed);

    let good = common::build(10, 3);
    let status = ctl
        .run(&good, common::test_options())
        .expect("run")
        .accepted()
        .expect("accepted");
    assert_eq!(status.state, RunState::Completed);
    assert!(status.error.is_none());
}

#[test]
fn rebuild_keeps_counts_and_issues_new_ids() {
    let pipeline = common::build(90, 15);
    let ctl = RunController::new();

    let first = ctl
        .run(&pipeline, common::test_options())
        .expect("first run")
        .accepted()
        .expect("accepted");
    let first_ids: HashSet<String> = pipeline.analytics().analytics_ids().unwrap().into_iter().collect();

    let second = ctl
        .run(&pipeline, common::test_options())
        .expect("second run")
        .accepted()
        .expect("accepted");
    let second_ids: HashSet<String> = pipeline.analytics().analytics_ids().unwrap().into_iter().collect();

    assert_eq!(first.members_processed, second.members_processed);
    assert_eq!(first.loans_processed, second.loans_processed);
    assert_eq!(pipeline.analytics().member_count().unwrap(), 90);
    assert_eq!(pipeline.links().link_count().unwrap(), 90);
    assert!(first_ids.is_disjoint(&second_ids), "ids are regenerated each run");

    let linked: HashSet<String> = pipeline.links().links().unwrap().into_iter().map(|(_, a)| a).collect();
    assert_eq!(linked, second_ids, "link store holds only the latest mapping");
}

struct PanickingDetector;

impl PiiDetector for PanickingDetector {
    fn detect(&self, _text: &str) -> EtlResult<Vec<EntitySpan>> {
        panic!("recognizer crashed");
    }
}

#[test]
fn panicking_run_ends_failed_and_frees_the_controller() {
    let pipeline = common::build(30, 8).with_detector(PanickingDetector);
    let ctl = Arc::new(RunController::new());

    let handle = ctl
        .spawn(pipeline, common::test_options())
        .expect("valid options")
        .accepted()
        .expect("accepted");
    let err = handle
        .join()
        .expect("panic is contained in the run")
        .expect_err("panicked run reports an error");
    assert!(err.to_string().contains("recognizer crashed"), "{err}");

    let status = ctl.snapshot();
    assert_eq!(status.state, RunState::Failed);
    assert!(status.completed_at.is_some());
    assert!(status.error.as_deref().unwrap_or_default().contains("recognizer crashed"));
    assert!(!ctl.is_running());

    let next = ctl
        .run(&common::build(10, 9), common::test_options())
        .expect("run")
        .accepted()
        .expect("controller accepts a new run");
    assert_eq!(next.state, RunState::Completed);
}

#[test]
fn panicking_inline_run_returns_an_error() {
    let pipeline = common::build(20, 10).with_detector(PanickingDetector);
    let ctl = RunController::new();
    let err = ctl
        .run(&pipeline, common::test_options())
        .expect_err("panic surfaces as an error");
    assert!(matches!(err, EtlError::Other(_)), "{err}");
    assert_eq!(ctl.snapshot().state, RunState::Failed);
}
