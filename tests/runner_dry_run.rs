// tests/runner_dry_run.rs

mod common;
use crate::common::{init_tracing, recording_runner, with_timeout};

use std::sync::Arc;

use proptest::prelude::*;
use sysmaint::exec::{CommandRequest, Executor};

#[tokio::test]
async fn dry_run_never_spawns_even_for_missing_programs() {
    init_tracing();
    let (runner, sink) = recording_runner();

    let req = CommandRequest::new(
        "Would break things",
        true,
        "false-nonexistent-binary",
        ["--everything"],
    )
    .as_user("alice");

    with_timeout(runner.run(&req)).await.unwrap();
    assert!(sink.is_empty());
}

#[tokio::test]
async fn dry_run_capture_returns_empty_output() {
    init_tracing();
    let (runner, sink) = recording_runner();

    let req = CommandRequest::new("Query", true, "false-nonexistent-binary", ["list"]);
    let out = with_timeout(runner.capture(&req)).await.unwrap();

    assert_eq!(out.status, None);
    assert!(out.success());
    assert!(out.stdout.is_empty() && out.stderr.is_empty());
    assert!(sink.is_empty());
}

#[tokio::test]
async fn executor_applies_its_dry_run_flag_to_every_request() {
    init_tracing();
    let (runner, sink) = recording_runner();
    let exec = Executor::new(Arc::new(runner), true);

    let req = exec.request("Remove everything", "rm", ["-rf", "/definitely/not/here"]);
    assert!(req.dry_run);

    with_timeout(exec.run_and_stream(&req)).await.unwrap();
    with_timeout(exec.run_as("alice", "As user", "false-nonexistent-binary", ["x"]))
        .await
        .unwrap();
    let out = with_timeout(exec.capture("Query", "false-nonexistent-binary", ["y"]))
        .await
        .unwrap();

    assert!(out.stdout.is_empty());
    assert!(sink.is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn dry_run_succeeds_for_any_program(
        program in "[a-zA-Z0-9_./-]{1,24}",
        args in proptest::collection::vec(".{0,12}", 0..4),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let (runner, sink) = recording_runner();
        let req = CommandRequest::new("Anything", true, program, args);

        prop_assert!(rt.block_on(runner.run(&req)).is_ok());
        prop_assert!(sink.is_empty());
    }
}
