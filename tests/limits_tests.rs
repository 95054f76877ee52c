// ABOUTME: Quota and cancellation behaviour of full runs

use jyro::{
    parse_json, CancellationToken, ExecutionLimits, ExecutionOptions, Jyro, MessageCode,
};
use std::time::Duration;

fn run_limited(source: &str, limits: ExecutionLimits) -> jyro::JyroResult {
    Jyro::builder()
        .with_script(source)
        .with_data(parse_json("{}").unwrap())
        .with_standard_library()
        .with_options(ExecutionOptions::new().limits(limits))
        .run()
}

#[test]
fn statement_quota() {
    let result = run_limited(
        "var n = 0\nwhile true do n = n + 1 end",
        ExecutionLimits::new().max_statements(500),
    );
    assert!(!result.is_successful);
    assert_eq!(result.messages.len(), 1);
    assert_eq!(result.messages[0].code, MessageCode::StatementLimitExceeded);
    // counters stop at the quota
    assert_eq!(result.metadata.statement_count, 501);
}

#[test]
fn loop_quota_is_cumulative_across_loops() {
    let source = "for i = 1 to 60 do end\nfor j = 1 to 60 do end";
    let result = run_limited(source, ExecutionLimits::new().max_loop_iterations(100));
    assert!(!result.is_successful);
    assert_eq!(
        result.messages[0].code,
        MessageCode::LoopIterationLimitExceeded
    );

    let roomy = run_limited(source, ExecutionLimits::new().max_loop_iterations(200));
    assert!(roomy.is_successful);
    assert_eq!(roomy.metadata.loop_count, 120);
}

#[test]
fn call_depth_quota_counts_lambda_frames() {
    // Map enters one frame, its lambda another
    let result = run_limited(
        "Data.out = Map([1, 2], x => x + 1)",
        ExecutionLimits::new().max_call_depth(1),
    );
    assert!(!result.is_successful);
    assert_eq!(result.messages[0].code, MessageCode::CallDepthLimitExceeded);

    let roomy = run_limited(
        "Data.out = Map([1, 2], x => x + 1)",
        ExecutionLimits::new().max_call_depth(2),
    );
    assert!(roomy.is_successful);
    assert_eq!(roomy.metadata.max_call_depth, 2);
}

#[test]
fn pre_cancelled_token_stops_immediately() {
    let token = CancellationToken::new();
    token.cancel();
    let result = Jyro::builder()
        .with_script("Data.x = 1")
        .with_data(parse_json("{}").unwrap())
        .run_with_token(token);
    assert!(!result.is_successful);
    assert_eq!(result.messages.len(), 1);
    assert_eq!(result.messages[0].code, MessageCode::CancelledByHost);
    assert_eq!(result.metadata.statement_count, 0);
}

#[test]
fn time_quota_beats_infinite_loops() {
    let result = run_limited(
        "while true do end",
        ExecutionLimits::new()
            .max_execution_time(Duration::from_millis(30))
            .max_statements(u64::MAX)
            .max_loop_iterations(u64::MAX),
    );
    assert!(!result.is_successful);
    assert_eq!(
        result.messages[0].code,
        MessageCode::ExecutionTimeLimitExceeded
    );
}

#[test]
fn limits_do_not_trigger_below_threshold() {
    let result = run_limited(
        "var n = 0\nfor i = 1 to 10 do n = n + i end\nData.n = n",
        ExecutionLimits::new()
            .max_statements(100)
            .max_loop_iterations(100)
            .max_call_depth(4),
    );
    assert!(result.is_successful, "messages: {:?}", result.messages);
    assert_eq!(result.metadata.loop_count, 10);
}
