// ABOUTME: End-to-end pipeline tests covering representative scripts and
// engine-level invariants (determinism, truthiness, equality semantics)

use jyro::{parse_json, value_to_json, ExecutionLimits, ExecutionOptions, Jyro, MessageCode, Stage};
use pretty_assertions::assert_eq;

fn run_with_stdlib(source: &str, data: &str) -> jyro::JyroResult {
    Jyro::builder()
        .with_script(source)
        .with_data(parse_json(data).unwrap())
        .with_standard_library()
        .run()
}

fn data_json(result: &jyro::JyroResult) -> String {
    serde_json::to_string(&value_to_json(&result.data)).unwrap()
}

#[test]
fn scenario_greeting() {
    let result = run_with_stdlib(
        "Data.greeting = 'Hello, ' + Data.name + '!'\nData.canVote = Data.age >= 18",
        "{\"name\":\"Alice\",\"age\":25}",
    );
    assert!(result.is_successful);
    assert_eq!(
        data_json(&result),
        "{\"name\":\"Alice\",\"age\":25,\"greeting\":\"Hello, Alice!\",\"canVote\":true}"
    );
}

#[test]
fn scenario_loop_sum() {
    let result = run_with_stdlib(
        "var t = 0\nforeach o in Data.orders do t = t + o.total end\nData.total = t",
        "{\"orders\":[{\"total\":150.0},{\"total\":75.5}]}",
    );
    assert!(result.is_successful);
    assert!(data_json(&result).contains("\"total\":225.5"));
}

#[test]
fn scenario_descending_range_for_with_append() {
    let result = run_with_stdlib(
        "var a = []\nfor i = 5 to 1 by -2 do a = Append(a, i) end\nData.a = a",
        "{}",
    );
    assert!(result.is_successful, "messages: {:?}", result.messages);
    assert_eq!(data_json(&result), "{\"a\":[5,3,1]}");
}

#[test]
fn scenario_execution_time_limit() {
    let result = Jyro::builder()
        .with_script("while true do end")
        .with_data(parse_json("{}").unwrap())
        .with_options(ExecutionOptions::new().limits(
            ExecutionLimits::new()
                .max_execution_time(std::time::Duration::from_millis(50))
                .max_statements(u64::MAX)
                .max_loop_iterations(u64::MAX),
        ))
        .run();
    assert!(!result.is_successful);
    assert_eq!(result.messages.len(), 1);
    assert_eq!(
        result.messages[0].code,
        MessageCode::ExecutionTimeLimitExceeded
    );
}

#[test]
fn scenario_fail_statement() {
    let result = run_with_stdlib("fail \"bad\"", "{}");
    assert!(!result.is_successful);
    assert_eq!(result.messages.len(), 1);
    assert_eq!(result.messages[0].code, MessageCode::RuntimeError);
    assert_eq!(result.messages[0].arguments, vec!["bad".to_string()]);
    assert_eq!(result.messages[0].stage, Stage::Execution);
}

#[test]
fn determinism_same_source_same_output() {
    let source =
        "var t = 0\nforeach o in Data.orders do t = t + o.total end\nData.total = t\nData.keys = Keys(Data.orders[0])";
    let data = "{\"orders\":[{\"total\":1.5},{\"total\":2.5}]}";
    let first = run_with_stdlib(source, data);
    let second = run_with_stdlib(source, data);
    assert_eq!(data_json(&first), data_json(&second));
    let codes = |r: &jyro::JyroResult| r.messages.iter().map(|m| m.code).collect::<Vec<_>>();
    assert_eq!(codes(&first), codes(&second));
}

#[test]
fn quota_monotonicity() {
    let source = "var n = 0\nwhile n < 50 do n = n + 1 end\nData.n = n";
    let run = |statements: u64| {
        Jyro::builder()
            .with_script(source)
            .with_data(parse_json("{}").unwrap())
            .with_options(
                ExecutionOptions::new()
                    .limits(ExecutionLimits::new().max_statements(statements)),
            )
            .run()
    };
    let tight = run(20);
    assert!(!tight.is_successful);
    assert_eq!(tight.messages[0].code, MessageCode::StatementLimitExceeded);
    let roomy = run(10_000);
    assert!(roomy.is_successful);
    assert_eq!(data_json(&roomy), "{\"n\":50}");
}

#[test]
fn validation_errors_prevent_execution() {
    let result = run_with_stdlib("Data.x = missing + 1", "{\"x\":0}");
    assert!(!result.is_successful);
    assert_eq!(result.messages[0].stage, Stage::Validation);
    assert_eq!(
        result.messages[0].code,
        MessageCode::InvalidVariableReference
    );
    // the data is untouched: execution never started
    assert_eq!(data_json(&result), "{\"x\":0}");
    assert_eq!(result.metadata.statement_count, 0);
}

#[test]
fn truthiness_matrix_in_conditions() {
    let source = r#"
var checks = []
if null then checks = Append(checks, 'null') end
if false then checks = Append(checks, 'false') end
if 0 then checks = Append(checks, 'zero') end
if '' then checks = Append(checks, 'empty-string') end
if [] then checks = Append(checks, 'empty-array') end
if {} then checks = Append(checks, 'empty-object') end
if 0.5 then checks = Append(checks, 'number') end
if 'x' then checks = Append(checks, 'string') end
Data.checks = checks
"#;
    let result = run_with_stdlib(source, "{}");
    assert!(result.is_successful, "messages: {:?}", result.messages);
    assert_eq!(
        data_json(&result),
        "{\"checks\":[\"empty-array\",\"empty-object\",\"number\",\"string\"]}"
    );
}

#[test]
fn equality_is_deep_and_order_independent() {
    let source = r#"
Data.objectsEqual = Data.a == Data.b
Data.arraysEqual = [1, 2] == [1, 2]
Data.arraysOrdered = [1, 2] == [2, 1]
Data.nullEqual = null == Data.missing
"#;
    let result = run_with_stdlib(
        source,
        "{\"a\":{\"x\":1,\"y\":[true,null]},\"b\":{\"y\":[true,null],\"x\":1}}",
    );
    assert!(result.is_successful);
    let json = data_json(&result);
    assert!(json.contains("\"objectsEqual\":true"));
    assert!(json.contains("\"arraysEqual\":true"));
    assert!(json.contains("\"arraysOrdered\":false"));
    assert!(json.contains("\"nullEqual\":true"));
}

#[test]
fn partial_mutation_is_returned_on_runtime_error() {
    let result = run_with_stdlib("Data.first = 'done'\nData.second = 1 / 0", "{}");
    assert!(!result.is_successful);
    assert_eq!(result.messages[0].code, MessageCode::DivisionByZero);
    assert_eq!(data_json(&result), "{\"first\":\"done\"}");
}

#[test]
fn lambdas_compose_with_stdlib() {
    let result = run_with_stdlib(
        "Data.doubled = Map(Data.nums, x => x * 2)\nData.big = Filter(Data.nums, x => x > 1)",
        "{\"nums\":[1,2,3]}",
    );
    assert!(result.is_successful, "messages: {:?}", result.messages);
    let json = data_json(&result);
    assert!(json.contains("\"doubled\":[2,4,6]"));
    assert!(json.contains("\"big\":[2,3]"));
}

#[test]
fn switch_selects_single_case() {
    let source = r#"
switch Upper(Data.kind) do
    case 'A', 'B' then Data.group = 1
    case 'C' then Data.group = 2
    default Data.group = 0
end
"#;
    let a = run_with_stdlib(source, "{\"kind\":\"b\"}");
    assert!(a.is_successful);
    assert!(data_json(&a).contains("\"group\":1"));
    let c = run_with_stdlib(source, "{\"kind\":\"c\"}");
    assert!(data_json(&c).contains("\"group\":2"));
    let other = run_with_stdlib(source, "{\"kind\":\"z\"}");
    assert!(data_json(&other).contains("\"group\":0"));
}

#[test]
fn float_spelling_survives_round_trip() {
    let result = run_with_stdlib("Data.copy = Data.values", "{\"values\":[6,6.0,2.5]}");
    assert!(result.is_successful);
    assert_eq!(
        data_json(&result),
        "{\"values\":[6,6.0,2.5],\"copy\":[6,6.0,2.5]}"
    );
}

#[test]
fn metadata_reports_started_at_and_processing_time() {
    let before = chrono::Utc::now();
    let result = run_with_stdlib("Data.x = 1", "{}");
    let after = chrono::Utc::now();
    assert!(result.metadata.started_at >= before);
    assert!(result.metadata.started_at <= after);
    assert!(result.metadata.processing_time > std::time::Duration::ZERO);
}
