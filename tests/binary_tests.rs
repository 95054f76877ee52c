// ABOUTME: End-to-end .jyrx tests: round-trip parity with direct execution,
// header guarantees and loader safety limits

use jyro::binary::{deserialize_program, hash_source, FORMAT_VERSION, MAGIC};
use jyro::{parse_json, value_to_json, Jyro, MessageCode};
use pretty_assertions::assert_eq;
use std::time::Duration;

const SCRIPT: &str = r#"
var names = []
foreach user in Data.users do
    if user.active then
        names = Append(names, Upper(user.name))
    end
end
Data.names = names
Data.count = Length(names)
"#;

const DATA: &str = r#"{"users":[{"name":"ada","active":true},{"name":"bob","active":false},{"name":"eva","active":true}]}"#;

fn engine_with_stdlib() -> Jyro {
    let mut engine = Jyro::new();
    jyro::stdlib::register_standard_library(engine.registry_mut()).unwrap();
    engine
}

fn data_json(result: &jyro::JyroResult) -> String {
    serde_json::to_string(&value_to_json(&result.data)).unwrap()
}

#[test]
fn compiled_bytes_execute_identically_to_source() {
    let engine = engine_with_stdlib();
    let script = engine.compile(SCRIPT).unwrap();
    let bytes = script.to_bytes().unwrap();

    let direct = engine.execute(&script, parse_json(DATA).unwrap());
    let loaded = engine.compile_bytes(&bytes).unwrap();
    let via_bytes = engine.execute(&loaded, parse_json(DATA).unwrap());

    assert!(direct.is_successful);
    assert!(via_bytes.is_successful);
    assert_eq!(data_json(&direct), data_json(&via_bytes));
    assert!(data_json(&direct).contains("\"names\":[\"ADA\",\"EVA\"]"));

    // the bytes path performs no parse/validate/link work
    assert_eq!(via_bytes.metadata.stages.parse, Duration::ZERO);
    assert_eq!(via_bytes.metadata.stages.validate, Duration::ZERO);
    assert_eq!(via_bytes.metadata.stages.link, Duration::ZERO);
    assert!(direct.metadata.stages.parse > Duration::ZERO);
}

#[test]
fn blob_round_trip_preserves_structure_and_hash() {
    let engine = engine_with_stdlib();
    let script = engine.compile(SCRIPT).unwrap();
    let bytes = script.to_bytes().unwrap();

    let decoded = deserialize_program(&bytes).unwrap();
    assert_eq!(decoded.version, FORMAT_VERSION);
    assert_eq!(decoded.source_hash, hash_source(SCRIPT));
    let mut required = decoded.required_functions.clone();
    required.sort();
    assert_eq!(required, vec!["Append", "Length", "Upper"]);

    // serialising the decoded program again is byte-identical
    let again = jyro::binary::serialize_program(
        &decoded.program,
        &decoded.required_functions,
        decoded.source_hash,
    )
    .unwrap();
    assert_eq!(again, bytes);
}

#[test]
fn header_carries_magic_and_version() {
    let engine = engine_with_stdlib();
    let bytes = engine.compile("Data.x = 1").unwrap().to_bytes().unwrap();
    assert_eq!(bytes[..4], MAGIC);
    assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), FORMAT_VERSION);
}

#[test]
fn loader_rejects_tampered_blobs() {
    let engine = engine_with_stdlib();
    let bytes = engine.compile("Data.x = 1").unwrap().to_bytes().unwrap();

    let mut wrong_version = bytes.clone();
    wrong_version[4] = 1;
    let errs = engine.compile_bytes(&wrong_version).unwrap_err();
    assert_eq!(errs[0].code, MessageCode::InvalidBinaryFormat);

    let mut wrong_magic = bytes.clone();
    wrong_magic[0] = b'x';
    assert!(engine.compile_bytes(&wrong_magic).is_err());

    let truncated = &bytes[..bytes.len() - 3];
    assert!(engine.compile_bytes(truncated).is_err());
}

#[test]
fn loader_requires_registered_functions() {
    let engine = engine_with_stdlib();
    let bytes = engine.compile(SCRIPT).unwrap().to_bytes().unwrap();

    let bare = Jyro::new();
    let errs = bare.compile_bytes(&bytes).unwrap_err();
    assert_eq!(errs.len(), 3);
    assert!(errs.iter().all(|d| d.code == MessageCode::UndefinedFunction));
}
