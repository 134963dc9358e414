//! API 层端到端测试

mod common;

use common::{err, int, ok, session_on, small_config};
use luagate_api::{
    decode_outcome, quick_run, run, run_with_store, BridgeConfig, BridgeError, MemoryStore,
    Session, Value,
};
use std::rc::Rc;

// ===== 一次性执行 =====

#[test]
fn test_run_returns_value_and_stdout() {
    let out = run("print('a', 2) return 40 + 2", &BridgeConfig::default()).unwrap();
    assert_eq!(out.value, Value::Int(42));
    assert_eq!(out.stdout, "a\t2\n");
}

#[test]
fn test_run_without_return_is_nil() {
    let out = run("local x = 1", &BridgeConfig::default()).unwrap();
    assert_eq!(out.value, Value::Nil);
    assert!(out.stdout.is_empty());
}

#[test]
fn test_quick_run_uses_global_or_default_config() {
    let out = quick_run("return 'ok'").unwrap();
    assert_eq!(out.value, Value::str("ok"));
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = BridgeConfig::default();
    config.buffer.capacity = 16;
    let e = run("return 1", &config).unwrap_err();
    assert!(matches!(e, BridgeError::Config(_)));
    assert_eq!(e.phase(), "config");
}

// ===== 错误分类 =====

#[test]
fn test_compile_error_classified() {
    let e = run("return +", &BridgeConfig::default()).unwrap_err();
    assert!(matches!(e, BridgeError::Compile(_)));
    assert_eq!(e.to_report().error_kind, "CompileError");
}

#[test]
fn test_runtime_error_classified() {
    let e = run("error('boom')", &BridgeConfig::default()).unwrap_err();
    match e {
        BridgeError::Runtime(ref msg) => assert!(msg.contains("boom")),
        other => panic!("expected runtime error, got {other:?}"),
    }
}

#[test]
fn test_oversized_result_is_serialization_error() {
    let e = run("return string.rep('x', 1000)", &small_config(256)).unwrap_err();
    assert!(matches!(e, BridgeError::Serialization(_)));
}

#[test]
fn test_oversized_input_is_input_error() {
    let source = format!("return '{}'", "y".repeat(300));
    let e = run(&source, &small_config(256)).unwrap_err();
    assert!(matches!(e, BridgeError::Input(_)));
}

#[test]
fn test_error_message_is_truncated_with_marker() {
    let config = small_config(256);
    let e = run("error(string.rep('e', 500))", &config).unwrap_err();
    let report = e.to_report();
    assert!(report.message.ends_with("..."));
    assert!(report.message.len() <= config.buffer.text_budget());
}

// ===== 会话复用 =====

#[test]
fn test_session_recovers_after_error() {
    let store = MemoryStore::new();
    let mut session = session_on(&store);
    err(&mut session, "print('partial') error('fail')");
    let out = ok(&mut session, "return 99");
    assert_eq!(int(&out), 99);
    assert!(out.stdout.is_empty());
}

#[test]
fn test_output_truncated_with_marker() {
    let config = small_config(256);
    let out = run("for i = 1, 100 do print('line', i) end return 1", &config).unwrap();
    assert!(out.stdout.ends_with("..."));
    assert!(out.stdout.len() <= config.buffer.text_budget());
    assert_eq!(out.value, Value::Int(1));
}

// ===== 外部表与持久化 =====

#[test]
fn test_functions_survive_restart_through_store() {
    let store = MemoryStore::new();
    let shared: Rc<MemoryStore> = Rc::new(store.clone());
    run_with_store(
        "_home.double = function(x) return x * 2 end",
        &BridgeConfig::default(),
        shared,
    )
    .unwrap();

    let mut restarted = session_on(&store);
    assert_eq!(int(&ok(&mut restarted, "return _home.double(21)")), 42);
}

#[test]
fn test_snapshot_restore_between_stores() {
    let store = MemoryStore::new();
    let mut session = session_on(&store);
    ok(&mut session, "_home.greeting = 'hello' _home[1] = 2.5");

    let image = store.snapshot().unwrap();
    let other = MemoryStore::new();
    other.restore(&image).unwrap();

    let mut restored = session_on(&other);
    let out = ok(&mut restored, "return _home.greeting .. ' ' .. tostring(_home[1])");
    assert_eq!(out.value, Value::str("hello 2.5"));
}

#[test]
fn test_returned_function_is_bytecode() {
    let out = run("return function() return 1 end", &BridgeConfig::default()).unwrap();
    match out.value {
        Value::FunctionBytecode(ref bytes) => assert!(bytes.starts_with(b"\x1bLua")),
        other => panic!("expected bytecode, got {other:?}"),
    }
}

// ===== 宿主侧解码 =====

#[test]
fn test_decode_outcome_matches_session_buffer() {
    let mut session = Session::new(BridgeConfig::default(), Rc::new(MemoryStore::new())).unwrap();
    let ret = session.run(b"print('x') return true");
    let out = decode_outcome(session.buffer(), ret).unwrap();
    assert_eq!(out.value, Value::Bool(true));
    assert_eq!(out.stdout, "x\n");

    let ret = session.run(b"error('nope', 0)");
    let e = decode_outcome(session.buffer(), ret).unwrap_err();
    assert!(matches!(e, BridgeError::Invocation(ref m) if m == "nope"));
}
