//! 调用协议测试
//!
//! 端到端测试：源码写入缓冲区，compute 返回帧或错误

mod common;
use common::{decode, eval_int, exec, new_session, session_with, Outcome};
use luagate_config::BridgeConfig;
use luagate_core::binary::{Value, TRUNCATION_MARKER};

// ===== 成功帧 =====

#[test]
fn test_scalar_results() {
    let (mut s, _) = new_session();
    assert_eq!(exec(&mut s, "return 42").value(), &Value::Int(42));
    assert_eq!(exec(&mut s, "return 3.14159").value(), &Value::Float(3.14159));
    assert_eq!(exec(&mut s, "return 'héllo'").value(), &Value::str("héllo"));
    assert_eq!(exec(&mut s, "return true").value(), &Value::Bool(true));
    assert_eq!(exec(&mut s, "return nil").value(), &Value::Nil);
}

#[test]
fn test_first_return_value_only() {
    let (mut s, _) = new_session();
    assert_eq!(exec(&mut s, "return 1, 2, 3").value(), &Value::Int(1));
}

#[test]
fn test_output_and_result_together() {
    let (mut s, _) = new_session();
    let outcome = exec(&mut s, "print('a') print(1.5, nil) return 7");
    assert_eq!(
        outcome,
        Outcome::Ok {
            output: "a\n1.5\tnil\n".to_string(),
            value: Value::Int(7),
        }
    );
}

#[test]
fn test_returned_function_is_bytecode() {
    let (mut s, _) = new_session();
    let outcome = exec(&mut s, "return function(x) return x end");
    assert!(matches!(outcome.value(), Value::FunctionBytecode(b) if b.starts_with(b"\x1bLua")));
}

#[test]
fn test_binary_string_result() {
    let (mut s, _) = new_session();
    assert_eq!(
        exec(&mut s, "return '\\0\\255a'").value(),
        &Value::Str(vec![0, 255, b'a'])
    );
}

// ===== 错误编码 =====

#[test]
fn test_error_sign_and_length() {
    let (mut s, _) = new_session();
    let ret = s.run(b"error('bad thing', 0)");
    assert_eq!(ret, -("bad thing".len() as i32 + 1));
    assert_eq!(decode(&s, ret), Outcome::Err("bad thing".to_string()));
}

#[test]
fn test_empty_error_message() {
    let (mut s, _) = new_session();
    let ret = s.run(b"error('', 0)");
    assert_eq!(ret, -1);
}

#[test]
fn test_binary_error_message_is_plain_text() {
    let (mut s, _) = new_session();
    let ret = s.run(br#"error("\255\254oops", 0)"#);
    assert!(ret < 0);
    let len = (-(ret as i64) - 1) as usize;
    let text = std::str::from_utf8(&s.buffer()[..len]).expect("error text must be utf-8");
    assert!(text.ends_with("oops"));
}

#[test]
fn test_error_discards_output() {
    let (mut s, _) = new_session();
    let outcome = exec(&mut s, "print('before') error('after', 0)");
    assert_eq!(outcome.error(), "after");
}

// ===== 截断 =====

#[test]
fn test_output_truncation_is_deterministic() {
    let mut config = BridgeConfig::default();
    config.buffer.capacity = 1024;
    let (mut s, _) = session_with(config.clone());
    let code = "for i = 1, 500 do print('line ' .. i) end return 0";

    let first = exec(&mut s, code);
    let second = exec(&mut s, code);
    assert_eq!(first, second);
    assert!(first.output().as_bytes().ends_with(TRUNCATION_MARKER));
    assert!(first.output().len() <= config.buffer.text_budget());
}

#[test]
fn test_output_cut_to_make_room_for_result() {
    let mut config = BridgeConfig::default();
    config.buffer.capacity = 1024;
    let (mut s, _) = session_with(config);

    let ret = s.run(b"print(string.rep('o', 2000)) return string.rep('r', 300)");
    assert!(ret > 0, "expected success, got {:?}", decode(&s, ret));
    assert!(ret as usize <= 1024);
    let outcome = decode(&s, ret);
    assert_eq!(outcome.value(), &Value::Str(vec![b'r'; 300]));
    assert!(outcome.output().starts_with("ooo"));
    assert!(outcome.output().as_bytes().ends_with(TRUNCATION_MARKER));
}

#[test]
fn test_result_alone_too_large_still_fails() {
    let mut config = BridgeConfig::default();
    config.buffer.capacity = 1024;
    let (mut s, _) = session_with(config);
    let outcome = exec(&mut s, "print('x') return string.rep('r', 1100)");
    assert!(outcome.error().starts_with("result encoding failed"));
}

#[test]
fn test_error_truncation() {
    let mut config = BridgeConfig::default();
    config.buffer.capacity = 512;
    let (mut s, _) = session_with(config.clone());

    let ret = s.run(b"error(string.rep('z', 10000), 0)");
    assert!(ret < 0);
    assert!((-(ret as i64)) as usize <= 512);
    let msg = decode(&s, ret);
    assert!(msg.error().ends_with("..."));
    assert_eq!(msg.error().len(), config.buffer.text_budget());
}

// ===== 错误隔离 =====

#[test]
fn test_error_isolation() {
    let (mut s, _) = new_session();
    assert!(matches!(exec(&mut s, "print('x') local t = nil; return t.field"), Outcome::Err(_)));
    assert_eq!(
        exec(&mut s, "return 99"),
        Outcome::Ok {
            output: String::new(),
            value: Value::Int(99),
        }
    );
}

#[test]
fn test_compile_error_isolation() {
    let (mut s, _) = new_session();
    assert!(matches!(exec(&mut s, "return )"), Outcome::Err(_)));
    assert_eq!(eval_int(&mut s, "return 5"), 5);
}

#[test]
fn test_globals_survive_between_calls() {
    // 会话内的全局变量保留，外部表之外的状态不保证跨会话
    let (mut s, _) = new_session();
    exec(&mut s, "counter = 1");
    assert_eq!(eval_int(&mut s, "counter = counter + 1 return counter"), 2);
}

#[test]
fn test_memory_limit_error_recovers() {
    let mut config = BridgeConfig::default();
    config.limits.memory_limit = Some(2 * 1024 * 1024);
    let (mut s, _) = session_with(config);
    let outcome = exec(
        &mut s,
        "local t = {} for i = 1, 1e8 do t[i] = string.rep('m', 100) .. i end",
    );
    assert!(matches!(outcome, Outcome::Err(_)));
    assert_eq!(eval_int(&mut s, "return 1 + 1"), 2);
}
