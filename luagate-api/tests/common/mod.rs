//! 测试辅助工具

#![allow(dead_code)]

use luagate_api::{execute, BridgeConfig, BridgeError, ExecuteOutput, MemoryStore, Session};
use std::rc::Rc;

/// 小缓冲区配置，便于触发截断
pub fn small_config(capacity: usize) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.buffer.capacity = capacity;
    config.buffer.reserved_margin = 64;
    config
}

/// 共享存储上的会话
pub fn session_on(store: &MemoryStore) -> Session {
    Session::new(BridgeConfig::default(), Rc::new(store.clone())).unwrap()
}

pub fn ok(session: &mut Session, code: &str) -> ExecuteOutput {
    match execute(session, code) {
        Ok(out) => out,
        Err(e) => panic!("expected success for {code:?}, got {e}"),
    }
}

pub fn err(session: &mut Session, code: &str) -> BridgeError {
    match execute(session, code) {
        Ok(out) => panic!("expected error for {code:?}, got {:?}", out.value),
        Err(e) => e,
    }
}

pub fn int(out: &ExecuteOutput) -> i64 {
    match out.value.as_int() {
        Some(i) => i,
        None => panic!("expected int, got {:?}", out.value),
    }
}
