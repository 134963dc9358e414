//! 测试辅助工具
//!
//! 提供端到端测试的辅助函数

#![allow(dead_code)]

use luagate_config::BridgeConfig;
use luagate_core::binary::{decode_frame, ReturnCode, Value};
use luagate_core::{MemoryStore, Session};
use std::rc::Rc;

/// 一次调用的结果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Ok { output: String, value: Value },
    Err(String),
}

impl Outcome {
    pub fn value(&self) -> &Value {
        match self {
            Outcome::Ok { value, .. } => value,
            Outcome::Err(msg) => panic!("expected success, got error: {msg}"),
        }
    }

    pub fn output(&self) -> &str {
        match self {
            Outcome::Ok { output, .. } => output,
            Outcome::Err(msg) => panic!("expected success, got error: {msg}"),
        }
    }

    pub fn error(&self) -> &str {
        match self {
            Outcome::Err(msg) => msg,
            Outcome::Ok { value, .. } => panic!("expected error, got {value:?}"),
        }
    }
}

/// 默认配置 + 新内存存储
pub fn new_session() -> (Session, MemoryStore) {
    session_with(BridgeConfig::default())
}

pub fn session_with(config: BridgeConfig) -> (Session, MemoryStore) {
    let store = MemoryStore::new();
    let session = Session::new(config, Rc::new(store.clone())).unwrap();
    (session, store)
}

/// 在已有存储上开新会话，模拟解释器重启
pub fn restart(store: &MemoryStore) -> Session {
    Session::new(BridgeConfig::default(), Rc::new(store.clone())).unwrap()
}

/// 执行代码并按返回值符号解码缓冲区
pub fn exec(session: &mut Session, code: &str) -> Outcome {
    let ret = session.run(code.as_bytes());
    decode(session, ret)
}

pub fn decode(session: &Session, ret: i32) -> Outcome {
    match ReturnCode::from_raw(ret) {
        ReturnCode::Success(len) => {
            assert!(len <= session.buffer_capacity());
            let (output, value) = decode_frame(&session.buffer()[..len]).unwrap();
            Outcome::Ok {
                output: String::from_utf8(output).unwrap(),
                value,
            }
        }
        ReturnCode::Error(len) => {
            assert!(len < session.buffer_capacity());
            Outcome::Err(String::from_utf8_lossy(&session.buffer()[..len]).into_owned())
        }
    }
}

/// 执行并取整数结果
pub fn eval_int(session: &mut Session, code: &str) -> i64 {
    let outcome = exec(session, code);
    match outcome.value().as_int() {
        Some(i) => i,
        None => panic!("expected int, got {:?}", outcome.value()),
    }
}
