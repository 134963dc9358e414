//! Luagate API - unified interfaces for hosts
//!
//! Provides:
//! - the unified [`BridgeError`] and its structured [`ErrorReport`]
//! - host-side decoding of `compute` results ([`decode_outcome`])
//! - one-shot execution helpers ([`run`], [`run_with_store`], [`quick_run`])
//! - tracing subscriber setup ([`logging`])
//! - the wasm exports (feature `wasm`)
//!
//! ```ignore
//! use luagate_api::{run, BridgeConfig, Value};
//!
//! let out = run("print('hi') return 1 + 1", &BridgeConfig::default())?;
//! assert_eq!(out.stdout, "hi\n");
//! assert_eq!(out.value, Value::Int(2));
//! ```

pub mod abi;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use config::{config as get_config, init as init_config, is_initialized};
pub use error::{BridgeError, ErrorReport};
pub use types::{decode_outcome, ExecuteOutput};

// Re-export commonly used types
pub use luagate_config::{BridgeConfig, LogLevel, LoggingConfig};
pub use luagate_core::{Session, Value};
pub use luagate_store::{HostStorage, MemoryStore};

use std::rc::Rc;

/// 在新会话上执行一次，外部表落在新的内存存储里
pub fn run(source: &str, config: &BridgeConfig) -> Result<ExecuteOutput, BridgeError> {
    run_with_store(source, config, Rc::new(MemoryStore::new()))
}

/// 在新会话上执行一次，外部表落在 `store`
pub fn run_with_store(
    source: &str,
    config: &BridgeConfig,
    store: Rc<dyn HostStorage>,
) -> Result<ExecuteOutput, BridgeError> {
    let mut session = Session::new(config.clone(), store)?;
    execute(&mut session, source)
}

/// 在已有会话上执行，失败时按会话记录的分类返回错误
pub fn execute(session: &mut Session, source: &str) -> Result<ExecuteOutput, BridgeError> {
    let ret = session.run(source.as_bytes());
    decode_outcome(session.buffer(), ret).map_err(|err| match (&err, session.last_error()) {
        (BridgeError::Invocation(_), Some(state)) => BridgeError::from_state(state),
        _ => err,
    })
}

/// 使用全局配置执行（未初始化时为默认配置）
pub fn quick_run(source: &str) -> Result<ExecuteOutput, BridgeError> {
    run(source, config::config())
}
