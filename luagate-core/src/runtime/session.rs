//! 会话与调用协议
//!
//! 一个会话 = 一个解释器 + 一块共享缓冲区 + 每次调用的输出和错误状态。
//! 所有桥操作都显式经过 `Session`，不依赖全局变量。
//!
//! # 调用流程
//!
//! ```text
//! 宿主写入源码 → compute(len)
//!   Idle → Running ──成功──→ Encoding → Idle    返回帧长度 (≥ 0)
//!             └──────失败──→ ErrorCaptured → Idle 返回 -(消息长度 + 1)
//! ```
//!
//! 每次调用只有外部表内容跨调用保留，输出和错误在调用开始时清空。

use super::error::{ErrorKind, ErrorReporter, ErrorState};
use super::interp::Interpreter;
use super::marshal::result_to_wire;
use super::output::{install_print, OutputCapture};
use super::proxy::{install_ext, TableContext};
use crate::binary::{encode_frame, encoded_len, truncate_with_marker, ReturnCode};
use luagate_config::{BridgeConfig, ConfigError};
use luagate_store::HostStorage;
use mlua::{Lua, MultiValue, Value as LuaValue};
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;

const TARGET: &str = "luagate::invoke";

/// 调用状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Idle,
    Running,
    Encoding,
    ErrorCaptured,
}

impl InvocationState {
    /// 是否允许迁移到 `next`
    pub fn can_transition_to(self, next: InvocationState) -> bool {
        use InvocationState::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Running, Encoding)
                | (Running, ErrorCaptured)
                | (Encoding, Idle)
                | (Encoding, ErrorCaptured)
                | (ErrorCaptured, Idle)
        )
    }
}

/// 会话创建错误
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("interpreter setup failed: {0}")]
    Interpreter(String),
}

impl From<mlua::Error> for SessionError {
    fn from(err: mlua::Error) -> Self {
        SessionError::Interpreter(super::error::lua_error_message(&err))
    }
}

/// 内存统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub buffer_capacity: usize,
    pub lua_memory_used: usize,
}

/// 解释器会话
pub struct Session {
    interp: Interpreter,
    buffer: Box<[u8]>,
    output: Rc<RefCell<OutputCapture>>,
    errors: ErrorReporter,
    state: InvocationState,
    tables: Rc<TableContext>,
    config: BridgeConfig,
}

impl Session {
    /// 按配置创建会话，外部表落在 `store`
    pub fn new(config: BridgeConfig, store: Rc<dyn HostStorage>) -> Result<Self, SessionError> {
        config.validate()?;

        let interp = Interpreter::new(&config.limits)?;
        let budget = config.buffer.text_budget();
        let output = Rc::new(RefCell::new(OutputCapture::new(budget)));
        install_print(interp.lua(), output.clone())?;

        let tables = Rc::new(TableContext::new(store, &config));
        install_ext(interp.lua(), tables.clone(), config.tables.home_table_id)?;

        tracing::debug!(
            target: TARGET,
            capacity = config.buffer.capacity,
            home = ?config.tables.home_table_id,
            "session created"
        );

        Ok(Self {
            interp,
            buffer: vec![0u8; config.buffer.capacity].into_boxed_slice(),
            output,
            errors: ErrorReporter::new(budget),
            state: InvocationState::Idle,
            tables,
            config,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn lua(&self) -> &Lua {
        self.interp.lua()
    }

    pub fn tables(&self) -> &Rc<TableContext> {
        &self.tables
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    /// 上一次失败调用的错误
    pub fn last_error(&self) -> Option<&ErrorState> {
        self.errors.current()
    }

    /// 共享缓冲区起始地址，供 FFI 导出使用
    pub fn buffer_ptr(&mut self) -> *mut u8 {
        self.buffer.as_mut_ptr()
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// 执行缓冲区前 `input_len` 字节的源码
    ///
    /// 成功时缓冲区写入结果帧并返回其长度；失败时写入错误消息并返回
    /// `-(消息长度 + 1)`。返回值的绝对值永远不超过缓冲区容量。
    pub fn compute(&mut self, input_len: usize) -> i32 {
        self.begin();
        tracing::debug!(target: TARGET, input_len, "invocation start");

        if input_len > self.buffer.len() {
            let message = format!(
                "input length {input_len} exceeds buffer capacity {}",
                self.buffer.len()
            );
            return self.fail(ErrorKind::Input, message.as_bytes());
        }

        // 缓冲区稍后会被结果覆盖，先复制源码
        let source = self.buffer[..input_len].to_vec();

        let function = match self.interp.compile(&source) {
            Ok(f) => f,
            Err(err) => return self.fail_lua(ErrorKind::Compile, &err),
        };

        let returned = match function.call::<MultiValue>(()) {
            Ok(values) => values.into_iter().next().unwrap_or(LuaValue::Nil),
            Err(err) => return self.fail_lua(ErrorKind::Runtime, &err),
        };

        self.transition(InvocationState::Encoding);
        let value = result_to_wire(self.interp.lua(), &returned, self.tables.persist_options());
        let output = self.output.borrow_mut().take();
        let output = fit_output(output, encoded_len(&value), self.buffer.len());

        let written = match encode_frame(&output, &value, &mut self.buffer) {
            Ok(n) => n,
            Err(err) => {
                let message = format!("result encoding failed: {err}");
                return self.fail(ErrorKind::Serialization, message.as_bytes());
            }
        };
        let Some(ret) = ReturnCode::Success(written).to_raw() else {
            return self.fail(ErrorKind::Serialization, b"result frame exceeds return range");
        };

        self.transition(InvocationState::Idle);
        tracing::debug!(
            target: TARGET,
            bytes = written,
            output = output.len(),
            result = value.type_name(),
            "invocation finished"
        );
        ret
    }

    /// 把源码复制进缓冲区后执行
    pub fn run(&mut self, code: &[u8]) -> i32 {
        if code.len() <= self.buffer.len() {
            self.buffer[..code.len()].copy_from_slice(code);
        }
        // 超长输入由 compute 报告
        self.compute(code.len())
    }

    pub fn memory_stats(&self) -> MemoryStats {
        MemoryStats {
            buffer_capacity: self.buffer.len(),
            lua_memory_used: self.interp.used_memory(),
        }
    }

    /// 完整垃圾回收
    pub fn collect_garbage(&self) -> Result<(), SessionError> {
        Ok(self.interp.collect_garbage()?)
    }

    fn begin(&mut self) {
        if self.state != InvocationState::Idle {
            // 上一次调用没有正常收尾（例如回调中 panic 后被捕获）
            tracing::warn!(target: TARGET, state = ?self.state, "previous invocation not finished, resetting");
            self.interp.reset();
            self.state = InvocationState::Idle;
        }
        self.output.borrow_mut().reset();
        self.errors.clear();
        self.transition(InvocationState::Running);
    }

    fn transition(&mut self, next: InvocationState) {
        if !self.state.can_transition_to(next) {
            tracing::error!(target: TARGET, from = ?self.state, to = ?next, "invalid invocation transition");
        }
        self.state = next;
    }

    fn fail_lua(&mut self, kind: ErrorKind, err: &mlua::Error) -> i32 {
        let message = super::error::lua_error_message(err);
        self.fail(kind, message.as_bytes())
    }

    fn fail(&mut self, kind: ErrorKind, message: &[u8]) -> i32 {
        self.transition(InvocationState::ErrorCaptured);
        self.output.borrow_mut().reset();

        let state = self.errors.capture(kind, message);
        let len = state.message.len().min(self.buffer.len());
        self.buffer[..len].copy_from_slice(&state.message[..len]);

        // 无论哪类错误都重置解释器
        self.interp.reset();
        self.transition(InvocationState::Idle);

        ReturnCode::Error(len).to_raw().unwrap_or(-1)
    }
}

/// 输出与结果合计超出缓冲区时截断输出，给结果让出空间
///
/// 结果本身放不下时原样返回，由编码报告错误。
fn fit_output(output: Vec<u8>, value_len: usize, capacity: usize) -> Vec<u8> {
    let Some(room) = capacity.checked_sub(4 + value_len) else {
        return output;
    };
    if output.len() <= room {
        return output;
    }
    tracing::debug!(target: TARGET, output = output.len(), room, "output cut to fit result");
    truncate_with_marker(&output, room)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::{decode_frame, Value};
    use luagate_store::MemoryStore;

    fn session() -> Session {
        Session::new(BridgeConfig::default(), Rc::new(MemoryStore::new())).unwrap()
    }

    fn success(session: &Session, ret: i32) -> (String, Value) {
        assert!(ret >= 0, "expected success, got error {:?}", session.last_error());
        let (output, value) = decode_frame(&session.buffer()[..ret as usize]).unwrap();
        (String::from_utf8(output).unwrap(), value)
    }

    fn failure(session: &Session, ret: i32) -> String {
        assert!(ret < 0, "expected failure");
        let len = (-(ret as i64) - 1) as usize;
        String::from_utf8_lossy(&session.buffer()[..len]).into_owned()
    }

    #[test]
    fn test_state_transitions() {
        use InvocationState::*;
        assert!(Idle.can_transition_to(Running));
        assert!(Running.can_transition_to(Encoding));
        assert!(Running.can_transition_to(ErrorCaptured));
        assert!(Encoding.can_transition_to(Idle));
        assert!(ErrorCaptured.can_transition_to(Idle));
        assert!(!Idle.can_transition_to(Encoding));
        assert!(!Running.can_transition_to(Idle));
        assert!(!ErrorCaptured.can_transition_to(Running));
    }

    #[test]
    fn test_compute_returns_value() {
        let mut s = session();
        let ret = s.run(b"return 40 + 2");
        assert_eq!(success(&s, ret), (String::new(), Value::Int(42)));
        assert_eq!(s.state(), InvocationState::Idle);
    }

    #[test]
    fn test_compute_captures_output() {
        let mut s = session();
        let ret = s.run(b"print('hello', 1) return 'done'");
        assert_eq!(success(&s, ret), ("hello\t1\n".to_string(), Value::str("done")));
    }

    #[test]
    fn test_no_return_is_nil() {
        let mut s = session();
        let ret = s.run(b"local x = 1");
        assert_eq!(success(&s, ret).1, Value::Nil);
    }

    #[test]
    fn test_compile_error() {
        let mut s = session();
        let ret = s.run(b"return +");
        let msg = failure(&s, ret);
        assert!(msg.starts_with("compute:1:"), "{msg}");
        assert_eq!(s.last_error().map(|e| e.kind), Some(ErrorKind::Compile));
    }

    #[test]
    fn test_runtime_error_then_recovery() {
        let mut s = session();
        let ret = s.run(b"print('noise') error('boom')");
        assert_eq!(failure(&s, ret), "compute:1: boom");
        assert_eq!(s.last_error().map(|e| e.kind), Some(ErrorKind::Runtime));

        let ret = s.run(b"return 99");
        assert_eq!(success(&s, ret), (String::new(), Value::Int(99)));
        assert!(s.last_error().is_none());
    }

    #[test]
    fn test_deep_recursion_error_recovers() {
        let mut s = session();
        let ret = s.run(b"local function f(n) return f(n + 1) + 1 end return f(1)");
        assert!(ret < 0);
        let ret = s.run(b"return 'alive'");
        assert_eq!(success(&s, ret).1, Value::str("alive"));
    }

    #[test]
    fn test_input_longer_than_buffer() {
        let mut s = session();
        let cap = s.buffer_capacity();
        let ret = s.compute(cap + 1);
        assert!(failure(&s, ret).contains("exceeds buffer capacity"));
        assert_eq!(s.last_error().map(|e| e.kind), Some(ErrorKind::Input));
    }

    #[test]
    fn test_table_result_is_display_only() {
        let mut s = session();
        let ret = s.run(b"return {}");
        assert_eq!(success(&s, ret).1, Value::str("[table]"));
    }

    #[test]
    fn test_oversized_result_is_serialization_error() {
        let mut config = BridgeConfig::default();
        config.buffer.capacity = 1024;
        let mut s = Session::new(config, Rc::new(MemoryStore::new())).unwrap();
        let ret = s.run(b"return string.rep('x', 4096)");
        assert!(failure(&s, ret).starts_with("result encoding failed"));
        assert_eq!(s.last_error().map(|e| e.kind), Some(ErrorKind::Serialization));
    }

    #[test]
    fn test_fit_output() {
        assert_eq!(fit_output(b"short".to_vec(), 9, 64), b"short".to_vec());
        let cut = fit_output(vec![b'o'; 60], 9, 64);
        assert_eq!(cut.len(), 64 - 4 - 9);
        assert!(cut.ends_with(b"..."));
        // 结果本身放不下时不动输出
        assert_eq!(fit_output(b"abc".to_vec(), 100, 64), b"abc".to_vec());
    }

    #[test]
    fn test_returned_magnitude_within_capacity() {
        let mut config = BridgeConfig::default();
        config.buffer.capacity = 512;
        config.buffer.reserved_margin = 64;
        let mut s = Session::new(config, Rc::new(MemoryStore::new())).unwrap();

        let ret = s.run(b"for i = 1, 1000 do print('line', i) end return 1");
        assert!(ret > 0 && ret as usize <= 512);
        let (out, _) = success(&s, ret);
        assert!(out.ends_with("..."));

        let ret = s.run(b"error(string.rep('e', 5000))");
        let msg = failure(&s, ret);
        assert!(msg.len() <= 512 - 64);
        assert!(msg.ends_with("..."));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = BridgeConfig::default();
        config.buffer.reserved_margin = 0;
        assert!(matches!(
            Session::new(config, Rc::new(MemoryStore::new())),
            Err(SessionError::Config(_))
        ));
    }

    #[test]
    fn test_memory_stats_and_gc() {
        let s = session();
        let stats = s.memory_stats();
        assert_eq!(stats.buffer_capacity, 64 * 1024);
        assert!(stats.lua_memory_used > 0);
        s.collect_garbage().unwrap();
    }
}
