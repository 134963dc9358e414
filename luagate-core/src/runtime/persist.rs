//! 函数持久化
//!
//! 脚本函数导出为字节码，原生函数记录为注册表索引。
//!
//! 字节码导出不保留 upvalue：恢复后的闭包如同新定义，捕获变量为空。
//!
//! 加载字节码前必须通过头部校验，存储中的数据可能被篡改。

use super::interp::RESTORED_CHUNK_NAME;
use super::registry;
use crate::binary::header::{self, HeaderError};
use crate::binary::{CodecError, Value, FUNCTION_REF_NONE};
use mlua::{ChunkMode, Function, Lua};
use thiserror::Error;

const TARGET: &str = "luagate::persist";

/// 持久化错误
#[derive(Error, Debug, Clone)]
pub enum PersistError {
    /// 字节码头部校验失败
    #[error("invalid bytecode: {0}")]
    InvalidBytecode(#[from] HeaderError),

    /// 注册表中没有这个索引
    #[error("unknown native function index {0}")]
    UnknownNativeFunction(u16),

    #[error("bytecode of {len} bytes exceeds limit of {max}")]
    BytecodeTooLarge { len: usize, max: usize },

    /// 负载不是函数
    #[error("not a function payload: {0}")]
    NotAFunction(&'static str),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// 解释器拒绝加载
    #[error("bytecode load failed: {0}")]
    Lua(String),
}

/// 持久化选项
#[derive(Debug, Clone, Copy)]
pub struct PersistOptions {
    /// 导出时去掉调试信息
    pub strip_debug: bool,
    /// 允许加载的最大字节码长度
    pub max_bytecode_len: usize,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            strip_debug: true,
            max_bytecode_len: 1024 * 1024,
        }
    }
}

/// 把函数转换为可持久化的值
///
/// 脚本函数得到 `FunctionBytecode`；原生函数得到 `FunctionRef`，
/// 未注册的原生函数索引为 `0xFFFF`，此后无法还原。
pub fn serialize_function(lua: &Lua, function: &Function, options: &PersistOptions) -> Value {
    let bytecode = function.dump(options.strip_debug);
    if !bytecode.is_empty() {
        tracing::trace!(target: TARGET, len = bytecode.len(), "function dumped");
        return Value::FunctionBytecode(bytecode);
    }

    // 原生函数没有字节码
    let index = registry::lookup(lua, function);
    if index == FUNCTION_REF_NONE {
        tracing::debug!(target: TARGET, "native function is not registered");
    } else {
        tracing::trace!(target: TARGET, index, name = registry::name_of(index), "native function ref");
    }
    Value::FunctionRef(index)
}

/// 把函数值还原为可调用的函数
pub fn deserialize_function(
    lua: &Lua,
    value: &Value,
    options: &PersistOptions,
) -> Result<Function, PersistError> {
    match value {
        Value::FunctionBytecode(bytecode) => load_bytecode(lua, bytecode, options),
        Value::FunctionRef(index) => registry::resolve_index(lua, *index).ok_or_else(|| {
            tracing::warn!(target: TARGET, index, "unknown native function index");
            PersistError::UnknownNativeFunction(*index)
        }),
        other => Err(PersistError::NotAFunction(other.type_name())),
    }
}

/// 校验并加载字节码
pub fn load_bytecode(
    lua: &Lua,
    bytecode: &[u8],
    options: &PersistOptions,
) -> Result<Function, PersistError> {
    if bytecode.len() > options.max_bytecode_len {
        tracing::warn!(target: TARGET, len = bytecode.len(), "bytecode rejected: too large");
        return Err(PersistError::BytecodeTooLarge {
            len: bytecode.len(),
            max: options.max_bytecode_len,
        });
    }
    if let Err(err) = header::validate(bytecode) {
        tracing::warn!(target: TARGET, error = %err, "bytecode rejected: bad header");
        return Err(err.into());
    }

    lua.load(bytecode)
        .set_name(RESTORED_CHUNK_NAME)
        .set_mode(ChunkMode::Binary)
        .into_function()
        .map_err(|err| {
            tracing::warn!(target: TARGET, error = %err, "bytecode rejected by loader");
            PersistError::Lua(super::error::lua_error_message(&err))
        })
}

/// 编码后的完整函数负载（标签 + 负载）
pub fn encode_function(
    lua: &Lua,
    function: &Function,
    options: &PersistOptions,
) -> Result<Vec<u8>, PersistError> {
    let value = serialize_function(lua, function, options);
    Ok(crate::binary::encode_to_vec(&value)?)
}

/// 从编码后的负载还原函数
pub fn decode_function(
    lua: &Lua,
    payload: &[u8],
    options: &PersistOptions,
) -> Result<Function, PersistError> {
    let value = crate::binary::decode(payload)?;
    deserialize_function(lua, &value, options)
}
