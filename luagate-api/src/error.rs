//! API 错误类型
//!
//! 统一各层错误，并提供结构化错误报告。

use luagate_config::ConfigError;
use luagate_core::runtime::ErrorState;
use luagate_core::{CodecError, ErrorKind, HeaderError, PersistError, ProxyError, SessionError};
use luagate_store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// 统一的 Luagate 错误类型
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Codec(#[from] CodecError),

    #[error("{0}")]
    Header(#[from] HeaderError),

    #[error("{0}")]
    Persist(#[from] PersistError),

    #[error("{0}")]
    Proxy(#[from] ProxyError),

    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("compile error: {0}")]
    Compile(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid input: {0}")]
    Input(String),

    /// 只拿到缓冲区里的消息，不知道分类
    #[error("invocation failed: {0}")]
    Invocation(String),

    #[error("invalid result frame: {0}")]
    InvalidFrame(String),
}

impl BridgeError {
    /// 由会话记录的错误状态构造
    pub fn from_state(state: &ErrorState) -> Self {
        let message = state.message_text();
        match state.kind {
            ErrorKind::Compile => BridgeError::Compile(message),
            ErrorKind::Runtime => BridgeError::Runtime(message),
            ErrorKind::Serialization => BridgeError::Serialization(message),
            ErrorKind::Input => BridgeError::Input(message),
        }
    }

    /// 获取错误阶段名称
    pub fn phase(&self) -> &'static str {
        match self {
            BridgeError::Config(_) => "config",
            BridgeError::Store(_) | BridgeError::Proxy(_) => "table",
            BridgeError::Codec(_) | BridgeError::InvalidFrame(_) => "codec",
            BridgeError::Header(_) | BridgeError::Persist(_) => "persist",
            BridgeError::Session(_)
            | BridgeError::Compile(_)
            | BridgeError::Runtime(_)
            | BridgeError::Serialization(_)
            | BridgeError::Input(_)
            | BridgeError::Invocation(_) => "invoke",
        }
    }

    /// 可用于程序化处理的错误类型名
    pub fn error_kind(&self) -> &'static str {
        match self {
            BridgeError::Config(_) => "ConfigError",
            BridgeError::Store(e) => match e {
                StoreError::NotFound { .. } => "TableNotFound",
                StoreError::BufferTooSmall { .. } => "BufferTooSmall",
                StoreError::Malformed(_) => "MalformedStoreData",
                StoreError::IdsExhausted => "TableIdsExhausted",
                StoreError::Backend(_) => "StoreBackend",
            },
            BridgeError::Codec(e) => codec_kind(e),
            BridgeError::Header(_) => "InvalidBytecode",
            BridgeError::Persist(e) => match e {
                PersistError::InvalidBytecode(_) => "InvalidBytecode",
                PersistError::UnknownNativeFunction(_) => "UnknownNativeFunction",
                PersistError::BytecodeTooLarge { .. } => "BytecodeTooLarge",
                PersistError::NotAFunction(_) => "NotAFunction",
                PersistError::Codec(e) => codec_kind(e),
                PersistError::Lua(_) => "LuaError",
            },
            BridgeError::Proxy(e) => match e {
                ProxyError::InvalidKey(_) => "InvalidKey",
                ProxyError::Store(_) => "StoreError",
                ProxyError::Codec(e) => codec_kind(e),
                ProxyError::Persist(_) => "PersistError",
                ProxyError::IdsExhausted => "TableIdsExhausted",
            },
            BridgeError::Session(_) => "SessionError",
            BridgeError::Compile(_) => "CompileError",
            BridgeError::Runtime(_) => "RuntimeError",
            BridgeError::Serialization(_) => "SerializationError",
            BridgeError::Input(_) => "InputError",
            BridgeError::Invocation(_) => "InvocationError",
            BridgeError::InvalidFrame(_) => "InvalidFrame",
        }
    }

    /// 转换为结构化错误报告
    ///
    /// 宿主可以直接打印，也可以序列化为 JSON 交给上层。
    ///
    /// # Example
    /// ```ignore
    /// match luagate_api::run(source, &config) {
    ///     Err(e) => {
    ///         let report = e.to_report();
    ///         println!("{}", report);
    ///         let json = report.to_json();
    ///     }
    ///     Ok(out) => { /* ... */ }
    /// }
    /// ```
    pub fn to_report(&self) -> ErrorReport {
        let message = match self {
            // 这几类的 Display 带了前缀，报告里只要原始消息
            BridgeError::Compile(msg)
            | BridgeError::Runtime(msg)
            | BridgeError::Serialization(msg)
            | BridgeError::Input(msg)
            | BridgeError::Invocation(msg)
            | BridgeError::InvalidFrame(msg) => msg.clone(),
            other => other.to_string(),
        };
        ErrorReport {
            phase: self.phase(),
            error_kind: self.error_kind().to_string(),
            message,
        }
    }
}

fn codec_kind(err: &CodecError) -> &'static str {
    match err {
        CodecError::BufferTooSmall { .. } => "BufferTooSmall",
        CodecError::Truncated { .. } => "Truncated",
        CodecError::InvalidTag(_) => "InvalidTag",
        CodecError::UnsupportedType(_) => "UnsupportedType",
    }
}

/// 结构化错误报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    /// 错误阶段: config, codec, table, persist, invoke
    pub phase: &'static str,
    /// 错误类型（可用于程序化处理）
    pub error_kind: String,
    /// 人类可读的错误消息
    pub message: String,
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.phase, self.error_kind, self.message)
    }
}

impl ErrorReport {
    /// 转换为 JSON 格式
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"phase\":\"{}\",\"error_kind\":\"{}\",\"message\":\"\"}}",
                self.phase, self.error_kind
            )
        })
    }
}
