//! Luagate 运行时
//!
//! 把嵌入的解释器和宿主存储连接起来：
//! - `Interpreter`：解释器句柄
//! - 输出捕获与错误报告
//! - 外部表代理与原生函数注册表
//! - 函数持久化
//! - `Session`：一次调用的完整协议

// ==================== 解释器 ====================

pub mod interp;

// ==================== 单次调用的瞬态状态 ====================

pub mod error;
pub mod output;

// ==================== 外部表与持久化 ====================

pub mod marshal;
pub mod persist;
pub mod proxy;
pub mod registry;

// ==================== 会话 ====================

pub mod session;

pub use error::{lua_error_message, ErrorKind, ErrorReporter, ErrorState};
pub use interp::Interpreter;
pub use output::OutputCapture;
pub use persist::{deserialize_function, serialize_function, PersistError, PersistOptions};
pub use proxy::{canonical_key, ExternalTable, ProxyError, TableContext};
pub use session::{InvocationState, MemoryStats, Session, SessionError};
