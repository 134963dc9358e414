//! Luagate Core - value codec, external tables, function persistence
//!
//! Bridges a small, reset-prone Lua interpreter to host-owned storage.
//! Contains the wire codec, the bytecode header gate, and the runtime that
//! runs one request/response cycle over a shared buffer.
//!
//! Configuration is passed explicitly via parameters, not via global state.

pub mod binary;
pub mod runtime;

// Re-export common types
pub use binary::{CodecError, HeaderError, Value};
pub use runtime::{
    ErrorKind, ExternalTable, InvocationState, MemoryStats, PersistError, ProxyError, Session,
    SessionError,
};

// Re-export config and storage types used in the public API
pub use luagate_config::{BridgeConfig, Phase};
pub use luagate_store::{HostStorage, MemoryStore};
