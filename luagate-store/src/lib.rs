//! Luagate Store
//!
//! Host-owned storage behind Luagate external tables.
//!
//! The interpreter never holds table contents; every read and write goes
//! through a [`HostStorage`] implementation. Storage identity is keyed purely
//! by table id.
//!
//! # Usage
//! ```rust,ignore
//! use luagate_store::{HostStorage, MemoryStore};
//!
//! let store = MemoryStore::new();
//! store.set(1, b"counter", &encoded).unwrap();
//! let image = store.snapshot().unwrap();
//! ```

mod error;
mod keys;
mod memory;
mod r#trait;

pub use error::{StoreError, StoreResult};
pub use keys::{decode_key_list, encode_key_list, key_list_len};
pub use memory::{MemoryStore, SNAPSHOT_MAGIC};
pub use r#trait::HostStorage;
