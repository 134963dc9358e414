//! HostStorage trait definition

use crate::error::StoreResult;
use std::vec::Vec;

/// Host-owned key/value storage behind external tables
///
/// The host is the sole owner of the backing store. Every method is a plain
/// synchronous call and must not call back into the interpreter.
///
/// # Implementations
/// - `MemoryStore`: In-memory store with snapshot/restore
/// - the wasm import shim in `luagate-api`
pub trait HostStorage {
    /// Allocate a fresh table id
    ///
    /// Returns `Ok(None)` when the host does not track ids; the bridge then
    /// uses its own counter. A store that tracks ids must fail with
    /// `StoreError::IdsExhausted` rather than return `None` when it runs out.
    fn allocate_table_id(&self) -> StoreResult<Option<u32>> {
        Ok(None)
    }

    /// Store `value` under `key`
    ///
    /// # Arguments
    /// * `table_id` - Host-assigned table id
    /// * `key` - Canonical key bytes
    /// * `value` - Encoded value payload
    fn set(&self, table_id: u32, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Read the payload under `key`
    ///
    /// # Returns
    /// `Ok(None)` when the key is absent
    fn get(&self, table_id: u32, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Remove `key`
    ///
    /// Deleting an absent key succeeds.
    fn delete(&self, table_id: u32, key: &[u8]) -> StoreResult<()>;

    /// Number of stored keys, O(1)
    fn size(&self, table_id: u32) -> usize;

    /// All keys of a table as a key-list blob (see [`crate::encode_key_list`])
    ///
    /// # Arguments
    /// * `max_len` - Largest blob the caller accepts
    ///
    /// # Returns
    /// The blob, or `StoreError::BufferTooSmall` when it would exceed `max_len`
    fn keys(&self, table_id: u32, max_len: usize) -> StoreResult<Vec<u8>>;
}
