//! In-memory store implementation

use crate::error::{StoreError, StoreResult};
use crate::keys::{encode_key_list, key_list_len};
use crate::HostStorage;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

type Tables = BTreeMap<u32, BTreeMap<Vec<u8>, Vec<u8>>>;

/// Snapshot image magic: "LGS1"
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"LGS1";

/// An in-memory store implementation.
///
/// Tables live in a `BTreeMap`, so key listings come out in a stable order.
/// Clones share the same data, which lets two sessions over one store model
/// an interpreter restart.
///
/// # Example
/// ```
/// use luagate_store::{HostStorage, MemoryStore};
///
/// let store = MemoryStore::new();
/// let id = store.allocate_table_id().unwrap().unwrap();
/// store.set(id, b"k", b"v").unwrap();
/// assert_eq!(store.get(id, b"k").unwrap(), Some(b"v".to_vec()));
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    first_id: u32,
}

impl MemoryStore {
    /// Create a new empty store that allocates ids from 1.
    pub fn new() -> Self {
        Self::with_first_id(1)
    }

    /// Create a new empty store that allocates ids from `first_id`.
    pub fn with_first_id(first_id: u32) -> Self {
        Self {
            tables: Arc::new(RwLock::new(BTreeMap::new())),
            first_id,
        }
    }

    /// Number of tables known to the store
    pub fn table_count(&self) -> usize {
        self.tables.read().map(|t| t.len()).unwrap_or(0)
    }

    /// Serialize every table into a flat image.
    ///
    /// ```text
    /// "LGS1" [table_count: u32]
    ///   ( [table_id: u32] [entry_count: u32]
    ///     ( [key_len: u32] [key] [val_len: u32] [val] ) * entry_count ) * table_count
    /// ```
    pub fn snapshot(&self) -> StoreResult<Vec<u8>> {
        let tables = self.read_tables()?;
        let mut out = Vec::new();
        out.extend_from_slice(&SNAPSHOT_MAGIC);
        out.extend_from_slice(&(tables.len() as u32).to_le_bytes());
        for (table_id, entries) in tables.iter() {
            out.extend_from_slice(&table_id.to_le_bytes());
            out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
            for (key, value) in entries {
                out.extend_from_slice(&(key.len() as u32).to_le_bytes());
                out.extend_from_slice(key);
                out.extend_from_slice(&(value.len() as u32).to_le_bytes());
                out.extend_from_slice(value);
            }
        }
        Ok(out)
    }

    /// Replace the store contents with a snapshot image.
    ///
    /// The image is fully parsed before anything is replaced, so a malformed
    /// image leaves the store untouched.
    pub fn restore(&self, image: &[u8]) -> StoreResult<()> {
        let mut cursor = Cursor { data: image, offset: 0 };
        if cursor.take(4)? != SNAPSHOT_MAGIC {
            return Err(StoreError::Malformed("bad snapshot magic".to_string()));
        }

        let mut parsed = Tables::new();
        let table_count = cursor.u32()?;
        for _ in 0..table_count {
            let table_id = cursor.u32()?;
            let entry_count = cursor.u32()?;
            let table = parsed.entry(table_id).or_default();
            for _ in 0..entry_count {
                let key_len = cursor.u32()? as usize;
                let key = cursor.take(key_len)?.to_vec();
                let val_len = cursor.u32()? as usize;
                let value = cursor.take(val_len)?.to_vec();
                table.insert(key, value);
            }
        }
        if cursor.offset != image.len() {
            return Err(StoreError::Malformed("trailing bytes after snapshot".to_string()));
        }

        *self.write_tables()? = parsed;
        Ok(())
    }

    fn read_tables(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend(String::from("Lock poisoned")))
    }

    fn write_tables(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend(String::from("Lock poisoned")))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HostStorage for MemoryStore {
    fn allocate_table_id(&self) -> StoreResult<Option<u32>> {
        let mut tables = self.write_tables()?;
        let next = match tables.keys().next_back() {
            Some(&last) if last >= self.first_id => {
                last.checked_add(1).ok_or(StoreError::IdsExhausted)?
            }
            _ => self.first_id,
        };
        tables.insert(next, BTreeMap::new());
        Ok(Some(next))
    }

    fn set(&self, table_id: u32, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let mut tables = self.write_tables()?;
        tables
            .entry(table_id)
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, table_id: u32, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let tables = self.read_tables()?;
        Ok(tables.get(&table_id).and_then(|t| t.get(key)).cloned())
    }

    fn delete(&self, table_id: u32, key: &[u8]) -> StoreResult<()> {
        let mut tables = self.write_tables()?;
        if let Some(table) = tables.get_mut(&table_id) {
            table.remove(key);
        }
        Ok(())
    }

    fn size(&self, table_id: u32) -> usize {
        match self.tables.read() {
            Ok(tables) => tables.get(&table_id).map(|t| t.len()).unwrap_or(0),
            Err(_) => 0,
        }
    }

    fn keys(&self, table_id: u32, max_len: usize) -> StoreResult<Vec<u8>> {
        let tables = self.read_tables()?;
        let Some(table) = tables.get(&table_id) else {
            return Ok(encode_key_list(std::iter::empty()));
        };

        let needed = key_list_len(table.keys().map(Vec::as_slice));
        if needed > max_len {
            return Err(StoreError::BufferTooSmall {
                needed,
                capacity: max_len,
            });
        }
        Ok(encode_key_list(table.keys().map(Vec::as_slice)))
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> StoreResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| StoreError::Malformed(format!("snapshot cut off at {}", self.offset)))?;
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u32(&mut self) -> StoreResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}
