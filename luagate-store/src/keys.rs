//! Key-list wire format
//!
//! ```text
//! [count: u32 LE] ( [len: u32 LE] [key bytes] ) * count
//! ```
//!
//! Every length is little-endian regardless of host byte order.

use crate::error::{StoreError, StoreResult};

/// Size in bytes of the blob that `encode_key_list` would produce
pub fn key_list_len<'a, I>(keys: I) -> usize
where
    I: IntoIterator<Item = &'a [u8]>,
{
    keys.into_iter().fold(4, |acc, key| acc + 4 + key.len())
}

/// Serialize keys into a key-list blob
pub fn encode_key_list<'a, I>(keys: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let keys: Vec<&[u8]> = keys.into_iter().collect();
    let mut out = Vec::with_capacity(key_list_len(keys.iter().copied()));
    out.extend_from_slice(&(keys.len() as u32).to_le_bytes());
    for key in keys {
        out.extend_from_slice(&(key.len() as u32).to_le_bytes());
        out.extend_from_slice(key);
    }
    out
}

/// Parse a key-list blob
///
/// Every declared length is checked against the remaining input before slicing.
pub fn decode_key_list(blob: &[u8]) -> StoreResult<Vec<Vec<u8>>> {
    let count = read_u32(blob, 0)? as usize;
    let mut offset = 4;
    // 每个 key 至少 4 字节长度前缀，先挡住伪造的巨大 count
    if count > (blob.len() - offset) / 4 {
        return Err(StoreError::Malformed(format!(
            "key count {count} does not fit in {} bytes",
            blob.len()
        )));
    }

    let mut keys = Vec::with_capacity(count);
    for index in 0..count {
        let len = read_u32(blob, offset)? as usize;
        offset += 4;
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= blob.len())
            .ok_or_else(|| {
                StoreError::Malformed(format!("key {index} declares {len} bytes past end of list"))
            })?;
        keys.push(blob[offset..end].to_vec());
        offset = end;
    }

    if offset != blob.len() {
        return Err(StoreError::Malformed(format!(
            "{} trailing bytes after key list",
            blob.len() - offset
        )));
    }
    Ok(keys)
}

fn read_u32(blob: &[u8], offset: usize) -> StoreResult<u32> {
    blob.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| StoreError::Malformed(format!("length field at {offset} is cut off")))
}
