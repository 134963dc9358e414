//! 单值编解码
//!
//! ```text
//! [tag: u8] [payload]
//!   nil               -
//!   bool              u8
//!   int               i64 LE
//!   float             f64 LE
//!   str               [len: u32 LE] [bytes]
//!   function_bytecode [len: u32 LE] [bytecode]
//!   function_ref      u16 LE
//! ```

use super::tag::Tag;
use super::value::Value;
use thiserror::Error;

/// 编解码错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// 目标缓冲区不足
    #[error("buffer too small: need {needed} bytes, {available} available")]
    BufferTooSmall { needed: usize, available: usize },

    /// 输入在声明的负载结束前截断
    #[error("truncated input: need {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    /// 未知标签
    #[error("invalid tag 0x{0:02x}")]
    InvalidTag(u8),

    /// 值没有对应的标签
    #[error("unsupported type: {0}")]
    UnsupportedType(&'static str),
}

/// 长度前缀的大小
const LEN_PREFIX: usize = 4;

const TARGET: &str = "luagate::codec";

/// 编码后的总字节数（含标签）
pub fn encoded_len(value: &Value) -> usize {
    1 + match value {
        Value::Nil => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 8,
        Value::Str(bytes) | Value::FunctionBytecode(bytes) => LEN_PREFIX + bytes.len(),
        Value::FunctionRef(_) => 2,
    }
}

/// 把 `value` 编码到 `buf` 开头
///
/// # Returns
/// 写入的字节数。缓冲区不足时不写入任何内容。
pub fn encode(value: &Value, buf: &mut [u8]) -> Result<usize, CodecError> {
    let needed = encoded_len(value);
    if needed > buf.len() {
        tracing::debug!(
            target: TARGET,
            tag = value.type_name(),
            needed,
            available = buf.len(),
            "encode buffer too small"
        );
        return Err(CodecError::BufferTooSmall {
            needed,
            available: buf.len(),
        });
    }

    buf[0] = value.tag() as u8;
    let payload = &mut buf[1..needed];
    match value {
        Value::Nil => {}
        Value::Bool(b) => payload[0] = u8::from(*b),
        Value::Int(i) => payload.copy_from_slice(&i.to_le_bytes()),
        Value::Float(x) => payload.copy_from_slice(&x.to_le_bytes()),
        Value::Str(bytes) | Value::FunctionBytecode(bytes) => {
            let len = u32::try_from(bytes.len()).map_err(|_| CodecError::BufferTooSmall {
                needed,
                available: u32::MAX as usize,
            })?;
            payload[..LEN_PREFIX].copy_from_slice(&len.to_le_bytes());
            payload[LEN_PREFIX..].copy_from_slice(bytes);
        }
        Value::FunctionRef(index) => payload.copy_from_slice(&index.to_le_bytes()),
    }
    Ok(needed)
}

/// 编码为新分配的字节数组
pub fn encode_to_vec(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut out = vec![0u8; encoded_len(value)];
    encode(value, &mut out)?;
    Ok(out)
}

/// 解码一个完整的值，忽略其后的多余字节
pub fn decode(buf: &[u8]) -> Result<Value, CodecError> {
    decode_prefix(buf).map(|(value, _)| value)
}

/// 从 `buf` 开头解码一个值
///
/// # Returns
/// 值和消耗的字节数。所有长度都在读取负载之前校验。
pub fn decode_prefix(buf: &[u8]) -> Result<(Value, usize), CodecError> {
    read_value(buf).inspect_err(|err| {
        tracing::debug!(target: TARGET, len = buf.len(), error = %err, "decode failed");
    })
}

fn read_value(buf: &[u8]) -> Result<(Value, usize), CodecError> {
    let (&tag_byte, rest) = buf.split_first().ok_or(CodecError::Truncated {
        needed: 1,
        available: 0,
    })?;
    let tag = Tag::from_u8(tag_byte).ok_or(CodecError::InvalidTag(tag_byte))?;

    let (value, payload_len) = match tag {
        Tag::Nil => (Value::Nil, 0),
        Tag::Bool => {
            let b = take::<1>(rest)?;
            (Value::Bool(b[0] != 0), 1)
        }
        Tag::Int => (Value::Int(i64::from_le_bytes(take::<8>(rest)?)), 8),
        Tag::Float => (Value::Float(f64::from_le_bytes(take::<8>(rest)?)), 8),
        Tag::FunctionRef => (Value::FunctionRef(u16::from_le_bytes(take::<2>(rest)?)), 2),
        Tag::Str | Tag::FunctionBytecode => {
            let len = u32::from_le_bytes(take::<4>(rest)?) as usize;
            let end = LEN_PREFIX
                .checked_add(len)
                .filter(|end| *end <= rest.len())
                .ok_or(CodecError::Truncated {
                    needed: 1 + LEN_PREFIX.saturating_add(len),
                    available: buf.len(),
                })?;
            let bytes = rest[LEN_PREFIX..end].to_vec();
            let value = if tag == Tag::Str {
                Value::Str(bytes)
            } else {
                Value::FunctionBytecode(bytes)
            };
            (value, end)
        }
    };

    Ok((value, 1 + payload_len))
}

fn take<const N: usize>(payload: &[u8]) -> Result<[u8; N], CodecError> {
    payload
        .get(..N)
        .and_then(|b| <[u8; N]>::try_from(b).ok())
        .ok_or(CodecError::Truncated {
            needed: 1 + N,
            available: 1 + payload.len(),
        })
}
