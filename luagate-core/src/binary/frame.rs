//! 调用结果帧
//!
//! ```text
//! 成功: [output_len: u32 LE] [output bytes] [result tag] [result payload]
//! 失败: [message bytes]，compute 返回 -(message_len + 1)
//! ```

use super::codec::{decode_prefix, encode, encoded_len, CodecError};
use super::value::Value;

/// 超出预算时附加的截断标记
pub const TRUNCATION_MARKER: &[u8] = b"...";

/// 成功帧的总长度
pub fn frame_len(output: &[u8], value: &Value) -> usize {
    4 + output.len() + encoded_len(value)
}

/// 把输出和结果写入 `buf`
///
/// 空间不足时返回 `BufferTooSmall`，不写入任何内容。
pub fn encode_frame(output: &[u8], value: &Value, buf: &mut [u8]) -> Result<usize, CodecError> {
    let needed = frame_len(output, value);
    if needed > buf.len() {
        return Err(CodecError::BufferTooSmall {
            needed,
            available: buf.len(),
        });
    }
    let output_len = u32::try_from(output.len()).map_err(|_| CodecError::BufferTooSmall {
        needed,
        available: buf.len(),
    })?;

    buf[..4].copy_from_slice(&output_len.to_le_bytes());
    let value_start = 4 + output.len();
    buf[4..value_start].copy_from_slice(output);
    let written = encode(value, &mut buf[value_start..])?;
    Ok(value_start + written)
}

/// 解析成功帧，返回 (输出, 结果)
pub fn decode_frame(buf: &[u8]) -> Result<(Vec<u8>, Value), CodecError> {
    let len_bytes: [u8; 4] = buf
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(CodecError::Truncated {
            needed: 4,
            available: buf.len(),
        })?;
    let output_len = u32::from_le_bytes(len_bytes) as usize;
    let value_start = 4usize
        .checked_add(output_len)
        .filter(|end| *end <= buf.len())
        .ok_or(CodecError::Truncated {
            needed: 4usize.saturating_add(output_len),
            available: buf.len(),
        })?;

    let output = buf[4..value_start].to_vec();
    let (value, _) = decode_prefix(&buf[value_start..])?;
    Ok((output, value))
}

/// compute 返回值的含义
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCode {
    /// 成功帧长度
    Success(usize),
    /// 错误消息长度
    Error(usize),
}

impl ReturnCode {
    /// 按符号区分成功与失败
    pub fn from_raw(ret: i32) -> Self {
        if ret >= 0 {
            ReturnCode::Success(ret as usize)
        } else {
            // -(len + 1)，i32::MIN 也不会溢出
            ReturnCode::Error((-(ret as i64) - 1) as usize)
        }
    }

    /// 编码为 compute 返回值，超出 i32 范围时返回 None
    pub fn to_raw(self) -> Option<i32> {
        match self {
            ReturnCode::Success(len) => i32::try_from(len).ok(),
            ReturnCode::Error(len) => i32::try_from(len).ok().and_then(|n| n.checked_add(1)).map(|n| -n),
        }
    }
}

/// 把 `text` 截断到 `budget` 字节以内
///
/// 超出时保留尽可能多的完整 UTF-8 字符，然后追加 [`TRUNCATION_MARKER`]。
/// 结果长度永远不超过 `budget`。
pub fn truncate_with_marker(text: &[u8], budget: usize) -> Vec<u8> {
    if text.len() <= budget {
        return text.to_vec();
    }
    if budget < TRUNCATION_MARKER.len() {
        return TRUNCATION_MARKER[..budget].to_vec();
    }

    let keep = utf8_floor(text, budget - TRUNCATION_MARKER.len());
    let mut out = Vec::with_capacity(keep + TRUNCATION_MARKER.len());
    out.extend_from_slice(&text[..keep]);
    out.extend_from_slice(TRUNCATION_MARKER);
    out
}

/// 不超过 `limit` 且不切开多字节字符的最大切点
pub fn utf8_floor(text: &[u8], limit: usize) -> usize {
    let mut cut = limit.min(text.len());
    // 往回跳过续字节 10xxxxxx
    while cut > 0 && cut < text.len() && (text[cut] & 0xC0) == 0x80 {
        cut -= 1;
    }
    cut
}
