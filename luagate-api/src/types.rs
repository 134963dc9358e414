//! API 类型定义
//!
//! 宿主侧的调用结果，以及从共享缓冲区解码结果的辅助函数。

use crate::error::BridgeError;
use luagate_core::binary::{decode_frame, ReturnCode};
use luagate_core::Value;

/// 执行输出
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteOutput {
    /// 返回值（只取第一个）
    pub value: Value,
    /// 标准输出捕获
    pub stdout: String,
}

/// 按 compute 的返回值解码缓冲区
///
/// 非负返回值是成功帧长度；负值 `-(n + 1)` 表示缓冲区前 `n` 字节是错误消息。
/// 这里只能看到消息本身，失败一律是 [`BridgeError::Invocation`]。
pub fn decode_outcome(buffer: &[u8], ret: i32) -> Result<ExecuteOutput, BridgeError> {
    match ReturnCode::from_raw(ret) {
        ReturnCode::Success(len) => {
            let frame = buffer.get(..len).ok_or_else(|| {
                BridgeError::InvalidFrame(format!(
                    "frame length {len} exceeds buffer of {} bytes",
                    buffer.len()
                ))
            })?;
            let (output, value) =
                decode_frame(frame).map_err(|e| BridgeError::InvalidFrame(e.to_string()))?;
            Ok(ExecuteOutput {
                value,
                stdout: String::from_utf8_lossy(&output).into_owned(),
            })
        }
        ReturnCode::Error(len) => {
            let message = buffer.get(..len).ok_or_else(|| {
                BridgeError::InvalidFrame(format!(
                    "error length {len} exceeds buffer of {} bytes",
                    buffer.len()
                ))
            })?;
            Err(BridgeError::Invocation(
                String::from_utf8_lossy(message).into_owned(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luagate_core::binary::encode_frame;

    #[test]
    fn test_decode_success() {
        let mut buf = [0u8; 64];
        let n = encode_frame(b"hi\n", &Value::Int(3), &mut buf).unwrap();
        let out = decode_outcome(&buf, n as i32).unwrap();
        assert_eq!(out.value, Value::Int(3));
        assert_eq!(out.stdout, "hi\n");
    }

    #[test]
    fn test_decode_error() {
        let mut buf = [0u8; 16];
        buf[..4].copy_from_slice(b"oops");
        let err = decode_outcome(&buf, -5).unwrap_err();
        assert!(matches!(err, BridgeError::Invocation(ref m) if m == "oops"));
    }

    #[test]
    fn test_decode_empty_error() {
        let buf = [0u8; 4];
        let err = decode_outcome(&buf, -1).unwrap_err();
        assert!(matches!(err, BridgeError::Invocation(ref m) if m.is_empty()));
    }

    #[test]
    fn test_decode_rejects_oversized_length() {
        let buf = [0u8; 8];
        assert!(matches!(decode_outcome(&buf, 9), Err(BridgeError::InvalidFrame(_))));
        assert!(matches!(decode_outcome(&buf, -10), Err(BridgeError::InvalidFrame(_))));
    }

    #[test]
    fn test_decode_rejects_bad_tag() {
        let buf = [0, 0, 0, 0, 0x09];
        assert!(matches!(decode_outcome(&buf, 5), Err(BridgeError::InvalidFrame(_))));
    }
}
