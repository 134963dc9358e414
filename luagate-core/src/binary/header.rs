//! Lua 5.4 字节码头部校验
//!
//! 持久化存储中的字节码可能被篡改，加载前必须逐字段校验头部。
//!
//! ```text
//! ┌──────────────────────────────┬────────┐
//! │ signature   "\x1bLua"        │ 4      │
//! │ version     0x54             │ 1      │
//! │ format      0                │ 1      │
//! │ LUAC_DATA   "\x19\x93\r\n\x1a\n" │ 6  │
//! │ sizeof(Instruction) = 4      │ 1      │
//! │ sizeof(lua_Integer) = 8      │ 1      │
//! │ sizeof(lua_Number)  = 8      │ 1      │
//! │ LUAC_INT    0x5678 (i64 LE)  │ 8      │
//! │ LUAC_NUM    370.5  (f64 LE)  │ 8      │
//! ├──────────────────────────────┼────────┤
//! │ upvalue count                │ 1      │
//! └──────────────────────────────┴────────┘
//! ```

use thiserror::Error;

/// 签名
pub const LUA_SIGNATURE: [u8; 4] = *b"\x1bLua";
/// Lua 5.4
pub const LUAC_VERSION: u8 = 0x54;
/// 官方格式
pub const LUAC_FORMAT: u8 = 0;
/// 用于检测换行转换等传输损坏
pub const LUAC_DATA: [u8; 6] = *b"\x19\x93\r\n\x1a\n";
pub const INSTRUCTION_SIZE: u8 = 4;
pub const INTEGER_SIZE: u8 = 8;
pub const NUMBER_SIZE: u8 = 8;
pub const LUAC_INT: i64 = 0x5678;
pub const LUAC_NUM: f64 = 370.5;

/// 头部固定部分长度
pub const HEADER_SIZE: usize = 31;

/// 头部校验错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeaderError {
    #[error("bytecode too short: {0} bytes")]
    TooShort(usize),

    #[error("bad signature")]
    BadSignature,

    #[error("unsupported version 0x{0:02x}")]
    UnsupportedVersion(u8),

    #[error("unsupported format {0}")]
    UnsupportedFormat(u8),

    #[error("corrupted LUAC_DATA")]
    CorruptedData,

    #[error("{what} size mismatch: expected {expected}, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: u8,
        actual: u8,
    },

    #[error("integer format mismatch: got 0x{0:x}")]
    IntegerMismatch(i64),

    #[error("float format mismatch: got {0}")]
    FloatMismatch(f64),
}

/// 校验通过的头部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BytecodeHeader {
    pub version: u8,
    pub format: u8,
    /// 主函数 upvalue 数量
    pub upvalue_count: u8,
}

impl BytecodeHeader {
    /// 逐字段校验，第一处不符即返回错误
    pub fn parse(bytes: &[u8]) -> Result<Self, HeaderError> {
        // 至少还需要 upvalue 计数字节
        if bytes.len() <= HEADER_SIZE {
            // 签名错误优先报告，便于区分“不是字节码”和“字节码被截断”
            if bytes.len() >= 4 && bytes[..4] != LUA_SIGNATURE {
                return Err(HeaderError::BadSignature);
            }
            return Err(HeaderError::TooShort(bytes.len()));
        }

        if bytes[..4] != LUA_SIGNATURE {
            return Err(HeaderError::BadSignature);
        }
        if bytes[4] != LUAC_VERSION {
            return Err(HeaderError::UnsupportedVersion(bytes[4]));
        }
        if bytes[5] != LUAC_FORMAT {
            return Err(HeaderError::UnsupportedFormat(bytes[5]));
        }
        if bytes[6..12] != LUAC_DATA {
            return Err(HeaderError::CorruptedData);
        }

        check_size("instruction", INSTRUCTION_SIZE, bytes[12])?;
        check_size("integer", INTEGER_SIZE, bytes[13])?;
        check_size("number", NUMBER_SIZE, bytes[14])?;

        let mut int_bytes = [0u8; 8];
        int_bytes.copy_from_slice(&bytes[15..23]);
        let luac_int = i64::from_le_bytes(int_bytes);
        if luac_int != LUAC_INT {
            return Err(HeaderError::IntegerMismatch(luac_int));
        }

        let mut num_bytes = [0u8; 8];
        num_bytes.copy_from_slice(&bytes[23..31]);
        let luac_num = f64::from_le_bytes(num_bytes);
        if luac_num != LUAC_NUM {
            return Err(HeaderError::FloatMismatch(luac_num));
        }

        Ok(Self {
            version: bytes[4],
            format: bytes[5],
            upvalue_count: bytes[HEADER_SIZE],
        })
    }
}

/// 是否为合法的 Lua 5.4 字节码
pub fn validate(bytes: &[u8]) -> Result<(), HeaderError> {
    BytecodeHeader::parse(bytes).map(|_| ())
}

fn check_size(what: &'static str, expected: u8, actual: u8) -> Result<(), HeaderError> {
    if actual != expected {
        return Err(HeaderError::SizeMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

/// 构造一个合法头部（测试用）
#[cfg(test)]
pub(crate) fn sample_header() -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE + 1);
    out.extend_from_slice(&LUA_SIGNATURE);
    out.push(LUAC_VERSION);
    out.push(LUAC_FORMAT);
    out.extend_from_slice(&LUAC_DATA);
    out.extend_from_slice(&[INSTRUCTION_SIZE, INTEGER_SIZE, NUMBER_SIZE]);
    out.extend_from_slice(&LUAC_INT.to_le_bytes());
    out.extend_from_slice(&LUAC_NUM.to_le_bytes());
    out.push(1);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_header() {
        let header = BytecodeHeader::parse(&sample_header()).unwrap();
        assert_eq!(header.version, 0x54);
        assert_eq!(header.format, 0);
        assert_eq!(header.upvalue_count, 1);
    }

    #[test]
    fn test_too_short() {
        assert_eq!(BytecodeHeader::parse(&[]), Err(HeaderError::TooShort(0)));
        let mut bytes = sample_header();
        bytes.truncate(HEADER_SIZE);
        assert_eq!(
            BytecodeHeader::parse(&bytes),
            Err(HeaderError::TooShort(HEADER_SIZE))
        );
    }

    #[test]
    fn test_bad_signature() {
        let mut bytes = sample_header();
        bytes[0] = b'#';
        assert_eq!(BytecodeHeader::parse(&bytes), Err(HeaderError::BadSignature));
        // 源码文本不是字节码
        assert_eq!(
            BytecodeHeader::parse(b"return os.execute('rm -rf /') -- padding padding"),
            Err(HeaderError::BadSignature)
        );
    }

    #[test]
    fn test_wrong_version() {
        let mut bytes = sample_header();
        bytes[4] = 0x53;
        assert_eq!(
            BytecodeHeader::parse(&bytes),
            Err(HeaderError::UnsupportedVersion(0x53))
        );
    }

    #[test]
    fn test_wrong_format() {
        let mut bytes = sample_header();
        bytes[5] = 1;
        assert_eq!(BytecodeHeader::parse(&bytes), Err(HeaderError::UnsupportedFormat(1)));
    }

    #[test]
    fn test_corrupted_data() {
        // 模拟 \r\n 被转换为 \n
        let mut bytes = sample_header();
        bytes[8] = b'\n';
        assert_eq!(BytecodeHeader::parse(&bytes), Err(HeaderError::CorruptedData));
    }

    #[test]
    fn test_size_mismatch() {
        let mut bytes = sample_header();
        bytes[13] = 4;
        assert_eq!(
            BytecodeHeader::parse(&bytes),
            Err(HeaderError::SizeMismatch {
                what: "integer",
                expected: 8,
                actual: 4
            })
        );
    }

    #[test]
    fn test_endianness_check() {
        let mut bytes = sample_header();
        bytes[15..23].copy_from_slice(&LUAC_INT.to_be_bytes());
        assert!(matches!(
            BytecodeHeader::parse(&bytes),
            Err(HeaderError::IntegerMismatch(_))
        ));

        let mut bytes = sample_header();
        bytes[23..31].copy_from_slice(&LUAC_NUM.to_be_bytes());
        assert!(matches!(
            BytecodeHeader::parse(&bytes),
            Err(HeaderError::FloatMismatch(_))
        ));
    }
}
