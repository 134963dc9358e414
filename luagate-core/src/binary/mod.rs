//! Luagate 二进制格式
//!
//! 桥两侧交换的所有字节都在这里定义：单值编码、调用结果帧、字节码头部校验。
//! 所有多字节数值一律小端，与宿主字节序无关，任何实现写出的数据都能被另一实现读取。
//!
//! # 单值
//!
//! ```text
//! ┌──────────┬───────────────────────────────────────┐
//! │ tag (u8) │ payload                               │
//! ├──────────┼───────────────────────────────────────┤
//! │ 0x00 nil │ -                                     │
//! │ 0x01 bool│ u8                                    │
//! │ 0x02 int │ i64 LE                                │
//! │ 0x03 flt │ f64 LE                                │
//! │ 0x04 str │ [len: u32 LE] [bytes]                 │
//! │ 0x05 fbc │ [len: u32 LE] [bytecode]              │
//! │ 0x06 ref │ u16 LE (0xFFFF = 不可序列化)           │
//! └──────────┴───────────────────────────────────────┘
//! ```
//!
//! # 示例
//!
//! ```rust,ignore
//! use luagate_core::binary::{encode_to_vec, decode, Value};
//!
//! let bytes = encode_to_vec(&Value::Int(42))?;
//! assert_eq!(decode(&bytes)?, Value::Int(42));
//! ```

mod codec;
pub mod frame;
pub mod header;
mod tag;
mod value;

pub use codec::{decode, decode_prefix, encode, encode_to_vec, encoded_len, CodecError};
pub use frame::{decode_frame, encode_frame, truncate_with_marker, ReturnCode, TRUNCATION_MARKER};
pub use header::{BytecodeHeader, HeaderError};
pub use tag::Tag;
pub use value::{Value, FUNCTION_REF_NONE};
