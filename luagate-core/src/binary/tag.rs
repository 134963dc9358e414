//! 类型标签定义
//!
//! 每个编码值以 1 字节标签开头，标签值是持久化格式的一部分，不可更改

/// 值类型标签
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// nil，无负载
    Nil = 0x00,
    /// 布尔，1 字节
    Bool = 0x01,
    /// 整数，8 字节小端有符号
    Int = 0x02,
    /// 浮点，8 字节小端 IEEE-754
    Float = 0x03,
    /// 字符串，4 字节长度 + 字节
    Str = 0x04,
    /// 函数字节码，4 字节长度 + 字节码
    FunctionBytecode = 0x05,
    /// 原生函数引用，2 字节注册表索引
    FunctionRef = 0x06,
}

impl Tag {
    /// 从 u8 转换
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Tag::Nil),
            0x01 => Some(Tag::Bool),
            0x02 => Some(Tag::Int),
            0x03 => Some(Tag::Float),
            0x04 => Some(Tag::Str),
            0x05 => Some(Tag::FunctionBytecode),
            0x06 => Some(Tag::FunctionRef),
            _ => None,
        }
    }

    /// 固定长度负载的字节数（变长负载返回 None）
    pub fn fixed_payload_len(self) -> Option<usize> {
        match self {
            Tag::Nil => Some(0),
            Tag::Bool => Some(1),
            Tag::Int | Tag::Float => Some(8),
            Tag::FunctionRef => Some(2),
            Tag::Str | Tag::FunctionBytecode => None,
        }
    }
}
