//! 跨桥传输的值

use super::tag::Tag;

/// `FunctionRef` 中表示“不可序列化”的保留索引
pub const FUNCTION_REF_NONE: u16 = 0xFFFF;

/// 跨桥传输的单个值
///
/// 封闭的标签联合：解释器里的表、userdata、线程等没有对应标签。
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// 任意字节，不要求 UTF-8
    Str(Vec<u8>),
    /// 解释器导出的函数字节码
    FunctionBytecode(Vec<u8>),
    /// 原生函数注册表索引
    FunctionRef(u16),
}

impl Value {
    /// 对应的类型标签
    pub fn tag(&self) -> Tag {
        match self {
            Value::Nil => Tag::Nil,
            Value::Bool(_) => Tag::Bool,
            Value::Int(_) => Tag::Int,
            Value::Float(_) => Tag::Float,
            Value::Str(_) => Tag::Str,
            Value::FunctionBytecode(_) => Tag::FunctionBytecode,
            Value::FunctionRef(_) => Tag::FunctionRef,
        }
    }

    /// 类型名，用于错误信息
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::FunctionBytecode(_) => "function_bytecode",
            Value::FunctionRef(_) => "function_ref",
        }
    }

    /// 便捷构造字符串值
    pub fn str(s: impl AsRef<[u8]>) -> Self {
        Value::Str(s.as_ref().to_vec())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            Value::FunctionBytecode(code) => write!(f, "[function bytecode {} bytes]", code.len()),
            Value::FunctionRef(FUNCTION_REF_NONE) => write!(f, "[function ref none]"),
            Value::FunctionRef(index) => write!(f, "[function ref {index}]"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.as_bytes().to_vec())
    }
}
