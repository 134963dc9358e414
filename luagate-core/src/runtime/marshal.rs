//! 解释器值与线上值之间的转换

use super::persist::{deserialize_function, serialize_function, PersistError, PersistOptions};
use crate::binary::{CodecError, Value};
use mlua::{Lua, Value as LuaValue};

/// 转换为线上值，没有标签的类型报 `UnsupportedType`
///
/// 用于外部表写入：写进存储的必须能原样读回。
pub fn to_wire(lua: &Lua, value: &LuaValue, options: &PersistOptions) -> Result<Value, CodecError> {
    Ok(match value {
        LuaValue::Nil => Value::Nil,
        LuaValue::Boolean(b) => Value::Bool(*b),
        LuaValue::Integer(i) => Value::Int(*i),
        LuaValue::Number(n) => Value::Float(*n),
        LuaValue::String(s) => Value::Str(s.as_bytes().to_vec()),
        LuaValue::Function(f) => serialize_function(lua, f, options),
        other => return Err(CodecError::UnsupportedType(other.type_name())),
    })
}

/// 转换调用结果
///
/// 表、线程、userdata 退化为方括号类型名字符串，仅供显示，不能还原。
pub fn result_to_wire(lua: &Lua, value: &LuaValue, options: &PersistOptions) -> Value {
    match to_wire(lua, value, options) {
        Ok(v) => v,
        Err(_) => Value::Str(format!("[{}]", value.type_name()).into_bytes()),
    }
}

/// 线上值转换回解释器值
pub fn from_wire(lua: &Lua, value: &Value, options: &PersistOptions) -> Result<LuaValue, PersistError> {
    Ok(match value {
        Value::Nil => LuaValue::Nil,
        Value::Bool(b) => LuaValue::Boolean(*b),
        Value::Int(i) => LuaValue::Integer(*i),
        Value::Float(n) => LuaValue::Number(*n),
        Value::Str(bytes) => LuaValue::String(
            lua.create_string(bytes)
                .map_err(|e| PersistError::Lua(e.to_string()))?,
        ),
        Value::FunctionBytecode(_) | Value::FunctionRef(_) => {
            LuaValue::Function(deserialize_function(lua, value, options)?)
        }
    })
}
