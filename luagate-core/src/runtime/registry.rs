//! 原生函数注册表
//!
//! 原生函数无法导出为字节码，只能以注册表索引的形式持久化。
//! 列表只追加不删改：索引是持久化格式的一部分，调整顺序会让已存数据指向错误的函数。

use crate::binary::FUNCTION_REF_NONE;
use mlua::{Function, Lua, Table, Value as LuaValue};

/// 已知原生函数，索引即位置
pub static NATIVE_FUNCTIONS: &[&str] = &[
    // 基础库
    "print",
    "type",
    "tostring",
    "tonumber",
    "pairs",
    "ipairs",
    "next",
    "select",
    "rawget",
    "rawset",
    "rawequal",
    "rawlen",
    "setmetatable",
    "getmetatable",
    "assert",
    "error",
    "pcall",
    "xpcall",
    "collectgarbage",
    // math
    "math.abs",
    "math.ceil",
    "math.floor",
    "math.fmod",
    "math.max",
    "math.min",
    "math.modf",
    "math.sqrt",
    "math.exp",
    "math.log",
    "math.sin",
    "math.cos",
    "math.tan",
    "math.asin",
    "math.acos",
    "math.atan",
    "math.tointeger",
    "math.type",
    "math.ult",
    "math.random",
    "math.randomseed",
    // string
    "string.byte",
    "string.char",
    "string.find",
    "string.format",
    "string.gmatch",
    "string.gsub",
    "string.len",
    "string.lower",
    "string.upper",
    "string.match",
    "string.rep",
    "string.reverse",
    "string.sub",
    "string.pack",
    "string.unpack",
    "string.packsize",
    // table
    "table.concat",
    "table.insert",
    "table.remove",
    "table.sort",
    "table.unpack",
    "table.pack",
    "table.move",
    // utf8
    "utf8.char",
    "utf8.codepoint",
    "utf8.len",
    "utf8.offset",
    "utf8.codes",
    // coroutine
    "coroutine.create",
    "coroutine.resume",
    "coroutine.yield",
    "coroutine.status",
    "coroutine.wrap",
    "coroutine.isyieldable",
    "coroutine.running",
    "coroutine.close",
    // 外部表 API
    "ext.table",
    "ext.attach",
    "ext.id",
    "ext.size",
    "ext.keys",
    "ext.delete",
];

/// 注册表大小
pub fn len() -> usize {
    NATIVE_FUNCTIONS.len()
}

/// 索引对应的名字
pub fn name_of(index: u16) -> Option<&'static str> {
    if index == FUNCTION_REF_NONE {
        return None;
    }
    NATIVE_FUNCTIONS.get(index as usize).copied()
}

/// 按身份查找函数的索引，未注册返回 `FUNCTION_REF_NONE`
///
/// 每次都从当前全局表解析名字，不缓存函数引用。
pub fn lookup(lua: &Lua, function: &Function) -> u16 {
    let target = function.to_pointer();
    NATIVE_FUNCTIONS
        .iter()
        .position(|name| {
            resolve(lua, name)
                .map(|f| f.to_pointer() == target)
                .unwrap_or(false)
        })
        .and_then(|index| u16::try_from(index).ok())
        .unwrap_or(FUNCTION_REF_NONE)
}

/// 索引还原为当前解释器中的函数
pub fn resolve_index(lua: &Lua, index: u16) -> Option<Function> {
    name_of(index).and_then(|name| resolve(lua, name))
}

/// 解析点分名字，全程使用 raw get，不触发元方法
pub fn resolve(lua: &Lua, dotted: &str) -> Option<Function> {
    let mut parts = dotted.split('.');
    let first = parts.next()?;
    let mut current: LuaValue = lua.globals().raw_get(first).ok()?;
    for part in parts {
        let table: Table = match current {
            LuaValue::Table(t) => t,
            _ => return None,
        };
        current = table.raw_get(part).ok()?;
    }
    match current {
        LuaValue::Function(f) => Some(f),
        _ => None,
    }
}
