//! 输出捕获
//!
//! 替换全局 `print`，把输出累积到有界缓冲区，而不是写到宿主的标准输出。

use crate::binary::frame::utf8_floor;
use crate::binary::TRUNCATION_MARKER;
use mlua::{Lua, MultiValue, Value as LuaValue};
use std::cell::RefCell;
use std::rc::Rc;

/// 有界输出累加器
#[derive(Debug, Clone)]
pub struct OutputCapture {
    buf: Vec<u8>,
    capacity: usize,
    overflowed: bool,
}

impl OutputCapture {
    /// `capacity` 是整段输出（含截断标记）的上限
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::new(),
            capacity,
            overflowed: false,
        }
    }

    /// 清空，开始新的一次调用
    pub fn reset(&mut self) {
        self.buf.clear();
        self.overflowed = false;
    }

    /// 追加字节，超出部分丢弃并记录溢出
    pub fn push(&mut self, bytes: &[u8]) {
        if self.overflowed {
            return;
        }
        let room = self.capacity.saturating_sub(self.buf.len());
        if bytes.len() > room {
            self.buf.extend_from_slice(&bytes[..room]);
            self.overflowed = true;
        } else {
            self.buf.extend_from_slice(bytes);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty() && !self.overflowed
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// 当前内容（不含截断标记）
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// 取出全部输出，溢出时追加截断标记
    pub fn take(&mut self) -> Vec<u8> {
        let mut out = std::mem::take(&mut self.buf);
        if self.overflowed {
            // 给截断标记腾出位置，且不切开多字节字符
            let keep = utf8_floor(&out, self.capacity.saturating_sub(TRUNCATION_MARKER.len()));
            out.truncate(keep);
            out.extend_from_slice(&TRUNCATION_MARKER[..TRUNCATION_MARKER.len().min(self.capacity)]);
        }
        self.overflowed = false;
        out
    }
}

/// 把一次 print 调用的参数格式化为一行
///
/// 参数以制表符分隔，末尾换行。字符串原样输出，数字、布尔和 nil 输出字面文本，
/// 其余值输出方括号包围的类型名。
pub fn format_print_args(lua: &Lua, args: &MultiValue) -> Vec<u8> {
    let mut line = Vec::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            line.push(b'\t');
        }
        match arg {
            LuaValue::Nil => line.extend_from_slice(b"nil"),
            LuaValue::Boolean(b) => line.extend_from_slice(if *b { b"true".as_slice() } else { b"false" }),
            LuaValue::Integer(i) => line.extend_from_slice(i.to_string().as_bytes()),
            LuaValue::Number(n) => line.extend_from_slice(&number_text(lua, *n)),
            LuaValue::String(s) => line.extend_from_slice(&s.as_bytes()),
            other => {
                line.push(b'[');
                line.extend_from_slice(other.type_name().as_bytes());
                line.push(b']');
            }
        }
    }
    line.push(b'\n');
    line
}

// 与解释器自己的数字格式一致（2.0 输出 "2.0"，1e100 输出 "1e+100"）
fn number_text(lua: &Lua, n: f64) -> Vec<u8> {
    match lua.coerce_string(LuaValue::Number(n)) {
        Ok(Some(s)) => s.as_bytes().to_vec(),
        _ => n.to_string().into_bytes(),
    }
}

/// 用捕获版本替换全局 `print`
pub fn install_print(lua: &Lua, capture: Rc<RefCell<OutputCapture>>) -> mlua::Result<()> {
    let print = lua.create_function(move |lua, args: MultiValue| {
        let line = format_print_args(lua, &args);
        capture.borrow_mut().push(&line);
        Ok(())
    })?;
    lua.globals().set("print", print)
}
