//! wasm ABI 的数据布局与宿主返回码约定
//!
//! 这里的代码不依赖 wasm 目标，普通测试即可覆盖；`extern` 胶水在 `wasm` 模块。
//!
//! | 导入函数 | 返回值 |
//! |----------|--------|
//! | `js_ext_table_set` / `delete` | `>= 0` 成功，负数为宿主错误码 |
//! | `js_ext_table_get` | 写入的字节数；负数表示键不存在 |
//! | `js_ext_table_keys` | 写入的字节数；负数表示缓冲区太小，可为 `-(需要的字节数)` |
//! | `js_ext_table_size` | 键数量 |

use luagate_store::{StoreError, StoreResult};

/// `get_memory_stats` 写出的结构
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub io_buffer_size: usize,
    pub lua_memory_used: usize,
    pub wasm_pages: usize,
}

impl MemoryStats {
    pub fn new(session: luagate_core::MemoryStats, wasm_pages: usize) -> Self {
        Self {
            io_buffer_size: session.buffer_capacity,
            lua_memory_used: session.lua_memory_used,
            wasm_pages,
        }
    }
}

/// 当前线性内存页数，非 wasm 目标为 0
pub fn wasm_pages() -> usize {
    #[cfg(target_arch = "wasm32")]
    {
        core::arch::wasm32::memory_size(0)
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        0
    }
}

/// 解释 `set` / `delete` 的返回码
pub fn status_result(op: &'static str, ret: i32) -> StoreResult<()> {
    if ret < 0 {
        Err(StoreError::Backend(format!("host {op} failed with code {ret}")))
    } else {
        Ok(())
    }
}

/// 解释 `get` 的返回码，`Ok(None)` 表示键不存在
pub fn get_result(ret: i32, max_len: usize) -> StoreResult<Option<usize>> {
    if ret < 0 {
        return Ok(None);
    }
    let len = ret as usize;
    if len > max_len {
        return Err(StoreError::Malformed(format!(
            "host reported {len} bytes for a {max_len} byte buffer"
        )));
    }
    Ok(Some(len))
}

/// 解释 `keys` 的返回码
pub fn keys_result(ret: i32, max_len: usize) -> StoreResult<usize> {
    if ret < 0 {
        let reported = ret.unsigned_abs() as usize;
        return Err(StoreError::BufferTooSmall {
            needed: reported.max(max_len.saturating_add(1)),
            capacity: max_len,
        });
    }
    let len = ret as usize;
    if len > max_len {
        return Err(StoreError::Malformed(format!(
            "host reported {len} bytes for a {max_len} byte buffer"
        )));
    }
    Ok(len)
}
