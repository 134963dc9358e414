//! wasm 导出
//!
//! 宿主存储通过 `env` 模块导入；会话放在 `thread_local!` 中（wasm 单线程）。

use crate::abi::{self, MemoryStats};
use crate::config;
use luagate_config::BufferConfig;
use luagate_core::Session;
use luagate_store::{HostStorage, StoreResult};
use std::cell::RefCell;
use std::rc::Rc;

#[link(wasm_import_module = "env")]
extern "C" {
    fn js_ext_table_set(
        table_id: u32,
        key_ptr: *const u8,
        key_len: usize,
        val_ptr: *const u8,
        val_len: usize,
    ) -> i32;
    fn js_ext_table_get(
        table_id: u32,
        key_ptr: *const u8,
        key_len: usize,
        val_ptr: *mut u8,
        max_len: usize,
    ) -> i32;
    fn js_ext_table_delete(table_id: u32, key_ptr: *const u8, key_len: usize) -> i32;
    fn js_ext_table_size(table_id: u32) -> usize;
    fn js_ext_table_keys(table_id: u32, buf_ptr: *mut u8, max_len: usize) -> i32;
}

thread_local! {
    static SESSION: RefCell<Option<Session>> = const { RefCell::new(None) };
}

/// 通过宿主导入函数实现的存储
struct ImportedStore {
    value_capacity: usize,
}

impl ImportedStore {
    fn new(buffer: &BufferConfig) -> Self {
        Self {
            value_capacity: buffer.value_capacity,
        }
    }
}

impl HostStorage for ImportedStore {
    fn set(&self, table_id: u32, key: &[u8], value: &[u8]) -> StoreResult<()> {
        // SAFETY: 指针和长度来自有效切片，宿主调用期间不会保存它们
        let ret = unsafe {
            js_ext_table_set(table_id, key.as_ptr(), key.len(), value.as_ptr(), value.len())
        };
        abi::status_result("set", ret)
    }

    fn get(&self, table_id: u32, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let mut buf = vec![0u8; self.value_capacity];
        // SAFETY: 宿主最多写入 max_len 字节
        let ret = unsafe {
            js_ext_table_get(table_id, key.as_ptr(), key.len(), buf.as_mut_ptr(), buf.len())
        };
        Ok(abi::get_result(ret, buf.len())?.map(|len| {
            buf.truncate(len);
            buf
        }))
    }

    fn delete(&self, table_id: u32, key: &[u8]) -> StoreResult<()> {
        // SAFETY: 同 set
        let ret = unsafe { js_ext_table_delete(table_id, key.as_ptr(), key.len()) };
        abi::status_result("delete", ret)
    }

    fn size(&self, table_id: u32) -> usize {
        // SAFETY: 无指针参数
        unsafe { js_ext_table_size(table_id) }
    }

    fn keys(&self, table_id: u32, max_len: usize) -> StoreResult<Vec<u8>> {
        let mut buf = vec![0u8; max_len];
        // SAFETY: 宿主最多写入 max_len 字节
        let ret = unsafe { js_ext_table_keys(table_id, buf.as_mut_ptr(), buf.len()) };
        let len = abi::keys_result(ret, max_len)?;
        buf.truncate(len);
        Ok(buf)
    }
}

fn with_session<R>(f: impl FnOnce(&mut Session) -> R) -> Option<R> {
    SESSION.with(|cell| cell.borrow_mut().as_mut().map(f))
}

/// 创建会话，成功返回 0
#[no_mangle]
pub extern "C" fn init() -> i32 {
    let config = config::config().clone();
    let store = Rc::new(ImportedStore::new(&config.buffer));
    match Session::new(config, store) {
        Ok(session) => {
            SESSION.with(|cell| *cell.borrow_mut() = Some(session));
            0
        }
        Err(err) => {
            tracing::error!(target: "luagate::invoke", error = %err, "session init failed");
            -1
        }
    }
}

/// 执行缓冲区前 `input_len` 字节；未初始化时返回 -1
#[no_mangle]
pub extern "C" fn compute(input_len: usize) -> i32 {
    with_session(|session| session.compute(input_len)).unwrap_or(-1)
}

#[no_mangle]
pub extern "C" fn eval(input_len: usize) -> i32 {
    compute(input_len)
}

#[no_mangle]
pub extern "C" fn buffer_ptr() -> *mut u8 {
    with_session(|session| session.buffer_ptr()).unwrap_or(std::ptr::null_mut())
}

#[no_mangle]
pub extern "C" fn buffer_capacity() -> usize {
    with_session(|session| session.buffer_capacity()).unwrap_or(0)
}

#[no_mangle]
pub extern "C" fn get_buffer_ptr() -> *mut u8 {
    buffer_ptr()
}

#[no_mangle]
pub extern "C" fn get_buffer_size() -> usize {
    buffer_capacity()
}

/// 把统计写到 `stats_ptr`，空指针或未初始化时什么也不做
#[no_mangle]
pub extern "C" fn get_memory_stats(stats_ptr: *mut MemoryStats) {
    if stats_ptr.is_null() {
        return;
    }
    if let Some(stats) = with_session(|session| session.memory_stats()) {
        // SAFETY: 宿主传入指向 MemoryStats 大小内存的指针
        unsafe { stats_ptr.write(MemoryStats::new(stats, abi::wasm_pages())) };
    }
}

#[no_mangle]
pub extern "C" fn run_gc() {
    with_session(|session| {
        if let Err(err) = session.collect_garbage() {
            tracing::warn!(target: "luagate::invoke", error = %err, "gc failed");
        }
    });
}
