//! 解释器句柄
//!
//! 嵌入的 Lua 5.4 被视为外部黑盒，这里只暴露桥需要的能力：
//! 编译源码、加载字节码、导出函数、重置执行状态、查询内存。

use luagate_config::LimitConfig;
use mlua::{ChunkMode, Function, Lua, LuaOptions, StdLib};

/// 源码块名称，出现在错误信息里
pub const CHUNK_NAME: &str = "=compute";
/// 反序列化函数的块名称
pub const RESTORED_CHUNK_NAME: &str = "=restored";

/// 沙箱加载的标准库
///
/// 不含 io / os / package / debug：脚本没有文件系统和进程能力。
pub fn sandbox_libs() -> StdLib {
    StdLib::COROUTINE | StdLib::TABLE | StdLib::STRING | StdLib::UTF8 | StdLib::MATH
}

/// 拥有 Lua 状态的唯一句柄
pub struct Interpreter {
    lua: Lua,
}

impl Interpreter {
    /// 创建解释器并应用内存上限
    pub fn new(limits: &LimitConfig) -> mlua::Result<Self> {
        // SAFETY: 安全模式会拒绝二进制块，而持久化函数必须以字节码加载。
        // 只打开 sandbox_libs()，不含 package，不存在加载 C 模块的入口；
        // 二进制块只经由 deserialize_function 加载，且之前已通过头部校验。
        let lua = unsafe { Lua::unsafe_new_with(sandbox_libs(), LuaOptions::default()) };
        if let Some(limit) = limits.memory_limit {
            lua.set_memory_limit(limit)?;
        }
        restrict_loaders(&lua)?;
        Ok(Self { lua })
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// 编译源码（只接受文本块）
    pub fn compile(&self, source: &[u8]) -> mlua::Result<Function> {
        self.lua
            .load(source)
            .set_name(CHUNK_NAME)
            .set_mode(ChunkMode::Text)
            .into_function()
    }

    /// 失败后恢复到可复用状态
    ///
    /// mlua 在每次调用返回时已弹出栈，这里释放失败调用遗留的注册表引用并做一次完整回收，
    /// 使下一次调用与本次失败的深度无关。
    pub fn reset(&self) {
        self.lua.expire_registry_values();
        if let Err(err) = self.lua.gc_collect() {
            tracing::warn!(target: "luagate::invoke", error = %err, "gc after failure failed");
        }
    }

    /// 已用内存（字节）
    pub fn used_memory(&self) -> usize {
        self.lua.used_memory()
    }

    /// 完整垃圾回收
    pub fn collect_garbage(&self) -> mlua::Result<()> {
        self.lua.gc_collect()
    }
}

/// 脚本侧的 `load` 只接受文本块，并移除文件加载入口
///
/// 字节码只能经由头部校验后的路径进入解释器。
fn restrict_loaders(lua: &Lua) -> mlua::Result<()> {
    lua.load(
        r#"
        local raw_load = load
        -- env 按参数个数转发：显式传 nil 与省略在 load 中含义不同
        load = function(chunk, name, _mode, ...)
            return raw_load(chunk, name, "t", ...)
        end
        dofile = nil
        loadfile = nil
        "#,
    )
    .set_name("=sandbox")
    .exec()
}
