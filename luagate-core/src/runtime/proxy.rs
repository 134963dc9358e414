//! 外部表代理
//!
//! 脚本看到的是普通的表，读写却全部转发到宿主存储。
//! 代理不缓存任何条目，每次访问都是一次宿主调用；存储身份只由表 id 决定，
//! 同一 id 的两个代理互相可见。
//!
//! # 脚本接口
//!
//! ```lua
//! local t = ext.table()        -- 新表
//! t.name = "x"                 -- host set
//! print(t.name, #t)            -- host get / size
//! for k, v in pairs(t) do end  -- host keys + get
//! ext.delete(t, "name")        -- host delete
//! local same = ext.attach(ext.id(t))
//! ```

use super::marshal::{from_wire, to_wire};
use super::persist::{PersistError, PersistOptions};
use crate::binary::{decode, encode_to_vec, CodecError, Value};
use luagate_config::BridgeConfig;
use luagate_store::{decode_key_list, HostStorage, StoreError};
use mlua::{
    AnyUserData, Lua, MetaMethod, MultiValue, UserData, UserDataMethods, Value as LuaValue,
};
use std::cell::Cell;
use std::rc::Rc;
use thiserror::Error;

const TARGET: &str = "luagate::table";

/// 外部表操作错误
#[derive(Error, Debug, Clone)]
pub enum ProxyError {
    /// 键无法规范化
    #[error("invalid table key: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    /// 表 id 耗尽
    #[error("table id space exhausted")]
    IdsExhausted,
}

impl From<ProxyError> for mlua::Error {
    fn from(err: ProxyError) -> Self {
        mlua::Error::RuntimeError(err.to_string())
    }
}

/// 所有代理共享的上下文
pub struct TableContext {
    store: Rc<dyn HostStorage>,
    next_id: Cell<u32>,
    persist: PersistOptions,
    keys_capacity: usize,
    allow_attach: bool,
}

impl TableContext {
    pub fn new(store: Rc<dyn HostStorage>, config: &BridgeConfig) -> Self {
        Self {
            store,
            next_id: Cell::new(config.tables.first_table_id),
            persist: PersistOptions {
                strip_debug: config.persist.strip_debug,
                max_bytecode_len: config.limits.max_bytecode_len,
            },
            keys_capacity: config.buffer.keys_capacity,
            allow_attach: config.tables.allow_attach,
        }
    }

    pub fn store(&self) -> &dyn HostStorage {
        self.store.as_ref()
    }

    pub fn persist_options(&self) -> &PersistOptions {
        &self.persist
    }

    /// 分配新表 id
    ///
    /// 优先由宿主分配；宿主不跟踪 id 时使用桥内计数器。
    /// 宿主 id 耗尽时报错，不退回计数器，避免新表与已有表重叠。
    pub fn allocate_id(&self) -> Result<u32, ProxyError> {
        match self.store.allocate_table_id() {
            Ok(Some(id)) => return Ok(id),
            Ok(None) => {}
            Err(StoreError::IdsExhausted) => return Err(ProxyError::IdsExhausted),
            Err(err) => return Err(err.into()),
        }
        let id = self.next_id.get();
        let next = id.checked_add(1).ok_or(ProxyError::IdsExhausted)?;
        self.next_id.set(next);
        Ok(id)
    }
}

/// 把脚本键规范化为存储键
///
/// 整数和整值浮点数都写成十进制整数文本（`1` 与 `1.0` 指向同一条目），
/// 其余浮点数用最短往返文本，字符串按原样字节使用。
pub fn canonical_key(key: &LuaValue) -> Result<Vec<u8>, ProxyError> {
    match key {
        LuaValue::Integer(i) => Ok(i.to_string().into_bytes()),
        LuaValue::Number(n) => canonical_float_key(*n),
        LuaValue::String(s) => Ok(s.as_bytes().to_vec()),
        other => Err(ProxyError::InvalidKey(format!("{} keys are not supported", other.type_name()))),
    }
}

fn canonical_float_key(n: f64) -> Result<Vec<u8>, ProxyError> {
    if n.is_nan() {
        return Err(ProxyError::InvalidKey("NaN".to_string()));
    }
    // i64 可精确表示的整值范围 [-2^63, 2^63)
    if n.fract() == 0.0 && n >= -9_223_372_036_854_775_808.0 && n < 9_223_372_036_854_775_808.0 {
        return Ok((n as i64).to_string().into_bytes());
    }
    Ok(n.to_string().into_bytes())
}

/// 绑定到某个表 id 的代理
#[derive(Clone)]
pub struct ExternalTable {
    id: u32,
    ctx: Rc<TableContext>,
}

impl ExternalTable {
    pub fn new(id: u32, ctx: Rc<TableContext>) -> Self {
        Self { id, ctx }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// 读取并解码，缺失或无法解码时返回 `Nil`
    pub fn read_value(&self, key: &[u8]) -> Result<Value, ProxyError> {
        let bytes = match self.ctx.store().get(self.id, key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) | Err(StoreError::NotFound { .. }) => {
                tracing::trace!(target: TARGET, table = self.id, key = %String::from_utf8_lossy(key), "miss");
                return Ok(Value::Nil);
            }
            Err(err) => return Err(err.into()),
        };

        match decode(&bytes) {
            Ok(value) => {
                tracing::trace!(target: TARGET, table = self.id, key = %String::from_utf8_lossy(key), tag = value.type_name(), "read");
                Ok(value)
            }
            Err(err) => {
                // 存储损坏按缺失处理
                tracing::warn!(
                    target: TARGET,
                    table = self.id,
                    key = %String::from_utf8_lossy(key),
                    error = %err,
                    "stored value cannot be decoded, treating as missing"
                );
                Ok(Value::Nil)
            }
        }
    }

    /// 编码并写入，`Nil` 也作为墓碑写入而不是删除
    pub fn write_value(&self, key: &[u8], value: &Value) -> Result<(), ProxyError> {
        let bytes = encode_to_vec(value)?;
        tracing::trace!(target: TARGET, table = self.id, key = %String::from_utf8_lossy(key), tag = value.type_name(), "write");
        self.ctx.store().set(self.id, key, &bytes)?;
        Ok(())
    }

    /// `t[key]`
    pub fn read(&self, lua: &Lua, key: &LuaValue) -> Result<LuaValue, ProxyError> {
        let key = canonical_key(key)?;
        let value = self.read_value(&key)?;
        Ok(from_wire(lua, &value, self.ctx.persist_options())?)
    }

    /// `t[key] = value`
    pub fn write(&self, lua: &Lua, key: &LuaValue, value: &LuaValue) -> Result<(), ProxyError> {
        let key = canonical_key(key)?;
        let value = to_wire(lua, value, self.ctx.persist_options())?;
        self.write_value(&key, &value)
    }

    /// `#t`，宿主 O(1)
    pub fn length(&self) -> usize {
        self.ctx.store().size(self.id)
    }

    /// 全部键，超出缓冲区时报错而不是截断
    pub fn keys(&self) -> Result<Vec<Vec<u8>>, ProxyError> {
        let blob = self.ctx.store().keys(self.id, self.ctx.keys_capacity)?;
        Ok(decode_key_list(&blob)?)
    }

    /// 删除键，键不存在也算成功
    pub fn delete(&self, key: &LuaValue) -> Result<(), ProxyError> {
        let key = canonical_key(key)?;
        tracing::trace!(target: TARGET, table = self.id, key = %String::from_utf8_lossy(&key), "delete");
        self.ctx.store().delete(self.id, &key)?;
        Ok(())
    }
}

impl UserData for ExternalTable {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: LuaValue| {
            Ok(this.read(lua, &key)?)
        });

        methods.add_meta_method(
            MetaMethod::NewIndex,
            |lua, this, (key, value): (LuaValue, LuaValue)| Ok(this.write(lua, &key, &value)?),
        );

        methods.add_meta_method(MetaMethod::Len, |_, this, ()| Ok(this.length()));

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(format!("ext.table({})", this.id))
        });

        methods.add_meta_method(MetaMethod::Eq, |_, this, other: LuaValue| {
            Ok(match other {
                LuaValue::UserData(ud) => ud
                    .borrow::<ExternalTable>()
                    .map(|other| other.id == this.id)
                    .unwrap_or(false),
                _ => false,
            })
        });

        // 遍历开始时取一次键快照，之后逐个读取
        methods.add_meta_method(MetaMethod::Pairs, |lua, this, ()| {
            let keys = this.keys()?;
            let table = this.clone();
            let mut position = 0usize;
            let iter = lua.create_function_mut(move |lua, _: MultiValue| {
                let Some(key) = keys.get(position) else {
                    return Ok((LuaValue::Nil, LuaValue::Nil));
                };
                position += 1;
                let value = table.read_value(key)?;
                let value = from_wire(lua, &value, table.ctx.persist_options()).map_err(ProxyError::from)?;
                Ok((LuaValue::String(lua.create_string(key)?), value))
            })?;
            Ok((iter, LuaValue::Nil, LuaValue::Nil))
        });
    }
}

/// 取出代理参数
fn proxy_arg(ud: &AnyUserData) -> mlua::Result<ExternalTable> {
    Ok(ud.borrow::<ExternalTable>()?.clone())
}

/// 安装全局 `ext`，并在配置了 home id 时绑定 `_home`
pub fn install_ext(lua: &Lua, ctx: Rc<TableContext>, home_table_id: Option<u32>) -> mlua::Result<()> {
    let ext = lua.create_table()?;

    let table_ctx = ctx.clone();
    ext.set(
        "table",
        lua.create_function(move |lua, ()| {
            let id = table_ctx.allocate_id()?;
            tracing::debug!(target: TARGET, table = id, "table created");
            lua.create_userdata(ExternalTable::new(id, table_ctx.clone()))
        })?,
    )?;

    if ctx.allow_attach {
        let attach_ctx = ctx.clone();
        ext.set(
            "attach",
            lua.create_function(move |lua, id: u32| {
                lua.create_userdata(ExternalTable::new(id, attach_ctx.clone()))
            })?,
        )?;
    }

    ext.set(
        "id",
        lua.create_function(|_, ud: AnyUserData| Ok(proxy_arg(&ud)?.id()))?,
    )?;

    ext.set(
        "size",
        lua.create_function(|_, ud: AnyUserData| Ok(proxy_arg(&ud)?.length()))?,
    )?;

    ext.set(
        "keys",
        lua.create_function(|lua, ud: AnyUserData| {
            let keys = proxy_arg(&ud)?.keys()?;
            let list = lua.create_table_with_capacity(keys.len(), 0)?;
            for (i, key) in keys.iter().enumerate() {
                list.raw_set(i + 1, lua.create_string(key)?)?;
            }
            Ok(list)
        })?,
    )?;

    ext.set(
        "delete",
        lua.create_function(|_, (ud, key): (AnyUserData, LuaValue)| {
            Ok(proxy_arg(&ud)?.delete(&key)?)
        })?,
    )?;

    lua.globals().set("ext", ext)?;

    if let Some(id) = home_table_id {
        let home = lua.create_userdata(ExternalTable::new(id, ctx))?;
        lua.globals().set("_home", home)?;
    }
    Ok(())
}
