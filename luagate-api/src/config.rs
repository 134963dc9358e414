//! API 层配置
//!
//! 全局配置单例，供 wasm 导出和 `quick_run` 使用。库用户应显式传入配置。

use luagate_config::BridgeConfig;
use once_cell::sync::OnceCell;

// Global config singleton for exports that take no arguments
static GLOBAL_CONFIG: OnceCell<BridgeConfig> = OnceCell::new();

/// Initialize global configuration
///
/// Returns the rejected config if one was already installed (explicitly or by
/// a prior [`config`] call falling back to defaults).
pub fn init(config: BridgeConfig) -> Result<(), BridgeConfig> {
    GLOBAL_CONFIG.set(config)
}

/// Get global config reference, installing the defaults on first use
pub fn config() -> &'static BridgeConfig {
    GLOBAL_CONFIG.get_or_init(BridgeConfig::default)
}

/// Check if config is initialized
pub fn is_initialized() -> bool {
    GLOBAL_CONFIG.get().is_some()
}
