//! Luagate Config - Pure configuration data structures
//!
//! This crate contains only data structures, no global state.
//! It serves as the shared configuration vocabulary across all Luagate crates.
//!
//! Configuration can be built in code or read from JSON:
//!
//! ```
//! use luagate_config::BridgeConfig;
//!
//! let config = BridgeConfig::from_json(r#"{ "buffer": { "capacity": 4096 } }"#).unwrap();
//! assert_eq!(config.buffer.capacity, 4096);
//! assert_eq!(config.buffer.reserved_margin, 256);
//! ```

use serde::Deserialize;
use thiserror::Error;

/// Smallest reserved margin accepted by [`BufferConfig`].
///
/// The margin must hold the frame header, a small result and the truncation marker.
pub const MIN_RESERVED_MARGIN: usize = 64;

/// Configuration error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid config json: {0}")]
    Json(String),

    #[error("buffer capacity {capacity} must be between {min} and {max}")]
    Capacity {
        capacity: usize,
        min: usize,
        max: usize,
    },

    #[error("reserved margin {margin} must be at least {min} and below capacity {capacity}")]
    Margin {
        margin: usize,
        min: usize,
        capacity: usize,
    },

    #[error("home table id {0} collides with the allocated id range starting at {1}")]
    HomeTableCollision(u32, u32),
}

/// Shared I/O buffer sizing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Capacity of the shared I/O buffer in bytes
    pub capacity: usize,
    /// Bytes held back from captured output and error text
    pub reserved_margin: usize,
    /// Destination size offered to the host for key listings
    pub keys_capacity: usize,
    /// Destination size offered to the host for single value reads
    pub value_capacity: usize,
}

/// Configuration for execution limits
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Interpreter heap limit in bytes (None = unlimited)
    pub memory_limit: Option<usize>,
    /// Largest bytecode blob accepted for loading
    pub max_bytecode_len: usize,
}

/// External table id policy
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Table bound to the `_home` global (None = no `_home`)
    pub home_table_id: Option<u32>,
    /// First id handed out when the host does not allocate ids itself
    pub first_table_id: u32,
    /// Whether scripts may bind proxies to existing ids
    pub allow_attach: bool,
}

/// Function persistence options
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    /// Strip debug information when dumping functions
    pub strip_debug: bool,
}

/// Log verbosity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Silent,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Per-phase log levels
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub global: LogLevel,
    pub codec: Option<LogLevel>,
    pub table: Option<LogLevel>,
    pub persist: Option<LogLevel>,
    pub invoke: Option<LogLevel>,
}

/// Bridge phase, used for log targets and error reports
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Codec,
    Table,
    Persist,
    Invoke,
}

/// Top-level configuration for one bridge session
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub buffer: BufferConfig,
    pub limits: LimitConfig,
    pub tables: TableConfig,
    pub persist: PersistConfig,
    pub log: LoggingConfig,
}

impl Phase {
    /// All phases, in pipeline order
    pub const ALL: [Phase; 4] = [Phase::Codec, Phase::Table, Phase::Persist, Phase::Invoke];

    /// Get the string name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Codec => "codec",
            Phase::Table => "table",
            Phase::Persist => "persist",
            Phase::Invoke => "invoke",
        }
    }

    /// Get the log target name for this phase
    pub fn target(&self) -> &'static str {
        match self {
            Phase::Codec => "luagate::codec",
            Phase::Table => "luagate::table",
            Phase::Persist => "luagate::persist",
            Phase::Invoke => "luagate::invoke",
        }
    }
}

impl LoggingConfig {
    /// Get log level for a specific phase
    pub fn level_for(&self, phase: Phase) -> LogLevel {
        let specific = match phase {
            Phase::Codec => self.codec,
            Phase::Table => self.table,
            Phase::Persist => self.persist,
            Phase::Invoke => self.invoke,
        };
        specific.unwrap_or(self.global)
    }
}

impl BufferConfig {
    /// Smallest buffer that can carry a frame plus the reserved margin
    pub const MIN_CAPACITY: usize = 256;
    /// Largest buffer whose lengths still fit the i32 return convention
    pub const MAX_CAPACITY: usize = i32::MAX as usize;

    /// Bytes available to captured output or an error message
    pub fn text_budget(&self) -> usize {
        self.capacity.saturating_sub(self.reserved_margin)
    }
}

impl BridgeConfig {
    /// Parse from JSON, filling missing fields with defaults, then validate
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        let buffer = &self.buffer;
        if buffer.capacity < BufferConfig::MIN_CAPACITY || buffer.capacity > BufferConfig::MAX_CAPACITY {
            return Err(ConfigError::Capacity {
                capacity: buffer.capacity,
                min: BufferConfig::MIN_CAPACITY,
                max: BufferConfig::MAX_CAPACITY,
            });
        }
        if buffer.reserved_margin < MIN_RESERVED_MARGIN || buffer.reserved_margin >= buffer.capacity {
            return Err(ConfigError::Margin {
                margin: buffer.reserved_margin,
                min: MIN_RESERVED_MARGIN,
                capacity: buffer.capacity,
            });
        }
        if let Some(home) = self.tables.home_table_id {
            if home >= self.tables.first_table_id {
                return Err(ConfigError::HomeTableCollision(home, self.tables.first_table_id));
            }
        }
        Ok(())
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: 64 * 1024,
            reserved_margin: 256,
            keys_capacity: 1024 * 1024,
            value_capacity: 64 * 1024,
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            memory_limit: None,
            max_bytecode_len: 1024 * 1024,
        }
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            home_table_id: Some(0),
            first_table_id: 1,
            allow_attach: true,
        }
    }
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self { strip_debug: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            global: LogLevel::Warn,
            codec: None,
            table: None,
            persist: None,
            invoke: None,
        }
    }
}
