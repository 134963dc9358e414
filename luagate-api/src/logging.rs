//! 日志系统初始化
//!
//! 基于 `tracing-subscriber` 实现分阶段日志控制。

use luagate_config::{LogLevel, LoggingConfig, Phase};
use std::io;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    fmt,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    Layer,
};

/// 日志输出格式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// 彩色格式化（开发使用）
    Pretty,
    /// 紧凑格式
    Compact,
    /// JSON 格式（工具集成）
    Json,
}

/// 日志级别到过滤器
pub fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Silent => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    }
}

/// 按阶段构建过滤目标
pub fn targets(config: &LoggingConfig) -> Targets {
    Phase::ALL.iter().fold(
        Targets::new().with_default(level_filter(config.global)),
        |targets, phase| {
            targets.with_target(phase.target(), level_filter(config.level_for(*phase)))
        },
    )
}

/// 使用指定格式初始化日志系统，输出到 stderr
///
/// 已经有全局 subscriber 时返回错误，不会 panic。
pub fn init(config: &LoggingConfig, format: LogFormat) -> Result<(), TryInitError> {
    let layer = create_format_layer(format, io::stderr).with_filter(targets(config));
    tracing_subscriber::registry().with(layer).try_init()
}

/// Create formatter layer based on format
fn create_format_layer<W, F>(format: LogFormat, make_writer: F) -> impl Layer<tracing_subscriber::Registry>
where
    W: io::Write + Send + Sync + 'static,
    F: Fn() -> W + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .without_time()
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(make_writer)
            .boxed(),
    }
}
