//! 日志初始化
//!
//! 基于 `tracing-subscriber`，`RUST_LOG` 优先于配置文件中的级别。

use tracing_subscriber::EnvFilter;

use crate::config::{LogLevel, LoggingConfig};

/// 安装全局日志订阅者
///
/// 重复调用是安全的：已经存在订阅者时返回 `false`。
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_filter()));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.show_targets)
        .with_ansi(config.ansi)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(target: "quickjs_bind", level = ?config.level, "Logging initialized");
    }
    installed
}

impl LogLevel {
    /// `EnvFilter` 指令字符串
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filters() {
        assert_eq!(LogLevel::Warn.as_filter(), "warn");
        assert_eq!(LogLevel::Trace.as_filter(), "trace");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LoggingConfig::default();
        init_logging(&config);
        assert!(!init_logging(&config));
    }
}
