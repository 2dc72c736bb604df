/// 统一配置系统
///
/// 提供TOML/JSON配置文件与环境变量覆盖
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::impl_default;

pub mod loader;
pub mod runtime;

pub use loader::LoaderConfig;
pub use runtime::{ContextConfig, ConversionConfig, IntegerOverflow, RuntimeConfig};

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 绑定层主配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BindingConfig {
    /// 运行时限制
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// 上下文辅助脚本
    #[serde(default)]
    pub context: ContextConfig,

    /// 值转换策略
    #[serde(default)]
    pub conversion: ConversionConfig,

    /// 脚本加载
    #[serde(default)]
    pub loader: LoaderConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BindingConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        // 运行时限制
        if let Ok(val) = env::var("QJS_BIND_MEMORY_LIMIT") {
            if let Ok(limit) = val.parse() {
                self.runtime.memory_limit = Some(limit);
            }
        }
        if let Ok(val) = env::var("QJS_BIND_MAX_STACK_SIZE") {
            if let Ok(size) = val.parse() {
                self.runtime.max_stack_size = Some(size);
            }
        }
        if let Ok(val) = env::var("QJS_BIND_GC_THRESHOLD") {
            if let Ok(threshold) = val.parse() {
                self.runtime.gc_threshold = Some(threshold);
            }
        }

        // 值转换
        if let Ok(val) = env::var("QJS_BIND_INTEGER_OVERFLOW") {
            if let Ok(policy) = val.parse() {
                self.conversion.integer_overflow = policy;
            }
        }

        // 加载器
        if let Ok(val) = env::var("QJS_BIND_ALLOW_REMOTE") {
            self.loader.allow_remote = val.parse().unwrap_or(self.loader.allow_remote);
        }
        if let Ok(val) = env::var("QJS_BIND_STAGING_DIR") {
            self.loader.staging_dir = Some(PathBuf::from(val));
        }

        // 日志
        if let Ok(val) = env::var("QJS_BIND_LOG_LEVEL") {
            if let Ok(level) = val.parse() {
                self.logging.level = level;
            }
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.runtime.validate()?;
        self.conversion.validate()?;
        self.loader.validate()?;
        Ok(())
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. ./quickjs-bind.toml
    /// 2. ./quickjs-bind.json
    /// 3. <配置目录>/quickjs-bind/config.toml
    /// 4. 使用默认配置
    pub fn load_or_default() -> Self {
        if let Ok(config) = Self::from_toml_file("quickjs-bind.toml") {
            tracing::info!(target: "quickjs_bind::config", "Loaded config from quickjs-bind.toml");
            return config;
        }

        if let Ok(config) = Self::from_json_file("quickjs-bind.json") {
            tracing::info!(target: "quickjs_bind::config", "Loaded config from quickjs-bind.json");
            return config;
        }

        if let Some(dir) = dirs::config_dir() {
            let config_path = dir.join("quickjs-bind").join("config.toml");
            if let Ok(config) = Self::from_toml_file(&config_path) {
                tracing::info!(target: "quickjs_bind::config", path = ?config_path, "Loaded config");
                return config;
            }
        }

        tracing::debug!(target: "quickjs_bind::config", "Using default configuration");
        Self::default()
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,

    /// 是否输出事件的 target
    pub show_targets: bool,

    /// 是否使用 ANSI 颜色
    pub ansi: bool,
}

impl_default!(LoggingConfig {
    level: LogLevel::Info,
    show_targets: true,
    ansi: true,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// 跟踪
    Trace,
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(ConfigError::ParseError(format!("unknown log level '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BindingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.conversion.integer_overflow, IntegerOverflow::Widen);
    }

    #[test]
    fn test_toml_serialization() {
        let mut config = BindingConfig::default();
        config.runtime.memory_limit = Some(32 * 1024 * 1024);
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: BindingConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.runtime.memory_limit, Some(32 * 1024 * 1024));
    }

    #[test]
    fn test_json_serialization() {
        let config = BindingConfig::default();
        let json_str = serde_json::to_string(&config).unwrap();
        let parsed: BindingConfig = serde_json::from_str(&json_str).unwrap();
        assert_eq!(config.loader.module_dirs, parsed.loader.module_dirs);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed = BindingConfig::from_toml_str(
            r#"
            [conversion]
            integer_overflow = "strict"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.conversion.integer_overflow, IntegerOverflow::Strict);
        assert_eq!(parsed.conversion.max_depth, 64);
        assert!(parsed.context.console);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = BindingConfig::default();
        config.loader.allow_remote = false;
        config.save_toml(&path).unwrap();

        let reloaded = BindingConfig::from_toml_file(&path).unwrap();
        assert!(!reloaded.loader.allow_remote);
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
