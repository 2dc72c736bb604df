/// 运行时、上下文与值转换配置

use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigResult};
use crate::impl_default;

/// 引擎运行时配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// 堆内存上限（字节），`None` 表示不限制
    pub memory_limit: Option<usize>,

    /// 最大栈深度（字节），`None` 使用引擎默认值
    pub max_stack_size: Option<usize>,

    /// 触发 GC 的分配阈值（字节）
    pub gc_threshold: Option<usize>,
}

impl_default!(RuntimeConfig {
    memory_limit: None,
    max_stack_size: None,
    gc_threshold: None,
});

impl RuntimeConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.memory_limit == Some(0) {
            return Err(ConfigError::ValidationError(
                "memory_limit must be greater than zero".to_string(),
            ));
        }
        if let Some(stack) = self.max_stack_size {
            if stack < 64 * 1024 {
                return Err(ConfigError::ValidationError(format!(
                    "max_stack_size {} is below the 64 KiB minimum",
                    stack
                )));
            }
        }
        Ok(())
    }
}

/// 每个上下文创建时安装的辅助脚本
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// 将 `console.*` 转发到 tracing
    pub console: bool,

    /// 缺少 `crypto.getRandomValues` 时安装兼容实现
    pub crypto_polyfill: bool,
}

impl_default!(ContextConfig {
    console: true,
    crypto_polyfill: true,
});

/// 超出 32 位内联整数范围的宿主整数如何传入引擎
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegerOverflow {
    /// 在 ±2^53 内精确转换为 Float64，超出部分转换为 BigInt
    #[default]
    Widen,
    /// 拒绝转换并返回范围错误
    Strict,
}

impl std::str::FromStr for IntegerOverflow {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "widen" => Ok(IntegerOverflow::Widen),
            "strict" => Ok(IntegerOverflow::Strict),
            other => Err(ConfigError::ParseError(format!(
                "unknown integer overflow policy '{}'",
                other
            ))),
        }
    }
}

/// 值转换配置
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub integer_overflow: IntegerOverflow,

    /// `materialize` 允许的最大嵌套深度
    pub max_depth: usize,
}

impl_default!(ConversionConfig {
    integer_overflow: IntegerOverflow::Widen,
    max_depth: 64,
});

impl ConversionConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_depth == 0 {
            return Err(ConfigError::ValidationError(
                "max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_policy_parse() {
        assert_eq!("STRICT".parse::<IntegerOverflow>().unwrap(), IntegerOverflow::Strict);
        assert_eq!("widen".parse::<IntegerOverflow>().unwrap(), IntegerOverflow::Widen);
        assert!("truncate".parse::<IntegerOverflow>().is_err());
    }

    #[test]
    fn test_section_defaults() {
        let runtime = RuntimeConfig::default();
        assert_eq!(runtime.memory_limit, None);
        assert!(runtime.validate().is_ok());

        let context = ContextConfig::default();
        assert!(context.console && context.crypto_polyfill);

        let conversion = ConversionConfig::default();
        assert_eq!(conversion.integer_overflow, IntegerOverflow::Widen);
        assert_eq!(conversion.max_depth, 64);
    }

    #[test]
    fn test_small_stack_rejected() {
        let config = RuntimeConfig {
            max_stack_size: Some(1024),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
