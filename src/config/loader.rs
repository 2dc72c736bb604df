/// 脚本加载配置

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{ConfigError, ConfigResult};
use crate::impl_default;

/// 脚本与模块的查找和下载设置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// 裸模块名的查找目录，按顺序尝试
    pub module_dirs: Vec<PathBuf>,

    /// 依次尝试的扩展名（空字符串表示原名）
    pub extensions: Vec<String>,

    /// 是否允许 http(s) 脚本
    pub allow_remote: bool,

    /// 远程脚本的暂存目录，`None` 使用系统临时目录
    pub staging_dir: Option<PathBuf>,

    /// 下载超时（秒）
    pub fetch_timeout_secs: u64,

    /// 单个远程脚本的最大字节数
    pub max_fetch_bytes: u64,
}

impl_default!(LoaderConfig {
    module_dirs: vec![PathBuf::from("node_modules")],
    extensions: vec![String::new(), ".js".to_string(), ".mjs".to_string()],
    allow_remote: true,
    staging_dir: None,
    fetch_timeout_secs: 30,
    max_fetch_bytes: 8 * 1024 * 1024,
});

impl LoaderConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "fetch_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_fetch_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "max_fetch_bytes must be greater than zero".to_string(),
            ));
        }
        if let Some(ext) = self
            .extensions
            .iter()
            .find(|ext| !ext.is_empty() && !ext.starts_with('.'))
        {
            return Err(ConfigError::ValidationError(format!(
                "extension '{}' must start with '.'",
                ext
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(LoaderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_extension_without_dot_rejected() {
        let config = LoaderConfig {
            extensions: vec!["js".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
