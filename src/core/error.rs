//! 统一错误处理模块
//!
//! 绑定层所有公开操作都返回 [`BindingResult`]。错误分为三类：
//!
//! - **引擎异常** ([`BindingError::Exception`]): 脚本抛出的值，携带渲染后的消息、
//!   可选的调用栈以及原始的引擎值
//! - **表示错误** (`UnsupportedRepresentation` / `Range`): 值无法跨越边界
//! - **生命周期错误** (`Destroyed` / `Released` / `ForeignContext`): 使用了已经失效的句柄

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::loader::LoaderError;
use crate::value::HostValue;

/// 绑定层错误类型
#[derive(Error, Debug)]
pub enum BindingError {
    #[error("{0}")]
    Exception(#[from] JsError),

    #[error("Unsupported representation: {0}")]
    UnsupportedRepresentation(String),

    #[error("Range error: {0}")]
    Range(String),

    #[error("Engine resource error: {0}")]
    Resource(String),

    #[error("The {0} has been destroyed")]
    Destroyed(&'static str),

    #[error("The runtime is running a script and cannot {0} now")]
    Busy(&'static str),

    #[error("The wrapped value has already been released")]
    Released,

    #[error("The value belongs to a different context")]
    ForeignContext,

    #[error("Value is not callable: {0}")]
    NotCallable(String),

    #[error("Invalid source text: {0}")]
    InvalidSource(String),

    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(String),
}

pub type BindingResult<T> = Result<T, BindingError>;

impl BindingError {
    /// 若为脚本异常则返回异常详情
    pub fn as_exception(&self) -> Option<&JsError> {
        match self {
            BindingError::Exception(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn engine(err: rquickjs::Error) -> Self {
        BindingError::Engine(err.to_string())
    }
}

/// 脚本抛出的异常
///
/// `message` 是异常值的字符串形式（例如 `TypeError: x is not a function`），
/// `value` 保留了被抛出的原始值，可以再次传回引擎。
pub struct JsError {
    message: String,
    stack: Option<String>,
    value: HostValue,
}

impl JsError {
    pub(crate) fn new(message: String, stack: Option<String>, value: HostValue) -> Self {
        Self {
            message,
            stack,
            value,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// 引擎记录的调用栈，仅 Error 对象才有
    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref().filter(|s| !s.is_empty())
    }

    /// 被抛出的原始值
    pub fn value(&self) -> &HostValue {
        &self.value
    }

    /// 异常名称，例如 `SyntaxError`
    pub fn name(&self) -> Option<&str> {
        let (name, _) = self.message.split_once(':')?;
        let name = name.trim();
        (!name.is_empty() && !name.contains(' ')).then_some(name)
    }
}

impl fmt::Display for JsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Debug for JsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsError")
            .field("message", &self.message)
            .field("stack", &self.stack)
            .finish()
    }
}

impl std::error::Error for JsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_display_is_message() {
        let err = BindingError::from(JsError::new(
            "TypeError: boom".to_string(),
            None,
            HostValue::Undefined,
        ));
        assert_eq!(err.to_string(), "TypeError: boom");
        assert_eq!(err.as_exception().and_then(|e| e.name()), Some("TypeError"));
    }

    #[test]
    fn test_exception_name_for_plain_values() {
        let err = JsError::new("42".to_string(), None, HostValue::Int(42));
        assert_eq!(err.name(), None);
        assert_eq!(err.value(), &HostValue::Int(42));
    }

    #[test]
    fn test_empty_stack_is_none() {
        let err = JsError::new("Error: x".to_string(), Some(String::new()), HostValue::Null);
        assert!(err.stack().is_none());
    }

    #[test]
    fn test_lifecycle_errors_render() {
        assert_eq!(
            BindingError::Destroyed("context").to_string(),
            "The context has been destroyed"
        );
        assert!(BindingError::Released.to_string().contains("released"));
        assert_eq!(
            BindingError::Busy("create a context").to_string(),
            "The runtime is running a script and cannot create a context now"
        );
    }
}
