//! # quickjs-bind
//!
//! 嵌入式 QuickJS 引擎的值转换与生命周期桥接层。
//!
//! ## 功能
//!
//! - **值转换**: 宿主值与引擎值双向转换，内联值按值复制，堆对象以引用计数句柄暴露
//! - **生命周期**: 运行时 -> 上下文 -> 包装值的确定性销毁顺序，句柄在上下文销毁后安全失效
//! - **双向调用**: 宿主调用脚本函数（保留接收者），脚本调用宿主函数（带异常传递）
//! - **脚本加载**: 本地文件、模块目录查找与远程脚本暂存
//!
//! ## 模块
//!
//! - [`core`]: 错误类型、日志初始化、通用宏
//! - [`config`]: TOML/JSON 配置与环境变量覆盖
//! - [`value`]: 值模型与转换
//! - [`scripting`]: 运行时、上下文、注册表与句柄映射
//! - [`bindings`]: 宿主/引擎调用桥
//! - [`loader`]: 脚本与模块加载
//!
//! ## 示例
//!
//! ```no_run
//! use quickjs_bind::{HostFunction, HostValue, Runtime};
//!
//! let runtime = Runtime::new()?;
//! let context = runtime.new_context()?;
//!
//! context.set("double", HostFunction::new(1, |args: &[HostValue]| {
//!     Ok(HostValue::Int(args[0].as_i64().unwrap_or(0) * 2))
//! }))?;
//! assert_eq!(context.eval_script("double(21)")?, HostValue::Int(42));
//! # Ok::<(), quickjs_bind::BindingError>(())
//! ```

pub mod bindings;
pub mod config;
pub mod core;
pub mod loader;
pub mod scripting;
pub mod value;

pub use crate::config::{BindingConfig, IntegerOverflow};
pub use crate::core::{init_logging, BindingError, BindingResult, JsError};
pub use crate::loader::{LoaderError, ScriptLoader, ScriptSource};
pub use crate::scripting::{Context, EvalFlags, MemoryStats, Runtime};
pub use crate::value::{HostFunction, HostValue, ObjectKind, Tag, WrappedFunction, WrappedValue};
