//! 值模型
//!
//! - [`Tag`]: 引擎值标签与内联/堆分类
//! - [`HostValue`]: 宿主侧的值
//! - [`WrappedValue`] / [`WrappedFunction`]: 引擎堆对象的引用计数句柄
//! - `convert`: 两侧之间的转换规则

pub(crate) mod convert;
pub mod host;
pub mod tag;
pub mod wrapped;

pub use host::{HostFunction, HostValue};
pub use tag::{ObjectKind, Tag};
pub use wrapped::{WrappedFunction, WrappedValue};
